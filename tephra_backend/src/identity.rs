//! Bearer-token resolution against the platform's auth service.
//!
//! Every record route demands an `Authorization: Bearer` header. When a
//! remote platform is configured the token is introspected there; when it
//! is not, the caller passes through as anonymous (the header requirement
//! itself still stands, so clients behave identically in both modes).

use crate::config::RemoteConfig;
use crate::records::AuthorStamp;
use crate::utils::{remote_error_message, ANONYMOUS_AUTHOR};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("missing or malformed bearer token")]
    MissingBearer,
    #[error("bearer token rejected by the identity provider")]
    Rejected,
}

#[derive(Debug, Error)]
pub enum AuthAdminError {
    #[error("auth admin is not configured; set the remote URL and service key")]
    Unconfigured,
    #[error("{0}")]
    Provider(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// The resolved caller: the raw token is kept because record mutations may
/// present it to the remote store as a caller-scoped credential.
#[derive(Debug, Clone)]
pub struct Caller {
    pub token: String,
    pub identity: Option<CallerIdentity>,
}

impl Caller {
    pub fn author_stamp(&self) -> AuthorStamp {
        match &self.identity {
            Some(identity) => identity.author_stamp(),
            None => AuthorStamp::anonymous(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallerIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl CallerIdentity {
    /// Display name, first non-blank of: metadata `display_name`,
    /// `username`, `name`, the email local-part, the anonymous placeholder.
    pub fn display_name(&self) -> String {
        let from_metadata = [
            self.user_metadata.display_name.as_deref(),
            self.user_metadata.username.as_deref(),
            self.user_metadata.name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty());
        if let Some(name) = from_metadata {
            return name.to_string();
        }
        if let Some(local_part) = self
            .email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|part| !part.trim().is_empty())
        {
            return local_part.to_string();
        }
        ANONYMOUS_AUTHOR.to_string()
    }

    pub fn author_stamp(&self) -> AuthorStamp {
        AuthorStamp {
            id: Some(self.id.clone()),
            display: self.display_name(),
            email: self.email.clone(),
        }
    }
}

#[derive(Clone)]
pub struct IdentityResolver {
    http: reqwest::Client,
    remote: Option<RemoteConfig>,
}

impl IdentityResolver {
    pub fn new(http: reqwest::Client, remote: Option<RemoteConfig>) -> Self {
        Self { http, remote }
    }

    /// Resolves the `Authorization` header value into a [`Caller`]. Any
    /// introspection failure, transport errors included, reads as a
    /// rejected token rather than an internal error.
    pub async fn resolve(&self, authorization: Option<&str>) -> Result<Caller, IdentityError> {
        let token = authorization
            .unwrap_or_default()
            .strip_prefix("Bearer ")
            .ok_or(IdentityError::MissingBearer)?
            .to_string();

        let Some(remote) = &self.remote else {
            return Ok(Caller {
                token,
                identity: None,
            });
        };

        let url = format!("{}/auth/v1/user", remote.base_url);
        let mut request = self.http.get(&url).bearer_auth(&token);
        if let Some(key) = remote.client_key() {
            request = request.header("apikey", key);
        }
        let response = request.send().await.map_err(|err| {
            tracing::debug!(error = %err, "identity introspection transport failure");
            IdentityError::Rejected
        })?;
        if !response.status().is_success() {
            return Err(IdentityError::Rejected);
        }
        let identity: CallerIdentity = response
            .json()
            .await
            .map_err(|_| IdentityError::Rejected)?;
        Ok(Caller {
            token,
            identity: Some(identity),
        })
    }
}

/// Admin-side auth operations; always presented with the service key.
#[derive(Clone)]
pub struct AuthAdmin {
    http: reqwest::Client,
    remote: Option<RemoteConfig>,
}

impl AuthAdmin {
    pub fn new(http: reqwest::Client, remote: Option<RemoteConfig>) -> Self {
        Self { http, remote }
    }

    /// Asks the auth service to mint a fresh signup-confirmation link for
    /// the address. Returns the link when the response names one; older
    /// platform versions put it under different fields.
    pub async fn signup_link(&self, email: &str) -> Result<Option<String>, AuthAdminError> {
        let Some(remote) = &self.remote else {
            return Err(AuthAdminError::Unconfigured);
        };
        let Some(key) = remote.service_key.as_deref() else {
            return Err(AuthAdminError::Unconfigured);
        };
        let url = format!("{}/auth/v1/admin/generate_link", remote.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", key)
            .bearer_auth(key)
            .json(&serde_json::json!({ "type": "signup", "email": email }))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AuthAdminError::Provider(remote_error_message(status, &body)));
        }
        let value: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        let link = ["action_link", "link"].into_iter().find_map(|field| {
            value.get(field).and_then(Value::as_str).map(String::from)
        });
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(metadata: UserMetadata, email: Option<&str>) -> CallerIdentity {
        CallerIdentity {
            id: "user-1".into(),
            email: email.map(String::from),
            user_metadata: metadata,
        }
    }

    #[test]
    fn display_name_prefers_metadata_in_order() {
        let full = identity(
            UserMetadata {
                display_name: Some("Display".into()),
                username: Some("username".into()),
                name: Some("name".into()),
            },
            Some("mail@example.com"),
        );
        assert_eq!(full.display_name(), "Display");

        let no_display = identity(
            UserMetadata {
                display_name: Some("   ".into()),
                username: Some("username".into()),
                name: None,
            },
            Some("mail@example.com"),
        );
        assert_eq!(no_display.display_name(), "username");
    }

    #[test]
    fn display_name_falls_back_to_email_then_placeholder() {
        let by_email = identity(UserMetadata::default(), Some("carol@example.com"));
        assert_eq!(by_email.display_name(), "carol");

        let nothing = identity(UserMetadata::default(), None);
        assert_eq!(nothing.display_name(), ANONYMOUS_AUTHOR);
    }

    #[tokio::test]
    async fn resolver_without_remote_yields_anonymous_caller() {
        let resolver = IdentityResolver::new(reqwest::Client::new(), None);
        let caller = resolver
            .resolve(Some("Bearer token-123"))
            .await
            .unwrap();
        assert_eq!(caller.token, "token-123");
        assert!(caller.identity.is_none());
        assert_eq!(caller.author_stamp().display, ANONYMOUS_AUTHOR);
    }

    #[tokio::test]
    async fn resolver_rejects_missing_or_malformed_headers() {
        let resolver = IdentityResolver::new(reqwest::Client::new(), None);
        assert!(matches!(
            resolver.resolve(None).await,
            Err(IdentityError::MissingBearer)
        ));
        assert!(matches!(
            resolver.resolve(Some("Token abc")).await,
            Err(IdentityError::MissingBearer)
        ));
    }

    #[tokio::test]
    async fn admin_links_require_a_configured_remote() {
        let admin = AuthAdmin::new(reqwest::Client::new(), None);
        assert!(matches!(
            admin.signup_link("user@example.com").await,
            Err(AuthAdminError::Unconfigured)
        ));

        let anon_only = RemoteConfig {
            base_url: "http://localhost:1".into(),
            service_key: None,
            anon_key: Some("anon".into()),
        };
        let admin = AuthAdmin::new(reqwest::Client::new(), Some(anon_only));
        assert!(matches!(
            admin.signup_link("user@example.com").await,
            Err(AuthAdminError::Unconfigured)
        ));
    }
}
