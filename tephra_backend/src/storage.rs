//! Object-storage service adapter: bucket listing and signed URLs.
//!
//! Listing is non-critical and degrades to an empty result on any trouble
//! so clients can fall back to bundled demo resources; signing is a real
//! capability and fails loudly when the platform is unconfigured.

use crate::config::RemoteConfig;
use crate::utils::remote_error_message;
use serde_json::{json, Value};
use thiserror::Error;

pub const LIST_LIMIT: usize = 200;
const MAX_TTL_SECS: i64 = 60 * 60;
const DEFAULT_TTL_SECS: i64 = 60 * 5;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("remote storage is not configured; set the remote URL and service key")]
    Unconfigured,
    #[error("{0}")]
    Provider(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct StorageClient {
    http: reqwest::Client,
    remote: Option<RemoteConfig>,
    bucket: String,
}

impl StorageClient {
    pub fn new(http: reqwest::Client, remote: Option<RemoteConfig>, bucket: String) -> Self {
        Self {
            http,
            remote,
            bucket,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Lists up to [`LIST_LIMIT`] objects under `prefix`. Unconfigured
    /// platform and provider failures both read as an empty listing.
    pub async fn list(&self, prefix: &str) -> Vec<Value> {
        let Some(remote) = &self.remote else {
            return Vec::new();
        };
        let Some(key) = remote.read_key() else {
            return Vec::new();
        };
        let url = format!(
            "{}/storage/v1/object/list/{}",
            remote.base_url, self.bucket
        );
        let request = self
            .http
            .post(&url)
            .header("apikey", key)
            .bearer_auth(key)
            .json(&json!({ "prefix": prefix, "limit": LIST_LIMIT }));
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                response.json().await.unwrap_or_default()
            }
            Ok(response) => {
                tracing::warn!(
                    bucket = %self.bucket,
                    status = %response.status(),
                    "storage listing failed, returning empty list"
                );
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(
                    bucket = %self.bucket,
                    error = %err,
                    "storage listing unreachable, returning empty list"
                );
                Vec::new()
            }
        }
    }

    /// Issues a time-limited signed URL for one object. The provider's
    /// response is passed through as-is; different platform versions name
    /// the URL field differently and clients know how to pick it.
    pub async fn signed_url(&self, path: &str, ttl_secs: i64) -> Result<Value, StorageError> {
        let Some(remote) = &self.remote else {
            return Err(StorageError::Unconfigured);
        };
        let Some(key) = remote.service_key.as_deref() else {
            return Err(StorageError::Unconfigured);
        };
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            remote.base_url, self.bucket, path
        );
        let response = self
            .http
            .post(&url)
            .header("apikey", key)
            .bearer_auth(key)
            .json(&json!({ "expiresIn": ttl_secs }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Provider(remote_error_message(status, &body)));
        }
        Ok(response.json().await?)
    }
}

/// Clamps a client-supplied expiry to `(0, 3600]` seconds, defaulting to
/// five minutes when absent or nonsensical.
pub fn clamp_ttl(expires: Option<i64>) -> i64 {
    match expires {
        Some(secs) if secs > 0 => secs.min(MAX_TTL_SECS),
        _ => DEFAULT_TTL_SECS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_clamps_to_an_hour_and_defaults_to_five_minutes() {
        assert_eq!(clamp_ttl(None), 300);
        assert_eq!(clamp_ttl(Some(0)), 300);
        assert_eq!(clamp_ttl(Some(-30)), 300);
        assert_eq!(clamp_ttl(Some(120)), 120);
        assert_eq!(clamp_ttl(Some(86_400)), 3_600);
    }

    #[tokio::test]
    async fn unconfigured_storage_lists_empty_and_refuses_to_sign() {
        let client = StorageClient::new(reqwest::Client::new(), None, "resources".into());
        assert!(client.list("").await.is_empty());
        assert!(matches!(
            client.signed_url("guide.pdf", 300).await,
            Err(StorageError::Unconfigured)
        ));
    }
}
