//! Operational self-report: which credentials are present, what each one
//! can actually read, how big the fallback files have grown, and which
//! schema capabilities have been narrowed this process.

use crate::config::{GatewayConfig, RemoteConfig};
use crate::gateway::RecordGateway;
use crate::store::CapabilitySnapshot;
use crate::utils::remote_error_message;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct DebugReport {
    pub env: EnvPresence,
    pub fallback: FallbackCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_role: Option<KeyProbe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anon: Option<KeyProbe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<CapabilityReport>,
}

#[derive(Debug, Serialize)]
pub struct EnvPresence {
    pub has_remote_url: bool,
    pub has_service_key: bool,
    pub has_anon_key: bool,
}

/// Nothing prunes the fallback files automatically; these counts are the
/// operational signal for doing so by hand.
#[derive(Debug, Serialize)]
pub struct FallbackCounts {
    pub posts: usize,
    pub comments: usize,
}

#[derive(Debug, Serialize)]
pub struct CapabilityReport {
    pub posts: CapabilitySnapshot,
    pub comments: CapabilitySnapshot,
}

#[derive(Debug, Serialize)]
pub struct KeyProbe {
    pub ok: bool,
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KeyProbe {
    fn failed(message: String) -> Self {
        Self {
            ok: false,
            count: None,
            sample: None,
            error: Some(message),
        }
    }
}

pub async fn collect_report(
    config: &GatewayConfig,
    http: &reqwest::Client,
    posts: &RecordGateway,
    comments: &RecordGateway,
) -> DebugReport {
    let remote = config.remote.as_ref();
    let env = EnvPresence {
        has_remote_url: remote.is_some(),
        has_service_key: remote.map(|r| r.service_key.is_some()).unwrap_or(false),
        has_anon_key: remote.map(|r| r.anon_key.is_some()).unwrap_or(false),
    };
    let fallback = FallbackCounts {
        posts: posts.fallback_total().await,
        comments: comments.fallback_total().await,
    };
    let capabilities = match (posts.capabilities(), comments.capabilities()) {
        (Some(posts), Some(comments)) => Some(CapabilityReport { posts, comments }),
        _ => None,
    };

    let mut report = DebugReport {
        env,
        fallback,
        service_role: None,
        anon: None,
        capabilities,
    };
    if let Some(remote) = remote {
        if let Some(key) = remote.service_key.as_deref() {
            report.service_role = Some(probe_posts(http, remote, key).await);
        }
        if let Some(key) = remote.anon_key.as_deref() {
            report.anon = Some(probe_posts(http, remote, key).await);
        }
    }
    report
}

/// Reads a ten-row posts sample with one credential, showing exactly what
/// a client holding that key would see.
async fn probe_posts(http: &reqwest::Client, remote: &RemoteConfig, key: &str) -> KeyProbe {
    let url = format!("{}/rest/v1/posts", remote.base_url);
    let request = http
        .get(&url)
        .query(&[
            ("select", "id,title,author_display,created_at,likes"),
            ("order", "created_at.desc"),
            ("limit", "10"),
        ])
        .header("apikey", key)
        .bearer_auth(key);
    match request.send().await {
        Ok(response) if response.status().is_success() => {
            match response.json::<Vec<Value>>().await {
                Ok(rows) => KeyProbe {
                    ok: true,
                    count: Some(rows.len()),
                    sample: Some(rows),
                    error: None,
                },
                Err(err) => KeyProbe::failed(err.to_string()),
            }
        }
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            KeyProbe::failed(remote_error_message(status, &body))
        }
        Err(err) => KeyProbe::failed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackPaths;
    use crate::records::{COMMENTS, POSTS};
    use crate::store::LocalStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn unconfigured_report_carries_no_probes() {
        let dir = TempDir::new().unwrap();
        let paths = FallbackPaths::from_data_dir(dir.path());
        let config = GatewayConfig::new(0, paths.clone(), None);
        let posts = RecordGateway::new(POSTS, None, LocalStore::new(POSTS, paths.posts_file));
        let comments = RecordGateway::new(
            COMMENTS,
            None,
            LocalStore::new(COMMENTS, paths.comments_file),
        );

        let report =
            collect_report(&config, &reqwest::Client::new(), &posts, &comments).await;
        assert!(!report.env.has_remote_url);
        assert!(report.service_role.is_none());
        assert!(report.anon.is_none());
        assert!(report.capabilities.is_none());
        assert_eq!(report.fallback.posts, 0);
        assert_eq!(report.fallback.comments, 0);
    }
}
