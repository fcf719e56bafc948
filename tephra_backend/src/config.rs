use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};

/// Runtime configuration for the gateway, read from `TEPHRA_*` environment
/// variables. The remote half is optional: without `TEPHRA_REMOTE_URL` the
/// gateway runs entirely against the local fallback store.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_port: u16,
    pub paths: FallbackPaths,
    pub remote: Option<RemoteConfig>,
    pub storage: StorageConfig,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let paths = FallbackPaths::discover()?;
        let api_port = env::var("TEPHRA_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        let remote = RemoteConfig::from_env();
        let storage = StorageConfig::from_env();
        Ok(Self {
            api_port,
            paths,
            remote,
            storage,
        })
    }

    pub fn new(api_port: u16, paths: FallbackPaths, remote: Option<RemoteConfig>) -> Self {
        Self {
            api_port,
            paths,
            remote,
            storage: StorageConfig::default(),
        }
    }

    pub fn with_storage(
        api_port: u16,
        paths: FallbackPaths,
        remote: Option<RemoteConfig>,
        storage: StorageConfig,
    ) -> Self {
        Self {
            api_port,
            paths,
            remote,
            storage,
        }
    }
}

/// Connection parameters for the hosted BaaS platform. `base_url` is the
/// platform root; the REST, auth, and storage services hang off it at their
/// documented prefixes. Keys are optional independently: a deployment may
/// expose only the anon key (read-only) or only the service key.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub service_key: Option<String>,
    pub anon_key: Option<String>,
}

impl RemoteConfig {
    pub fn from_env() -> Option<Self> {
        let base_url = non_empty(env::var("TEPHRA_REMOTE_URL").ok()?)?;
        let service_key = env::var("TEPHRA_SERVICE_KEY").ok().and_then(non_empty);
        let anon_key = env::var("TEPHRA_ANON_KEY").ok().and_then(non_empty);
        Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            anon_key,
        })
    }

    /// Credential for reads: prefer the elevated service key so the server
    /// can see everything, fall back to the public anon key.
    pub fn read_key(&self) -> Option<&str> {
        self.service_key.as_deref().or(self.anon_key.as_deref())
    }

    /// Credential for the auth and storage services, which expect the
    /// public key in `apikey`; the service key only stands in when no anon
    /// key is configured.
    pub fn client_key(&self) -> Option<&str> {
        self.anon_key.as_deref().or(self.service_key.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        let bucket = env::var("TEPHRA_BUCKET")
            .ok()
            .and_then(non_empty)
            .unwrap_or_else(|| "resources".to_string());
        Self { bucket }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "resources".to_string(),
        }
    }
}

/// Locations of the fallback-store files. One JSON array file per
/// collection, all under a single data directory.
#[derive(Debug, Clone)]
pub struct FallbackPaths {
    pub data_dir: PathBuf,
    pub posts_file: PathBuf,
    pub comments_file: PathBuf,
}

impl FallbackPaths {
    pub fn discover() -> Result<Self> {
        let data_dir = match env::var("TEPHRA_DATA_DIR").ok().and_then(non_empty) {
            Some(dir) => PathBuf::from(dir),
            None => env::current_dir()?.join("data"),
        };
        Ok(Self::from_data_dir(data_dir))
    }

    pub fn from_data_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        let posts_file = data_dir.join("community-posts.json");
        let comments_file = data_dir.join("community-comments.json");
        Self {
            data_dir,
            posts_file,
            comments_file,
        }
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_paths_derive_per_collection_files() {
        let paths = FallbackPaths::from_data_dir("/tmp/tephra-data");
        assert_eq!(
            paths.posts_file,
            PathBuf::from("/tmp/tephra-data/community-posts.json")
        );
        assert_eq!(
            paths.comments_file,
            PathBuf::from("/tmp/tephra-data/community-comments.json")
        );
    }

    #[test]
    fn read_key_prefers_service_key() {
        let remote = RemoteConfig {
            base_url: "http://localhost:1".into(),
            service_key: Some("service".into()),
            anon_key: Some("anon".into()),
        };
        assert_eq!(remote.read_key(), Some("service"));

        let anon_only = RemoteConfig {
            base_url: "http://localhost:1".into(),
            service_key: None,
            anon_key: Some("anon".into()),
        };
        assert_eq!(anon_only.read_key(), Some("anon"));
    }
}
