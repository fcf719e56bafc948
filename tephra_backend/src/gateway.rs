//! Per-collection gateway over the two stores.
//!
//! Every operation tries the remote store when one is configured and falls
//! back to the local file store when the remote proves unusable. The one
//! deliberate exception: an ownership denial from the remote is final and
//! never retried locally. There is no reconciliation between the stores;
//! once the remote is configured it is authoritative, and fallback-written
//! records surface again only when the remote is unusable.

use crate::error::StoreError;
use crate::identity::Caller;
use crate::records::{CollectionSpec, ListQuery, Record, RecordDraft, RecordPage};
use crate::store::{CapabilitySnapshot, LocalStore, RecordStore, RemoteStore};
use std::path::Path;

#[derive(Clone)]
pub struct RecordGateway {
    spec: CollectionSpec,
    remote: Option<RemoteStore>,
    local: LocalStore,
}

impl RecordGateway {
    pub fn new(spec: CollectionSpec, remote: Option<RemoteStore>, local: LocalStore) -> Self {
        Self {
            spec,
            remote,
            local,
        }
    }

    pub fn collection(&self) -> &'static str {
        self.spec.name
    }

    pub fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    pub fn remote_configured(&self) -> bool {
        self.remote.is_some()
    }

    pub fn capabilities(&self) -> Option<CapabilitySnapshot> {
        self.remote.as_ref().map(RemoteStore::capabilities)
    }

    pub fn fallback_path(&self) -> &Path {
        self.local.path()
    }

    /// Record count currently held by the fallback file. The file grows
    /// without bound by design, so the diagnostics report exposes it.
    pub async fn fallback_total(&self) -> usize {
        let probe = ListQuery::new(None, Some(1), Some(1), &self.spec);
        match self.local.select(&probe).await {
            Ok(page) => page.total,
            Err(_) => 0,
        }
    }

    pub async fn list(&self, query: &ListQuery) -> Result<RecordPage, StoreError> {
        if let Some(remote) = &self.remote {
            match remote.select(query).await {
                Ok(page) => return Ok(page),
                Err(err) => tracing::warn!(
                    collection = self.spec.name,
                    error = %err,
                    "remote list failed, serving the fallback store"
                ),
            }
        }
        self.local.select(query).await
    }

    pub async fn create(&self, draft: &RecordDraft) -> Result<Vec<Record>, StoreError> {
        if let Some(remote) = &self.remote {
            match remote.insert(draft).await {
                Ok(rows) => return Ok(rows),
                Err(err) => tracing::warn!(
                    collection = self.spec.name,
                    error = %err,
                    "remote insert failed, writing to the fallback store"
                ),
            }
        }
        self.local.insert(draft).await
    }

    /// Returns the updated row(s); an id unknown to the remote store comes
    /// back as an empty set rather than a not-found error.
    pub async fn set_likes(
        &self,
        id: &str,
        likes: i64,
        caller: &Caller,
    ) -> Result<Vec<Record>, StoreError> {
        if let Some(remote) = &self.remote {
            match remote.update_likes(id, likes, caller).await {
                Ok(rows) => return Ok(rows),
                Err(err) => tracing::warn!(
                    collection = self.spec.name,
                    id,
                    error = %err,
                    "remote likes update failed, trying the fallback store"
                ),
            }
        }
        self.local.update_likes(id, likes, caller).await
    }

    pub async fn delete(&self, id: &str, caller: &Caller) -> Result<Vec<Record>, StoreError> {
        if let Some(remote) = &self.remote {
            match remote.delete_owned(id, caller).await {
                Ok(rows) => return Ok(rows),
                Err(StoreError::Denied) => return Err(StoreError::Denied),
                Err(err) => tracing::warn!(
                    collection = self.spec.name,
                    id,
                    error = %err,
                    "remote delete failed, trying the fallback store"
                ),
            }
        }
        self.local.delete_owned(id, caller).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{CallerIdentity, UserMetadata};
    use crate::records::{AuthorStamp, POSTS};
    use tempfile::TempDir;

    fn local_gateway(dir: &TempDir) -> RecordGateway {
        let local = LocalStore::new(POSTS, dir.path().join("posts.json"));
        RecordGateway::new(POSTS, None, local)
    }

    fn caller(id: &str, display: &str) -> Caller {
        Caller {
            token: "tok".into(),
            identity: Some(CallerIdentity {
                id: id.into(),
                email: None,
                user_metadata: UserMetadata {
                    display_name: Some(display.into()),
                    username: None,
                    name: None,
                },
            }),
        }
    }

    #[tokio::test]
    async fn unconfigured_remote_serves_everything_locally() {
        let dir = TempDir::new().unwrap();
        let gateway = local_gateway(&dir);
        assert!(!gateway.remote_configured());
        assert!(gateway.capabilities().is_none());

        let author = AuthorStamp {
            id: Some("user-1".into()),
            display: "alice".into(),
            email: None,
        };
        let rows = gateway
            .create(&RecordDraft::post("hello", "world", None, &author))
            .await
            .unwrap();
        assert!(rows[0].id.starts_with("local-"));

        let page = gateway
            .list(&ListQuery::new(None, None, None, &POSTS))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(gateway.fallback_total().await, 1);

        let id = rows[0].id.clone();
        let liked = gateway.set_likes(&id, 3, &caller("user-1", "alice")).await.unwrap();
        assert_eq!(liked[0].likes, Some(3));

        assert!(matches!(
            gateway.delete(&id, &caller("user-2", "mallory")).await,
            Err(StoreError::Denied)
        ));
        let removed = gateway.delete(&id, &caller("user-1", "alice")).await.unwrap();
        assert_eq!(removed[0].id, id);
    }
}
