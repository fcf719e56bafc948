//! File-backed fallback store.
//!
//! One JSON array per collection at a fixed path, read wholesale and
//! written back wholesale. Not a cache: whenever the remote store is
//! unconfigured or unusable, this file is the system of record.

use super::RecordStore;
use crate::error::StoreError;
use crate::identity::Caller;
use crate::records::{
    local_record_id, owner_matches, CollectionSpec, ListQuery, Record, RecordDraft, RecordPage,
};
use anyhow::Context;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// The file handle is injected at construction and every read-modify-write
/// cycle runs under one lock acquisition, so concurrent requests cannot
/// interleave and drop each other's rows. Clones share the lock.
#[derive(Clone)]
pub struct LocalStore {
    spec: CollectionSpec,
    path: PathBuf,
    guard: Arc<Mutex<()>>,
}

impl LocalStore {
    pub fn new(spec: CollectionSpec, path: PathBuf) -> Self {
        Self {
            spec,
            path,
            guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or unparsable file reads as an empty collection; the
    /// fallback store never raises on read.
    async fn read_records(&self) -> Vec<Record> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                tracing::warn!(
                    collection = self.spec.name,
                    path = %self.path.display(),
                    error = %err,
                    "could not read fallback file, treating as empty"
                );
                return Vec::new();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(
                    collection = self.spec.name,
                    path = %self.path.display(),
                    error = %err,
                    "fallback file is not a JSON record array, treating as empty"
                );
                Vec::new()
            }
        }
    }

    async fn write_records(&self, records: &[Record]) -> Result<(), StoreError> {
        self.persist(records).await.map_err(StoreError::Unavailable)
    }

    async fn persist(&self, records: &[Record]) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating fallback data dir {}", parent.display()))?;
        }
        // write the whole array next to the live file, then swap it in, so
        // a failed write never truncates existing data
        let staged = self.path.with_extension("tmp");
        tokio::fs::write(&staged, &bytes)
            .await
            .with_context(|| format!("staging fallback file {}", staged.display()))?;
        tokio::fs::rename(&staged, &self.path)
            .await
            .with_context(|| format!("replacing fallback file {}", self.path.display()))?;
        Ok(())
    }

    fn matches_filter(&self, record: &Record, value: &str) -> bool {
        match self.spec.filter_column {
            Some("post_id") => record.post_id.as_deref() == Some(value),
            _ => true,
        }
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    async fn select(&self, query: &ListQuery) -> Result<RecordPage, StoreError> {
        let _guard = self.guard.lock().await;
        let mut records = self.read_records().await;
        if let Some(value) = &query.filter {
            records.retain(|record| self.matches_filter(record, value));
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = records.len();
        let (from, _) = query.range();
        let page = records.into_iter().skip(from).take(query.limit).collect();
        Ok(RecordPage {
            records: page,
            total,
        })
    }

    async fn insert(&self, draft: &RecordDraft) -> Result<Vec<Record>, StoreError> {
        let _guard = self.guard.lock().await;
        let mut records = self.read_records().await;
        let record = draft.clone().into_record(local_record_id());
        records.insert(0, record.clone());
        self.write_records(&records).await?;
        Ok(vec![record])
    }

    async fn update_likes(
        &self,
        id: &str,
        likes: i64,
        _caller: &Caller,
    ) -> Result<Vec<Record>, StoreError> {
        let _guard = self.guard.lock().await;
        let mut records = self.read_records().await;
        let Some(record) = records.iter_mut().find(|record| record.id == id) else {
            return Err(StoreError::NotFound);
        };
        record.likes = Some(likes);
        let updated = record.clone();
        self.write_records(&records).await?;
        Ok(vec![updated])
    }

    async fn delete_owned(
        &self,
        id: &str,
        caller: &Caller,
    ) -> Result<Vec<Record>, StoreError> {
        let _guard = self.guard.lock().await;
        let mut records = self.read_records().await;
        let Some(index) = records.iter().position(|record| record.id == id) else {
            return Err(StoreError::NotFound);
        };
        if !owner_matches(&records[index], &caller.author_stamp()) {
            return Err(StoreError::Denied);
        }
        let removed = records.remove(index);
        self.write_records(&records).await?;
        Ok(vec![removed])
    }
}
