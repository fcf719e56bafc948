//! The storage port: one operation contract, two implementations.
//!
//! [`RemoteStore`] speaks the platform's relational REST dialect;
//! [`LocalStore`] is the file-backed fallback. The gateway picks between
//! them per request, so everything above this module is store-agnostic.

pub mod local;
pub mod remote;

pub use local::LocalStore;
pub use remote::RemoteStore;

use crate::error::StoreError;
use crate::identity::Caller;
use crate::records::{ListQuery, Record, RecordDraft, RecordPage};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// One page of records, newest first; `total` counts the whole
    /// filtered collection, not the page.
    async fn select(&self, query: &ListQuery) -> Result<RecordPage, StoreError>;

    /// Persists a fully-assembled draft and returns the stored row(s).
    async fn insert(&self, draft: &RecordDraft) -> Result<Vec<Record>, StoreError>;

    /// Sets the likes counter on one record. Ownership is not checked;
    /// any authenticated caller may adjust the counter.
    async fn update_likes(
        &self,
        id: &str,
        likes: i64,
        caller: &Caller,
    ) -> Result<Vec<Record>, StoreError>;

    /// Removes a record the caller owns and returns it.
    async fn delete_owned(&self, id: &str, caller: &Caller)
        -> Result<Vec<Record>, StoreError>;
}

/// Which optional author columns the live remote schema still has. The
/// schema is migrated out-of-band, so flags start optimistic and are
/// cleared the first time the remote names a column in a missing-column
/// failure. They stay cleared for the life of the process; later requests
/// narrow their column sets up front instead of re-probing.
#[derive(Debug)]
pub struct SchemaCapabilities {
    author_id: AtomicBool,
    author_display: AtomicBool,
}

impl SchemaCapabilities {
    pub fn assume_full() -> Self {
        Self {
            author_id: AtomicBool::new(true),
            author_display: AtomicBool::new(true),
        }
    }

    /// Columns without a flag are treated as always present.
    pub fn has(&self, column: &str) -> bool {
        match column {
            "author_id" => self.author_id.load(Ordering::Relaxed),
            "author_display" => self.author_display.load(Ordering::Relaxed),
            _ => true,
        }
    }

    pub fn mark_missing(&self, column: &str) {
        match column {
            "author_id" => self.author_id.store(false, Ordering::Relaxed),
            "author_display" => self.author_display.store(false, Ordering::Relaxed),
            _ => {}
        }
    }

    pub fn snapshot(&self) -> CapabilitySnapshot {
        CapabilitySnapshot {
            author_id: self.author_id.load(Ordering::Relaxed),
            author_display: self.author_display.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the flags for the diagnostics report.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilitySnapshot {
    pub author_id: bool,
    pub author_display: bool,
}

/// Classifies a remote failure body as a missing-column complaint and
/// names the column to drop. A body matches when it mentions one of the
/// candidate columns outright, carries the undefined-column code `42703`,
/// or pairs "column" with "does not exist"; in the latter two cases the
/// primary (first) candidate is the one degraded.
pub fn detect_missing_column(body: &str, candidates: &[&str]) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }
    let message = body.to_lowercase();
    for candidate in candidates {
        if message.contains(&candidate.to_lowercase()) {
            return Some((*candidate).to_string());
        }
    }
    let generic = message.contains("42703")
        || (message.contains("column") && message.contains("does not exist"));
    if generic {
        candidates.first().map(|c| (*c).to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_names_the_mentioned_column() {
        let body = r#"{"code":"PGRST204","message":"Could not find the 'author_id' column of 'comments' in the schema cache"}"#;
        assert_eq!(
            detect_missing_column(body, &["author_id"]),
            Some("author_id".to_string())
        );
        assert_eq!(
            detect_missing_column(body, &["author_display", "author_id"]),
            Some("author_id".to_string())
        );
    }

    #[test]
    fn classifier_falls_back_to_primary_candidate_on_generic_signature() {
        let by_code = r#"{"code":"42703","message":"undefined column"}"#;
        assert_eq!(
            detect_missing_column(by_code, &["author_display", "author_id"]),
            Some("author_display".to_string())
        );

        let by_phrase = r#"{"message":"column \"legacy\" does not exist"}"#;
        assert_eq!(
            detect_missing_column(by_phrase, &["author_id"]),
            Some("author_id".to_string())
        );
    }

    #[test]
    fn classifier_ignores_unrelated_failures() {
        let body = r#"{"message":"duplicate key value violates unique constraint"}"#;
        assert_eq!(detect_missing_column(body, &["author_id"]), None);
        assert_eq!(detect_missing_column(body, &[]), None);
    }

    #[test]
    fn capability_flags_start_optimistic_and_stay_cleared() {
        let caps = SchemaCapabilities::assume_full();
        assert!(caps.has("author_id"));
        assert!(caps.has("author_display"));
        assert!(caps.has("created_at"));

        caps.mark_missing("author_id");
        assert!(!caps.has("author_id"));
        assert!(caps.has("author_display"));

        // unknown columns are a no-op
        caps.mark_missing("created_at");
        assert!(caps.has("created_at"));

        let snapshot = caps.snapshot();
        assert!(!snapshot.author_id);
        assert!(snapshot.author_display);
    }
}
