//! The generic community record and its collection descriptors.
//!
//! Posts and comments share one row shape with optional fields; which fields
//! a given collection populates is described by its [`CollectionSpec`]. Both
//! backing stores speak in [`Record`]s so the gateway can swap them freely.

use crate::utils::{now_utc_iso, to_base36, truncate_chars, ANONYMOUS_AUTHOR};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<i64>,
    #[serde(default)]
    pub created_at: String,
}

/// A fully-assembled record awaiting an id. The remote store posts it as-is
/// (the row id is store-native); the fallback store assigns a `local-*` id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<i64>,
    pub created_at: String,
}

impl RecordDraft {
    /// Assembles a post draft: caps applied, author stamped, timestamp set
    /// by the gateway rather than the store.
    pub fn post(title: &str, content: &str, likes: Option<i64>, author: &AuthorStamp) -> Self {
        Self {
            post_id: None,
            parent_id: None,
            author_id: author.id.clone(),
            author_display: Some(author.display.clone()),
            author_email: author.email.clone(),
            title: Some(truncate_chars(title, POSTS.title_cap.unwrap_or(usize::MAX))),
            content: Some(truncate_chars(content, POSTS.content_cap)),
            likes: Some(likes.unwrap_or(0)),
            created_at: now_utc_iso(),
        }
    }

    /// Assembles a comment draft. `parent_id` threads the comment under
    /// another comment; depth is not limited.
    pub fn comment(
        post_id: &str,
        content: &str,
        parent_id: Option<&str>,
        author: &AuthorStamp,
    ) -> Self {
        Self {
            post_id: Some(post_id.to_string()),
            parent_id: parent_id.map(|p| p.to_string()),
            author_id: author.id.clone(),
            author_display: Some(author.display.clone()),
            author_email: None,
            title: None,
            content: Some(truncate_chars(content, COMMENTS.content_cap)),
            likes: None,
            created_at: now_utc_iso(),
        }
    }

    pub fn into_record(self, id: String) -> Record {
        Record {
            id,
            post_id: self.post_id,
            parent_id: self.parent_id,
            author_id: self.author_id,
            author_display: self.author_display,
            author_email: self.author_email,
            title: self.title,
            content: self.content,
            likes: self.likes,
            created_at: self.created_at,
        }
    }
}

/// Author fields resolved once from the caller at write time. The same
/// struct doubles as the ownership claim on delete, so both stores decide
/// authorization from identical inputs.
#[derive(Debug, Clone)]
pub struct AuthorStamp {
    pub id: Option<String>,
    pub display: String,
    pub email: Option<String>,
}

impl AuthorStamp {
    pub fn anonymous() -> Self {
        Self {
            id: None,
            display: ANONYMOUS_AUTHOR.to_string(),
            email: None,
        }
    }
}

/// The shared ownership decision. `author_id`, when the record carries one,
/// must match the caller exactly; otherwise authorization degrades to
/// display-name then email string comparison (accepted weaker guarantee).
pub fn owner_matches(record: &Record, claim: &AuthorStamp) -> bool {
    if let Some(author_id) = record.author_id.as_deref() {
        return claim.id.as_deref() == Some(author_id);
    }
    if let Some(display) = record.author_display.as_deref() {
        if display.trim() == claim.display.trim() {
            return true;
        }
    }
    match (record.author_email.as_deref(), claim.email.as_deref()) {
        (Some(record_email), Some(claim_email)) => record_email == claim_email,
        _ => false,
    }
}

/// Static description of one gateway collection.
#[derive(Debug, Clone, Copy)]
pub struct CollectionSpec {
    pub name: &'static str,
    /// Select list assuming the fully-migrated schema.
    pub columns: &'static [&'static str],
    /// Equality-filter column for list queries, when the collection has one.
    pub filter_column: Option<&'static str>,
    pub title_cap: Option<usize>,
    pub content_cap: usize,
    pub default_limit: usize,
    /// Author columns the externally-migrated schema may still lack, in
    /// degradation priority order; everything else is assumed present.
    pub degradable_columns: &'static [&'static str],
    /// Whether a select may be re-issued once with the missing column
    /// dropped. Post reads keep the all-or-nothing behavior: any remote
    /// failure sends them straight to the fallback store.
    pub select_can_narrow: bool,
}

pub const POSTS: CollectionSpec = CollectionSpec {
    name: "posts",
    columns: &[
        "id",
        "title",
        "content",
        "author_display",
        "author_email",
        "author_id",
        "created_at",
        "likes",
    ],
    filter_column: None,
    title_cap: Some(200),
    content_cap: 10_000,
    default_limit: 100,
    degradable_columns: &["author_display", "author_id"],
    select_can_narrow: false,
};

pub const COMMENTS: CollectionSpec = CollectionSpec {
    name: "comments",
    columns: &[
        "id",
        "post_id",
        "parent_id",
        "author_id",
        "author_display",
        "content",
        "created_at",
    ],
    filter_column: Some("post_id"),
    title_cap: None,
    content_cap: 2_000,
    default_limit: 10,
    degradable_columns: &["author_id"],
    select_can_narrow: true,
};

/// Normalized list-query parameters: `page >= 1`, `1 <= limit <= 200`.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub filter: Option<String>,
    pub page: usize,
    pub limit: usize,
}

impl ListQuery {
    pub fn new(
        filter: Option<String>,
        page: Option<usize>,
        limit: Option<usize>,
        spec: &CollectionSpec,
    ) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(spec.default_limit).clamp(1, 200);
        Self {
            filter,
            page,
            limit,
        }
    }

    /// Zero-based inclusive row range for this page; saturates on absurd
    /// page numbers rather than overflowing.
    pub fn range(&self) -> (usize, usize) {
        let from = self.page.saturating_sub(1).saturating_mul(self.limit);
        (from, from.saturating_add(self.limit - 1))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub total: usize,
}

/// Fallback-store id: `local-<base36 millisecond timestamp>`. Visually
/// distinct from store-native ids, not guaranteed globally unique.
pub fn local_record_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    format!("local-{}", to_base36(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_author(
        author_id: Option<&str>,
        display: Option<&str>,
        email: Option<&str>,
    ) -> Record {
        Record {
            id: "r1".into(),
            post_id: None,
            parent_id: None,
            author_id: author_id.map(String::from),
            author_display: display.map(String::from),
            author_email: email.map(String::from),
            title: None,
            content: Some("body".into()),
            likes: None,
            created_at: now_utc_iso(),
        }
    }

    #[test]
    fn ownership_requires_exact_author_id_when_present() {
        let record = record_with_author(Some("user-1"), Some("alice"), None);
        let owner = AuthorStamp {
            id: Some("user-1".into()),
            display: "alice".into(),
            email: None,
        };
        let imposter = AuthorStamp {
            id: Some("user-2".into()),
            // matching display must not defeat the id check
            display: "alice".into(),
            email: Some("alice@example.com".into()),
        };
        assert!(owner_matches(&record, &owner));
        assert!(!owner_matches(&record, &imposter));
    }

    #[test]
    fn ownership_degrades_to_display_then_email() {
        let record = record_with_author(None, Some(" alice "), Some("alice@example.com"));
        let by_display = AuthorStamp {
            id: None,
            display: "alice".into(),
            email: None,
        };
        let by_email = AuthorStamp {
            id: None,
            display: "someone-else".into(),
            email: Some("alice@example.com".into()),
        };
        let stranger = AuthorStamp {
            id: None,
            display: "mallory".into(),
            email: Some("mallory@example.com".into()),
        };
        assert!(owner_matches(&record, &by_display));
        assert!(owner_matches(&record, &by_email));
        assert!(!owner_matches(&record, &stranger));
    }

    #[test]
    fn post_drafts_apply_caps_and_defaults() {
        let author = AuthorStamp {
            id: Some("user-1".into()),
            display: "alice".into(),
            email: Some("alice@example.com".into()),
        };
        let long_title = "t".repeat(500);
        let draft = RecordDraft::post(&long_title, "hello", None, &author);
        assert_eq!(draft.title.as_deref().map(|t| t.len()), Some(200));
        assert_eq!(draft.likes, Some(0));
        assert_eq!(draft.author_display.as_deref(), Some("alice"));
        assert_eq!(draft.author_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn list_query_clamps_page_and_limit() {
        let q = ListQuery::new(None, Some(0), Some(9_999), &COMMENTS);
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, 200);
        assert_eq!(q.range(), (0, 199));

        let q = ListQuery::new(None, Some(3), None, &COMMENTS);
        assert_eq!(q.limit, 10);
        assert_eq!(q.range(), (20, 29));
    }

    #[test]
    fn list_query_range_saturates_on_huge_pages() {
        let q = ListQuery::new(None, Some(usize::MAX), Some(2), &POSTS);
        assert_eq!(q.range(), (usize::MAX, usize::MAX));

        let q = ListQuery::new(None, Some(usize::MAX / 2), Some(200), &POSTS);
        let (from, to) = q.range();
        assert!(from <= to, "range stays ordered even when saturated");
    }

    #[test]
    fn local_ids_use_the_local_namespace() {
        let id = local_record_id();
        assert!(id.starts_with("local-"));
        assert!(id.len() > "local-".len());
    }
}
