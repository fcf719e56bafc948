//! Remote store adapter for the platform's relational REST service.
//!
//! Operations are issued optimistically against the fully-migrated schema.
//! When the remote names a missing column, the capability flag for that
//! column is cleared and the same logical operation is re-issued once with
//! a narrowed shape; a second schema complaint makes the operation
//! remote-unusable and the gateway falls back.

use super::{detect_missing_column, CapabilitySnapshot, RecordStore, SchemaCapabilities};
use crate::config::RemoteConfig;
use crate::error::StoreError;
use crate::identity::Caller;
use crate::records::{CollectionSpec, ListQuery, Record, RecordDraft, RecordPage};
use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct RemoteStore {
    http: reqwest::Client,
    remote: RemoteConfig,
    spec: CollectionSpec,
    caps: Arc<SchemaCapabilities>,
}

impl RemoteStore {
    pub fn new(http: reqwest::Client, remote: RemoteConfig, spec: CollectionSpec) -> Self {
        Self {
            http,
            remote,
            spec,
            caps: Arc::new(SchemaCapabilities::assume_full()),
        }
    }

    pub fn capabilities(&self) -> CapabilitySnapshot {
        self.caps.snapshot()
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.remote.base_url, self.spec.name)
    }

    /// Mutations present the caller's own bearer token when no service key
    /// is configured, so remote row-level policies still apply.
    fn write_key<'a>(&'a self, caller: &'a Caller) -> &'a str {
        self.remote
            .service_key
            .as_deref()
            .unwrap_or(&caller.token)
    }

    fn select_columns(&self) -> String {
        let columns: Vec<&str> = if self.spec.select_can_narrow {
            self.spec
                .columns
                .iter()
                .copied()
                .filter(|column| self.caps.has(column))
                .collect()
        } else {
            self.spec.columns.to_vec()
        };
        columns.join(",")
    }

    /// Serialized draft minus any column the schema is known to lack.
    /// Dropping `author_display` leaves `author_email` (when the draft has
    /// one) as the degraded author marker.
    fn insert_payload(&self, draft: &RecordDraft) -> Result<Value, StoreError> {
        let mut value = serde_json::to_value(draft).map_err(StoreError::unavailable)?;
        if let Value::Object(fields) = &mut value {
            for column in self.spec.degradable_columns {
                if !self.caps.has(column) {
                    fields.remove(*column);
                }
            }
        }
        Ok(Value::Array(vec![value]))
    }

    async fn run_select(&self, key: &str, query: &ListQuery) -> Result<RecordPage, StoreError> {
        let (from, to) = query.range();
        let mut request = self
            .http
            .get(self.table_url())
            .query(&[
                ("select", self.select_columns().as_str()),
                ("order", "created_at.desc"),
            ])
            .header("apikey", key)
            .bearer_auth(key)
            .header("Range", format!("{from}-{to}"))
            .header("Prefer", "count=exact");
        if let (Some(column), Some(value)) = (self.spec.filter_column, query.filter.as_deref()) {
            request = request.query(&[(column, format!("eq.{value}"))]);
        }
        let response = request.send().await.map_err(StoreError::unavailable)?;
        if !response.status().is_success() {
            return Err(self.classify_failure(response, "select").await);
        }
        let counted = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total);
        let records: Vec<Record> = response.json().await.map_err(StoreError::unavailable)?;
        let total = counted.unwrap_or(records.len());
        Ok(RecordPage { records, total })
    }

    async fn run_insert(&self, key: &str, draft: &RecordDraft) -> Result<Vec<Record>, StoreError> {
        let payload = self.insert_payload(draft)?;
        let response = self
            .http
            .post(self.table_url())
            .header("apikey", key)
            .bearer_auth(key)
            .header("Prefer", "return=representation")
            .json(&payload)
            .send()
            .await
            .map_err(StoreError::unavailable)?;
        if !response.status().is_success() {
            return Err(self.classify_failure(response, "insert").await);
        }
        response.json().await.map_err(StoreError::unavailable)
    }

    async fn run_delete(
        &self,
        key: &str,
        id: &str,
        owner_column: &str,
        owner_value: &str,
    ) -> Result<Vec<Record>, StoreError> {
        let response = self
            .http
            .delete(self.table_url())
            .query(&[
                ("id", format!("eq.{id}")),
                (owner_column, format!("eq.{owner_value}")),
            ])
            .header("apikey", key)
            .bearer_auth(key)
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(StoreError::unavailable)?;
        if !response.status().is_success() {
            return Err(self.classify_failure(response, "delete").await);
        }
        response.json().await.map_err(StoreError::unavailable)
    }

    async fn classify_failure(&self, response: reqwest::Response, operation: &str) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if let Some(column) = detect_missing_column(&body, self.spec.degradable_columns) {
            tracing::warn!(
                collection = self.spec.name,
                operation,
                column = %column,
                "remote reports a missing column"
            );
            return StoreError::MissingColumn { column };
        }
        tracing::warn!(
            collection = self.spec.name,
            operation,
            status = %status,
            body = %body.chars().take(300).collect::<String>(),
            "remote operation failed"
        );
        StoreError::unavailable(anyhow!(
            "remote {} on {} failed with status {}",
            operation,
            self.spec.name,
            status
        ))
    }

    /// The narrowed retry has already been spent: a further schema
    /// complaint is recorded for future requests but surfaces as plain
    /// unavailability now.
    fn exhaust_retry(&self, err: StoreError) -> StoreError {
        match err {
            StoreError::MissingColumn { column } => {
                self.caps.mark_missing(&column);
                StoreError::unavailable(anyhow!(
                    "remote schema for {} still incompatible after narrowing (column {})",
                    self.spec.name,
                    column
                ))
            }
            other => other,
        }
    }
}

#[async_trait]
impl RecordStore for RemoteStore {
    async fn select(&self, query: &ListQuery) -> Result<RecordPage, StoreError> {
        let Some(key) = self.remote.read_key() else {
            return Err(StoreError::unavailable(anyhow!(
                "no remote read credential configured"
            )));
        };
        match self.run_select(key, query).await {
            Err(StoreError::MissingColumn { column }) => {
                self.caps.mark_missing(&column);
                if !self.spec.select_can_narrow {
                    return Err(StoreError::unavailable(anyhow!(
                        "remote schema for {} lacks column {}",
                        self.spec.name,
                        column
                    )));
                }
                tracing::info!(
                    collection = self.spec.name,
                    column = %column,
                    "retrying select with narrowed column list"
                );
                self.run_select(key, query)
                    .await
                    .map_err(|err| self.exhaust_retry(err))
            }
            other => other,
        }
    }

    async fn insert(&self, draft: &RecordDraft) -> Result<Vec<Record>, StoreError> {
        let Some(key) = self.remote.service_key.as_deref() else {
            return Err(StoreError::unavailable(anyhow!(
                "remote inserts require the service credential"
            )));
        };
        match self.run_insert(key, draft).await {
            Err(StoreError::MissingColumn { column }) => {
                self.caps.mark_missing(&column);
                tracing::info!(
                    collection = self.spec.name,
                    column = %column,
                    "retrying insert with narrowed payload"
                );
                self.run_insert(key, draft)
                    .await
                    .map_err(|err| self.exhaust_retry(err))
            }
            other => other,
        }
    }

    async fn update_likes(
        &self,
        id: &str,
        likes: i64,
        caller: &Caller,
    ) -> Result<Vec<Record>, StoreError> {
        let key = self.write_key(caller);
        let response = self
            .http
            .patch(self.table_url())
            .query(&[("id", format!("eq.{id}"))])
            .header("apikey", key)
            .bearer_auth(key)
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "likes": likes }))
            .send()
            .await
            .map_err(StoreError::unavailable)?;
        if !response.status().is_success() {
            let err = self.classify_failure(response, "update").await;
            // the likes column exists in every schema generation; no retry
            return Err(self.exhaust_retry(err));
        }
        response.json().await.map_err(StoreError::unavailable)
    }

    async fn delete_owned(
        &self,
        id: &str,
        caller: &Caller,
    ) -> Result<Vec<Record>, StoreError> {
        let key = self.write_key(caller);
        let stamp = caller.author_stamp();

        if self.caps.has("author_id") {
            if let Some(author_id) = stamp.id.as_deref() {
                match self.run_delete(key, id, "author_id", author_id).await {
                    Ok(rows) if rows.is_empty() => return Err(StoreError::Denied),
                    Ok(rows) => return Ok(rows),
                    Err(StoreError::MissingColumn { column }) => {
                        self.caps.mark_missing(&column);
                        tracing::info!(
                            collection = self.spec.name,
                            column = %column,
                            "retrying delete with identity-string owner predicates"
                        );
                        // fall through to the degraded owner ladder
                    }
                    Err(other) => return Err(other),
                }
            }
        }

        // degraded ownership: author_display first, then author_email,
        // short-circuiting on the first non-empty result; zero matches
        // overall is an ownership denial, not a missing record
        let by_display = self
            .run_delete(key, id, "author_display", &stamp.display)
            .await
            .map_err(|err| self.exhaust_retry(err))?;
        if !by_display.is_empty() {
            return Ok(by_display);
        }
        if let Some(email) = stamp.email.as_deref() {
            let by_email = self
                .run_delete(key, id, "author_email", email)
                .await
                .map_err(|err| self.exhaust_retry(err))?;
            if !by_email.is_empty() {
                return Ok(by_email);
            }
        }
        Err(StoreError::Denied)
    }
}

fn parse_content_range_total(value: &str) -> Option<usize> {
    value.rsplit('/').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AuthorStamp, COMMENTS, POSTS};

    fn remote_store(spec: CollectionSpec) -> RemoteStore {
        let remote = RemoteConfig {
            base_url: "http://localhost:1".into(),
            service_key: Some("service".into()),
            anon_key: None,
        };
        RemoteStore::new(reqwest::Client::new(), remote, spec)
    }

    #[test]
    fn select_list_narrows_only_where_allowed() {
        let comments = remote_store(COMMENTS);
        assert!(comments.select_columns().contains("author_id"));
        comments.caps.mark_missing("author_id");
        assert!(!comments.select_columns().contains("author_id"));

        // post reads never narrow, even once the flag is cleared
        let posts = remote_store(POSTS);
        posts.caps.mark_missing("author_display");
        assert!(posts.select_columns().contains("author_display"));
    }

    #[test]
    fn insert_payload_drops_columns_the_schema_lacks() {
        let store = remote_store(POSTS);
        let author = AuthorStamp {
            id: Some("user-1".into()),
            display: "alice".into(),
            email: Some("alice@example.com".into()),
        };
        let draft = RecordDraft::post("title", "body", None, &author);

        let full = store.insert_payload(&draft).unwrap();
        let row = &full.as_array().unwrap()[0];
        assert!(row.get("author_display").is_some());
        assert!(row.get("author_id").is_some());

        store.caps.mark_missing("author_display");
        store.caps.mark_missing("author_id");
        let narrowed = store.insert_payload(&draft).unwrap();
        let row = &narrowed.as_array().unwrap()[0];
        assert!(row.get("author_display").is_none());
        assert!(row.get("author_id").is_none());
        // the email survives as the degraded author marker
        assert_eq!(
            row.get("author_email").and_then(Value::as_str),
            Some("alice@example.com")
        );
    }

    #[test]
    fn content_range_totals_parse_forgivingly() {
        assert_eq!(parse_content_range_total("0-9/42"), Some(42));
        assert_eq!(parse_content_range_total("items 0-0/1"), Some(1));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-9/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }
}
