//! Store-level error taxonomy.
//!
//! These variants drive the gateway's control flow: `MissingColumn` triggers
//! the single degradation retry inside the remote adapter and never reaches
//! the HTTP layer, `Unavailable` hands the request to the fallback store,
//! and `NotFound`/`Denied` surface as 404/403.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The remote schema lacks a column the operation referenced.
    #[error("remote schema is missing column `{column}`")]
    MissingColumn { column: String },

    /// The target record does not exist in this store.
    #[error("record not found")]
    NotFound,

    /// The caller is not the owner of the target record (or the remote
    /// matched zero rows under the ownership predicate).
    #[error("caller does not own the record")]
    Denied,

    /// The store cannot service the operation at all; the gateway treats
    /// this as a signal to fall back (or, from the fallback store itself,
    /// as a terminal internal error).
    #[error("store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

impl StoreError {
    pub fn unavailable(err: impl Into<anyhow::Error>) -> Self {
        StoreError::Unavailable(err.into())
    }
}
