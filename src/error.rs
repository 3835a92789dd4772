//! # Error Handling
//!
//! Error types shared across the sync engine. Remote failures are classified
//! in [`crate::provider::error`]; this module covers local storage and the
//! per-calendar pass.

use thiserror::Error;

use crate::provider::RetryableError;

/// Errors raised by the local event store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },
    #[error("invalid stored data: {message}")]
    InvalidData { message: String },
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }
}

/// Errors that abort a single calendar's synchronization pass.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote fetch failed: {0}")]
    Remote(#[source] RetryableError),
    #[error("resumption cursor rejected by provider: {0}")]
    CursorInvalidated(#[source] RetryableError),
    #[error("local store failure: {0}")]
    Store(#[from] StoreError),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SyncError {
    /// Short machine-readable code for logs and run summaries.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::Remote(_) => "remote",
            SyncError::CursorInvalidated(_) => "cursor_invalidated",
            SyncError::Store(_) => "store",
            SyncError::Configuration(_) => "configuration",
        }
    }

    /// Classified remote error, when the failure came from the provider.
    pub fn remote(&self) -> Option<&RetryableError> {
        match self {
            SyncError::Remote(err) | SyncError::CursorInvalidated(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RetryableError> for SyncError {
    fn from(err: RetryableError) -> Self {
        if err.is_cursor_invalidated() {
            SyncError::CursorInvalidated(err)
        } else {
            SyncError::Remote(err)
        }
    }
}
