//! Error types for EmberKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using EmberError
pub type Result<T> = std::result::Result<T, EmberError>;

/// Unified error type for EmberKV operations
#[derive(Debug, Error)]
pub enum EmberError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL write failed: {0}")]
    WalWrite(String),

    /// The log handle was lost after a failed compaction
    #[error("WAL is unavailable; reopen the engine")]
    WalUnavailable,

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("bucket not found: {bucket}")]
    BucketNotFound { bucket: String },

    #[error("key not found: {bucket}/{key}")]
    KeyNotFound { bucket: String, key: String },

    /// Only raised by transactional reads; `Engine::get` reports
    /// expiry as `Lookup::Expired` instead.
    #[error("key has expired: {bucket}/{key}")]
    KeyExpired { bucket: String, key: String },

    // -------------------------------------------------------------------------
    // Transaction / Compaction Errors
    // -------------------------------------------------------------------------
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    #[error("compaction failed: {0}")]
    Compaction(String),

    // -------------------------------------------------------------------------
    // Lifecycle / Configuration Errors
    // -------------------------------------------------------------------------
    #[error("engine used before load()")]
    NotLoaded,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EmberError {
    /// True for `BucketNotFound` and `KeyNotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EmberError::BucketNotFound { .. } | EmberError::KeyNotFound { .. }
        )
    }

    pub(crate) fn bucket_not_found(bucket: &str) -> Self {
        EmberError::BucketNotFound {
            bucket: bucket.to_string(),
        }
    }

    pub(crate) fn key_not_found(bucket: &str, key: &str) -> Self {
        EmberError::KeyNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}
