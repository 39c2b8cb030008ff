// src/store/error.rs
// =============================================================================
// Error types for the persistence layer.
//
// Two levels:
// - StorageError: the key-value backend itself failed (disk, encoding)
// - StoreError: what LinkStore / VisitQueue callers see
//
// Rust concepts:
// - thiserror: derive Display and Error for our enums
// - #[from]: lets the ? operator convert one error type into another
// =============================================================================

use thiserror::Error;

/// The key-value backend failed a read or write.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by LinkStore and VisitQueue operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend failure. Jobs stop themselves when they see this.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A persisted record exists but has the wrong shape.
    #[error("record '{key}' could not be decoded: {source}")]
    Decode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// markVisited was asked about a link the store has never seen.
    #[error("link is not in the store: {0}")]
    UnknownLink(String),
}

impl StoreError {
    /// True for faults that mean the persisted state can no longer be trusted.
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, StoreError::Storage(_) | StoreError::Decode { .. })
    }
}
