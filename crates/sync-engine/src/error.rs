// crates/sync-engine/src/error.rs
//! Error types for sync operations

use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while queueing or draining mutations
#[derive(Debug, Error)]
pub enum SyncError {
    /// The mutation cannot be queued as given
    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),

    /// The persistent key-value store failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The coordinator was created outside an async runtime
    #[error("Async runtime unavailable: {0}")]
    Runtime(String),
}

impl SyncError {
    /// Builds a storage error from any displayable source
    pub fn storage(err: impl std::fmt::Display) -> Self {
        SyncError::Storage(err.to_string())
    }
}
