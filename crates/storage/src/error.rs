//! Storage error types

use marketsync_sync_engine::SyncError;
use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the SQLite storage layer
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database operation failed
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    /// Database is corrupted and needs repair
    #[error("Database corrupted: {details}")]
    Corrupted { details: String },

    /// Schema migration failed
    #[error("Migration failed: {version} - {reason}")]
    MigrationFailed { version: i64, reason: String },
}

impl StorageError {
    /// Wraps a sqlx error with context
    pub fn database(message: impl Into<String>, source: sqlx::Error) -> Self {
        StorageError::Database {
            message: message.into(),
            source,
        }
    }
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        SyncError::storage(err)
    }
}
