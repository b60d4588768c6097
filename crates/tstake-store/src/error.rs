//! Error types for the store module.

use thiserror::Error;
use tstake_core::{CodecError, StateHash};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// State encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] CodecError),

    /// Loaded state does not hash to the recorded checkpoint.
    #[error("integrity check failed: checkpoint {expected}, loaded state {actual}")]
    Integrity { expected: StateHash, actual: StateHash },

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    Task(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
