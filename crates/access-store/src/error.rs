//! Error types for the access store

use thiserror::Error;

/// Errors raised by store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be decoded
    #[error("corrupt record: {reason}")]
    Corrupt {
        /// What failed to decode
        reason: String,
    },
}

/// Result alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
