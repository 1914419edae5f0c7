use thiserror::Error;

/// Errors raised by read-model stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An insert-only save found an existing record with the same key.
    #[error("{model} with key {key} already exists")]
    Duplicate { model: &'static str, key: String },

    /// A stored row could not be mapped back to its read model.
    #[error("Invalid {model} row: {reason}")]
    InvalidRow { model: &'static str, reason: String },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
