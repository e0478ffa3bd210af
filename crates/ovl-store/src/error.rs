use thiserror::Error;

/// Errors from store and persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Snapshot serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The persisted snapshot file exists but cannot be parsed.
    #[error("corrupt snapshot at {path}: {reason}")]
    CorruptSnapshot { path: String, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
