//! Error types for sync-store.

/// Storage layer errors.
///
/// These are never swallowed: a failing statement may mean a persistence
/// invariant no longer holds.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row cannot be turned back into a record.
    #[error("corrupt {table} row {id}: {reason}")]
    Corrupt {
        /// Table the row lives in.
        table: &'static str,
        /// Primary key of the row.
        id: i64,
        /// What failed to decode.
        reason: String,
    },

    /// A write batch is inconsistent with its arguments.
    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    /// Label set could not be encoded.
    #[error("label encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StoreError>;
