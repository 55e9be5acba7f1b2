use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// Row-level access rule rejected the request.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request violates a data invariant (e.g. a direct chat with three members).
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A stored message row could not be mapped back to a body.
    #[error("Protocol error: {0}")]
    Protocol(#[from] devconnect_shared::ProtocolError),

    /// Object rejected by the bucket's size limit.
    #[error("Object too large: {size} bytes (max {max})")]
    ObjectTooLarge { size: usize, max: usize },

    /// Object storage failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The database mutex was poisoned by a panicking holder.
    #[error("Database lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
