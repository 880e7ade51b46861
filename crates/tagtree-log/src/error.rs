use tagtree_types::LogId;

/// Errors from a storage backend.
///
/// These are the "storage unavailable" failures of the log layer. Higher
/// layers propagate them unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("corrupt key file for {log}: {reason}")]
    CorruptKey { log: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Errors produced by log and container operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    #[error("log {} is read-only on this container", .0.short_id())]
    ReadOnly(LogId),

    #[error("payload of {size} bytes exceeds the {max}-byte entry limit")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("entry {seq} out of range (log length {len})")]
    OutOfRange { seq: u64, len: u64 },

    #[error("not a valid log identifier: {0}")]
    InvalidId(String),

    #[error("verification failed for {log} at seq {seq}: {reason}")]
    Verification { log: String, seq: u64, reason: String },

    #[error("log {} was closed while waiting for entry {seq}", .log.short_id())]
    Closed { log: LogId, seq: u64 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result alias for storage backends.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result alias for log operations.
pub type LogResult<T> = Result<T, LogError>;
