//! Error types for index operations.

use tagtree_log::LogError;
use thiserror::Error;

/// Errors that can occur during index operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// The key is not acceptable as a tag name.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The header entry is missing or cannot be decoded.
    #[error("index header: {0}")]
    Header(String),

    /// An entry after the header cannot be decoded.
    #[error("corrupt index entry at seq {seq}: {reason}")]
    CorruptEntry { seq: u64, reason: String },

    /// `create` was given a log that already has entries.
    #[error("log {0} already holds entries")]
    NotEmpty(String),

    #[error(transparent)]
    Log(#[from] LogError),
}

/// Convenience type alias for index operations.
pub type IndexResult<T> = std::result::Result<T, IndexError>;
