use tagtree_log::LogError;
use tagtree_types::Version;

/// Errors from drive operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriveError {
    /// No file exists at the path in the requested version.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The path cannot name a file.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Checkout beyond the latest version.
    #[error("version {requested} out of range (latest is {latest})")]
    VersionOutOfRange { requested: Version, latest: Version },

    /// A metadata or content entry cannot be decoded.
    #[error("corrupt entry {seq} in {log}: {reason}")]
    CorruptEntry { log: String, seq: u64, reason: String },

    /// The two header entries do not describe the same drive.
    #[error("drive header mismatch: {0}")]
    HeaderMismatch(String),

    /// File bytes do not match the digest recorded in metadata.
    #[error("content digest mismatch for {path}")]
    HashMismatch { path: String },

    /// The drive was attached without its secret keys.
    #[error("drive is read-only on this container")]
    ReadOnly,

    #[error(transparent)]
    Log(#[from] LogError),
}

/// Result alias for drive operations.
pub type DriveResult<T> = Result<T, DriveError>;
