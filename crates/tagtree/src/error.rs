use tagtree_drive::DriveError;
use tagtree_index::IndexError;
use tagtree_log::{LogError, StorageError};
use tagtree_sync::SyncError;
use thiserror::Error;

/// Errors surfaced by [`TaggedStore`](crate::TaggedStore).
///
/// `Clone` so that a terminal attachment failure can be handed to every
/// caller waiting on readiness.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagStoreError {
    #[error("corrupt bootstrap record: {0}")]
    CorruptBootstrap(String),

    #[error("store is not ready")]
    NotReady,

    #[error("invalid tag {tag:?}: {reason}")]
    InvalidTag { tag: String, reason: String },

    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Log(LogError),

    #[error(transparent)]
    Index(IndexError),

    #[error(transparent)]
    Drive(DriveError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

// Storage failures keep their own variant at every layer.
impl From<LogError> for TagStoreError {
    fn from(e: LogError) -> Self {
        match e {
            LogError::Storage(s) => Self::Storage(s),
            other => Self::Log(other),
        }
    }
}

impl From<IndexError> for TagStoreError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::InvalidKey { key, reason } => Self::InvalidTag { tag: key, reason },
            IndexError::Log(log) => log.into(),
            other => Self::Index(other),
        }
    }
}

impl From<DriveError> for TagStoreError {
    fn from(e: DriveError) -> Self {
        match e {
            DriveError::Log(log) => log.into(),
            other => Self::Drive(other),
        }
    }
}

pub type TagStoreResult<T> = Result<T, TagStoreError>;
