use tagtree_log::LogError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("framing error: {0}")]
    Framing(String),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("version mismatch: local {local}, remote {remote}")]
    VersionMismatch { local: u32, remote: u32 },

    #[error("remote error: code={code}, message={message}")]
    Remote { code: u32, message: String },

    #[error("received entries failed verification: {0}")]
    VerificationFailed(String),

    #[error("replication did not settle within {0} rounds")]
    RoundLimit(u32),

    #[error(transparent)]
    Log(#[from] LogError),
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
