use serde::{Deserialize, Serialize};
use tagtree_log::SignedEntry;
use tagtree_types::LogId;

use crate::types::LogStatus;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// All message types of the replication protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMessage {
    Hello { version: u32, capabilities: Vec<String> },
    HelloAck { version: u32, capabilities: Vec<String> },
    Status { logs: Vec<LogStatus> },
    Entries { log: LogId, entries: Vec<SignedEntry> },
    Done,
    Continue { more: bool },
    Error { code: u32, message: String },
}

impl SyncMessage {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Hello { .. } => 1,
            Self::HelloAck { .. } => 2,
            Self::Status { .. } => 3,
            Self::Entries { .. } => 4,
            Self::Done => 5,
            Self::Continue { .. } => 6,
            Self::Error { .. } => 255,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "Hello",
            Self::HelloAck { .. } => "HelloAck",
            Self::Status { .. } => "Status",
            Self::Entries { .. } => "Entries",
            Self::Done => "Done",
            Self::Continue { .. } => "Continue",
            Self::Error { .. } => "Error",
        }
    }
}

pub mod capabilities {
    pub const SIGNED_ENTRIES: &str = "signed-entries";
    pub const MULTI_ROUND: &str = "multi-round";
}

/// Error codes carried by [`SyncMessage::Error`].
pub mod codes {
    pub const VERSION_MISMATCH: u32 = 1;
    pub const PROTOCOL: u32 = 2;
    pub const VERIFICATION: u32 = 3;
}
