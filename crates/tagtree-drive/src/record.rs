use serde::{Deserialize, Serialize};
use tagtree_types::{ContentDigest, LogId};

use crate::error::{DriveError, DriveResult};

/// Protocol marker written in both drive headers.
pub const DRIVE_PROTOCOL: &str = "tagtree-drive/1";

/// Largest slice of a file body stored in one content entry.
pub const CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Which half of a drive a log holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRole {
    Metadata,
    Content,
}

impl std::fmt::Display for LogRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metadata => write!(f, "metadata"),
            Self::Content => write!(f, "content"),
        }
    }
}

/// Entry 0 of each drive log. Names the other log of the pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveHeader {
    pub protocol: String,
    pub role: LogRole,
    pub peer: LogId,
}

impl DriveHeader {
    pub fn new(role: LogRole, peer: LogId) -> Self {
        Self {
            protocol: DRIVE_PROTOCOL.to_string(),
            role,
            peer,
        }
    }

    pub fn encode(&self) -> DriveResult<Vec<u8>> {
        encode(self)
    }

    /// Decode the header of `log` and check that it has the expected role.
    pub fn decode(log: &LogId, bytes: &[u8], expected: LogRole) -> DriveResult<Self> {
        let header: Self = decode(log, 0, bytes)?;
        if header.protocol != DRIVE_PROTOCOL {
            return Err(DriveError::HeaderMismatch(format!(
                "{} has protocol {:?}",
                log.short_id(),
                header.protocol
            )));
        }
        if header.role != expected {
            return Err(DriveError::HeaderMismatch(format!(
                "{} is a {} log, expected {}",
                log.short_id(),
                header.role,
                expected
            )));
        }
        Ok(header)
    }
}

/// Location of a file body in the content log.
///
/// Bodies larger than [`CHUNK_SIZE`] span several content entries, listed in
/// order. An empty file has no chunks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub chunks: Vec<u64>,
    pub size: u64,
    pub digest: ContentDigest,
}

/// One metadata entry: a single mutation of the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveOp {
    Put { path: String, blob: BlobRef },
    Delete { path: String },
}

impl DriveOp {
    pub fn path(&self) -> &str {
        match self {
            Self::Put { path, .. } | Self::Delete { path } => path,
        }
    }

    pub fn encode(&self) -> DriveResult<Vec<u8>> {
        encode(self)
    }

    pub fn decode(log: &LogId, seq: u64, bytes: &[u8]) -> DriveResult<Self> {
        decode(log, seq, bytes)
    }
}

fn encode<T: Serialize>(value: &T) -> DriveResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DriveError::CorruptEntry {
        log: String::new(),
        seq: 0,
        reason: e.to_string(),
    })
}

fn decode<T: for<'de> Deserialize<'de>>(log: &LogId, seq: u64, bytes: &[u8]) -> DriveResult<T> {
    bincode::deserialize(bytes).map_err(|e| DriveError::CorruptEntry {
        log: log.short_id(),
        seq,
        reason: e.to_string(),
    })
}
