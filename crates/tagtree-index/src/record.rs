//! On-log encodings of the index.
//!
//! Entry 0 of an index log is an [`IndexHeader`]. Every later entry is an
//! [`IndexRecord`]. Both are bincode.

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

/// Protocol marker written in every index header.
pub const INDEX_PROTOCOL: &str = "tagtree-index/1";

/// The reserved first entry of an index log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHeader {
    pub protocol: String,
    /// Opaque bytes supplied by whoever created the index.
    pub metadata: Option<Vec<u8>>,
}

impl IndexHeader {
    pub fn new(metadata: Option<Vec<u8>>) -> Self {
        Self {
            protocol: INDEX_PROTOCOL.to_string(),
            metadata,
        }
    }

    pub fn encode(&self) -> IndexResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| IndexError::Header(e.to_string()))
    }

    /// Decode a header, rejecting foreign protocols.
    pub fn decode(bytes: &[u8]) -> IndexResult<Self> {
        let header: Self =
            bincode::deserialize(bytes).map_err(|e| IndexError::Header(e.to_string()))?;
        if header.protocol != INDEX_PROTOCOL {
            return Err(IndexError::Header(format!(
                "unsupported protocol {:?}",
                header.protocol
            )));
        }
        Ok(header)
    }
}

/// One key assignment. `value: None` removes the key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub key: String,
    pub value: Option<String>,
}

impl IndexRecord {
    pub fn encode(&self) -> IndexResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| IndexError::CorruptEntry {
            seq: 0,
            reason: e.to_string(),
        })
    }

    pub fn decode(seq: u64, bytes: &[u8]) -> IndexResult<Self> {
        bincode::deserialize(bytes).map_err(|e| IndexError::CorruptEntry {
            seq,
            reason: e.to_string(),
        })
    }
}
