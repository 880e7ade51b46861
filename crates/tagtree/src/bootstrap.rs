//! The bootstrap record carried in the tag index header.
//!
//! A peer that knows only the index id reads entry 0 of the index log, finds
//! this record in the header metadata, and learns which content log to attach
//! the drive from. Encoded as JSON:
//!
//! ```text
//! { "contentLogId": "<64 hex chars>", "userData": "<hex>" | null }
//! ```
//!
//! Unknown fields are ignored so later writers can add to the record.

use serde::{Deserialize, Serialize};
use tagtree_index::IndexHeader;
use tagtree_types::LogId;

use crate::error::{TagStoreError, TagStoreResult};

/// Discovery record written once, as the index header's metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapRecord {
    pub content_log_id: LogId,
    /// Opaque caller data. Never interpreted.
    pub user_data: Option<Vec<u8>>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRecord {
    #[serde(default)]
    content_log_id: Option<String>,
    #[serde(default)]
    user_data: Option<String>,
}

impl BootstrapRecord {
    pub fn new(content_log_id: LogId, user_data: Option<Vec<u8>>) -> Self {
        Self {
            content_log_id,
            user_data,
        }
    }

    pub fn encode(&self) -> TagStoreResult<Vec<u8>> {
        let wire = WireRecord {
            content_log_id: Some(self.content_log_id.to_hex()),
            user_data: self.user_data.as_ref().map(hex::encode),
        };
        serde_json::to_vec(&wire).map_err(|e| TagStoreError::CorruptBootstrap(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> TagStoreResult<Self> {
        let wire: WireRecord = serde_json::from_slice(bytes)
            .map_err(|e| TagStoreError::CorruptBootstrap(format!("not a bootstrap object: {e}")))?;

        let content_log_id = wire
            .content_log_id
            .ok_or_else(|| TagStoreError::CorruptBootstrap("missing contentLogId".into()))?;
        let content_log_id = LogId::from_hex(&content_log_id)
            .map_err(|e| TagStoreError::CorruptBootstrap(format!("contentLogId: {e}")))?;

        let user_data = wire
            .user_data
            .map(hex::decode)
            .transpose()
            .map_err(|e| TagStoreError::CorruptBootstrap(format!("userData: {e}")))?;

        Ok(Self {
            content_log_id,
            user_data,
        })
    }

    /// Extract the record from an index header's metadata.
    pub fn from_header(header: &IndexHeader) -> TagStoreResult<Self> {
        let metadata = header
            .metadata
            .as_deref()
            .ok_or_else(|| TagStoreError::CorruptBootstrap("index header has no metadata".into()))?;
        Self::decode(metadata)
    }
}
