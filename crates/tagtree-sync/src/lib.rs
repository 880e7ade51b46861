//! Log replication for tagtree.
//!
//! Two containers replicate by running a [`ReplicationSession`] on each end
//! of a duplex stream. Every open log is exchanged; received entries are
//! verified against the log's public key before they are appended.

pub mod codec;
pub mod error;
pub mod message;
pub mod negotiation;
pub mod session;
pub mod types;
pub mod verifier;

pub use codec::SyncCodec;
pub use error::{SyncError, SyncResult};
pub use message::{SyncMessage, MAX_MESSAGE_SIZE, PROTOCOL_VERSION};
pub use negotiation::NegotiationEngine;
pub use session::{NoSettle, ReplicationSession, SettleHook};
pub use types::{
    LogStatus, LogTransfer, Negotiation, ReplicateOptions, SessionSummary, VerificationReport,
};
pub use verifier::SyncVerifier;
