//! The [`LogStorage`] trait defining the physical storage interface.
//!
//! A [`LogContainer`](crate::LogContainer) caches open logs in memory and
//! writes through to a `LogStorage` backend. Backends only ever append; they
//! never rewrite an entry that has been stored.

use async_trait::async_trait;
use tagtree_types::LogId;

use crate::entry::SignedEntry;
use crate::error::StorageResult;

/// Physical storage for many logs.
///
/// Implementations must be thread-safe and must persist entries in the order
/// they are appended. Several containers must not share one backend.
#[async_trait]
pub trait LogStorage: Send + Sync {
    /// Prepare the backend (create directories, open handles).
    ///
    /// Called once by the container before any other method. Failure here is
    /// the "storage unavailable" condition.
    async fn ready(&self) -> StorageResult<()>;

    /// Ids of all logs that have anything stored.
    async fn list_logs(&self) -> StorageResult<Vec<LogId>>;

    /// All stored entries of a log, in sequence order.
    ///
    /// Returns an empty list for a log that has never been stored.
    async fn load_entries(&self, id: &LogId) -> StorageResult<Vec<SignedEntry>>;

    /// Append one entry to a log.
    async fn append_entry(&self, id: &LogId, entry: &SignedEntry) -> StorageResult<()>;

    /// The secret key of a log created on this backend, if any.
    async fn load_secret(&self, id: &LogId) -> StorageResult<Option<[u8; 32]>>;

    /// Remember the secret key of a newly created log.
    async fn store_secret(&self, id: &LogId, secret: &[u8; 32]) -> StorageResult<()>;
}
