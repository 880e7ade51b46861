//! Signed append-only logs for tagtree.
//!
//! This crate is the storage substrate of tagtree. It provides:
//! - [`SignedEntry`], hash-chained and signed by the log's key
//! - The [`LogStorage`] trait with in-memory and directory backends
//! - [`Log`], a shared handle that appends, reads, and applies replicated entries
//! - [`LogContainer`], which opens logs by id and tracks stalled reads

pub mod container;
pub mod entry;
pub mod error;
pub mod file;
pub mod log;
pub mod memory;
pub mod traits;

pub use container::LogContainer;
pub use entry::SignedEntry;
pub use error::{LogError, LogResult, StorageError, StorageResult};
pub use file::{FileLogStorage, FileStorageConfig, SyncMode};
pub use log::{Log, MAX_PAYLOAD_SIZE};
pub use memory::InMemoryLogStorage;
pub use traits::LogStorage;
