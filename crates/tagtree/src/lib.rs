//! Tagged, versioned file trees over replicated signed logs.
//!
//! A [`TaggedStore`] pairs a [`VersionedStore`] (the drive) with a tag index
//! mapping names such as `latest` or `v1.2.0` to drive versions. The index
//! log's first entry is a [`BootstrapRecord`] naming the drive's content log,
//! so a peer that knows only the index id can attach, replicate, and check
//! out any tagged version.
//!
//! ```no_run
//! use tagtree::{ReplicateOptions, TaggedStore, TaggedStoreConfig};
//!
//! # async fn demo() -> tagtree::TagStoreResult<()> {
//! let origin = TaggedStore::create(TaggedStoreConfig::default()).await?;
//! origin.drive().await?.write_file("/readme.md", b"hello").await?;
//! origin.put_current("latest").await?;
//!
//! let replica = TaggedStore::attach(origin.index_id(), TaggedStoreConfig::default()).await?;
//! let (a, b) = tokio::io::duplex(64 * 1024);
//! let (left, right) = tokio::join!(
//!     origin.replicate(true, a, ReplicateOptions::default()),
//!     replica.replicate(false, b, ReplicateOptions::default()),
//! );
//! left?;
//! right?;
//!
//! let checkout = replica.checkout_at_tag("latest").await?;
//! assert!(checkout.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`store`]: The [`TaggedStore`] facade
//! - [`bootstrap`]: The discovery record in the index header
//! - [`lifecycle`]: Construction states and readiness
//! - [`config`]: Store options
//! - [`semver`]: Release tag names
//! - [`error`]: Error types

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod semver;
pub mod store;

pub use bootstrap::BootstrapRecord;
pub use config::{ReadyPolicy, TaggedStoreConfig};
pub use error::{TagStoreError, TagStoreResult};
pub use lifecycle::LifecycleState;
pub use semver::SemVer;
pub use store::TaggedStore;

// Re-export the types callers handle directly
pub use tagtree_drive::{Checkout, DirEntry, FileEntry, VersionedStore};
pub use tagtree_log::{FileStorageConfig, LogContainer, SyncMode};
pub use tagtree_sync::{ReplicateOptions, SessionSummary};
pub use tagtree_types::{ContentDigest, LogId, Version};
