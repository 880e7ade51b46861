//! Versioned hierarchical file store for tagtree.
//!
//! A [`VersionedStore`] (the *drive*) keeps a file tree in a pair of signed
//! logs. Every mutation produces a new version, and [`Checkout`] gives a
//! read-only view of any past version. Attaching needs only the content log
//! id; the metadata log is discovered from its header.

pub mod checkout;
pub mod drive;
pub mod error;
pub mod path;
pub mod record;

pub use checkout::{Checkout, DirEntry, FileEntry};
pub use drive::VersionedStore;
pub use error::{DriveError, DriveResult};
pub use record::{BlobRef, DriveHeader, DriveOp, LogRole, CHUNK_SIZE, DRIVE_PROTOCOL};
