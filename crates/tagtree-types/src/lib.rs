//! Foundation types for tagtree.
//!
//! Every other tagtree crate depends on `tagtree-types`.
//!
//! # Key Types
//!
//! - [`LogId`]: Public identifier of an append-only log (Ed25519 public key)
//! - [`ContentDigest`]: BLAKE3 digest of stored file content
//! - [`Version`]: Monotonic drive version number

pub mod error;
pub mod identity;
pub mod object;
pub mod version;

pub use error::TypeError;
pub use identity::LogId;
pub use object::ContentDigest;
pub use version::Version;
