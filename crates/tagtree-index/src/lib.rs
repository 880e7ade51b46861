//! Ordered tag index for tagtree.
//!
//! A [`TagIndex`] maps tag names to drive versions. It lives in a single
//! signed append-only log:
//!
//! - **Entry 0** is an [`IndexHeader`] with a protocol marker and opaque
//!   metadata chosen by the creator. The header is how a peer holding only the
//!   index id learns what the index belongs to.
//! - **Later entries** are [`IndexRecord`]s. Each assigns or removes one key;
//!   replaying them in log order yields the current mapping.
//!
//! # Modules
//!
//! - [`error`]: Error types for index operations
//! - [`record`]: Header and record encodings
//! - [`names`]: Tag name validation
//! - [`index`]: The [`TagIndex`] itself

pub mod error;
pub mod index;
pub mod names;
pub mod record;

pub use error::{IndexError, IndexResult};
pub use index::TagIndex;
pub use names::{validate_key, MAX_KEY_LEN};
pub use record::{IndexHeader, IndexRecord, INDEX_PROTOCOL};
