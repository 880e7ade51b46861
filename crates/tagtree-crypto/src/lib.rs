//! Cryptographic primitives for tagtree.
//!
//! Provides Ed25519 log keys and entry signatures, domain-separated BLAKE3
//! hashing, the per-log entry hash chain, and a binary Merkle root used to
//! fingerprint drive checkouts.
//!
//! All crypto operations wrap established libraries: no custom cryptography.

pub mod chain;
pub mod hasher;
pub mod merkle;
pub mod signer;

pub use chain::{ChainError, ChainedEntry, EntryChain};
pub use hasher::ContentHasher;
pub use merkle::MerkleTree;
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
