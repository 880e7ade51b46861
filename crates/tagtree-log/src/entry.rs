use serde::{Deserialize, Serialize};
use tagtree_crypto::{ChainedEntry, EntryChain, Signature, SigningKey, VerifyingKey};

/// One signed entry of an append-only log.
///
/// The payload is opaque to the log. `chain_hash` links the entry to its
/// predecessor (see [`EntryChain`]) and `signature` is the log key's
/// signature over `chain_hash`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEntry {
    pub seq: u64,
    pub payload: Vec<u8>,
    pub chain_hash: [u8; 32],
    pub signature: Signature,
}

impl SignedEntry {
    /// Build and sign the entry that follows `prev_hash` at position `seq`.
    pub fn sign(key: &SigningKey, seq: u64, prev_hash: Option<[u8; 32]>, payload: Vec<u8>) -> Self {
        let chain_hash = EntryChain::compute_hash(prev_hash, seq, &payload);
        let signature = key.sign(&chain_hash);
        Self {
            seq,
            payload,
            chain_hash,
            signature,
        }
    }

    /// Check the signature against the log's public key.
    pub fn verify_signature(&self, key: &VerifyingKey) -> bool {
        key.verify(&self.chain_hash, &self.signature).is_ok()
    }
}

impl ChainedEntry for SignedEntry {
    fn seq(&self) -> u64 {
        self.seq
    }

    fn chain_hash(&self) -> [u8; 32] {
        self.chain_hash
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_entry_verifies_with_own_key() {
        let key = SigningKey::generate();
        let entry = SignedEntry::sign(&key, 0, None, b"header".to_vec());
        assert!(entry.verify_signature(&key.verifying_key()));
        assert!(!entry.verify_signature(&SigningKey::generate().verifying_key()));
    }

    #[test]
    fn entries_form_a_chain() {
        let key = SigningKey::generate();
        let first = SignedEntry::sign(&key, 0, None, b"a".to_vec());
        let second = SignedEntry::sign(&key, 1, Some(first.chain_hash), b"b".to_vec());
        let tip = EntryChain::verify_segment(&[first, second.clone()], 0, None).unwrap();
        assert_eq!(tip, Some(second.chain_hash));
    }

    #[test]
    fn bincode_roundtrip() {
        let key = SigningKey::generate();
        let entry = SignedEntry::sign(&key, 0, None, vec![1, 2, 3]);
        let bytes = bincode::serialize(&entry).unwrap();
        let decoded: SignedEntry = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, entry);
    }
}
