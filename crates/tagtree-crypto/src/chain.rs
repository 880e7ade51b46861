/// An entry that participates in a log's hash chain.
pub trait ChainedEntry {
    /// Position of the entry in its log.
    fn seq(&self) -> u64;
    /// The entry's own chain hash.
    fn chain_hash(&self) -> [u8; 32];
    /// Payload bytes covered by the hash.
    fn payload(&self) -> &[u8];
}

/// Hash chain over the entries of one log.
///
/// Entry `n` commits to its sequence number, its payload, and the chain hash
/// of entry `n - 1`. Entry 0 has no predecessor. Because the signature of an
/// entry covers its chain hash, a verified tail also pins every earlier entry.
pub struct EntryChain;

impl EntryChain {
    /// Compute the chain hash for an entry.
    pub fn compute_hash(prev_hash: Option<[u8; 32]>, seq: u64, payload: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"tagtree-entry-v1:");
        if let Some(prev) = prev_hash {
            hasher.update(&prev);
        }
        hasher.update(&seq.to_le_bytes());
        hasher.update(payload);
        *hasher.finalize().as_bytes()
    }

    /// Verify a contiguous run of entries that continues a chain.
    ///
    /// `start_seq` is the sequence number the first entry must carry and
    /// `prev_hash` is the chain hash of the entry just before it (`None` only
    /// when `start_seq == 0`). Returns the chain hash of the last entry, or
    /// `prev_hash` when `entries` is empty.
    pub fn verify_segment(
        entries: &[impl ChainedEntry],
        start_seq: u64,
        prev_hash: Option<[u8; 32]>,
    ) -> Result<Option<[u8; 32]>, ChainError> {
        if start_seq > 0 && prev_hash.is_none() {
            return Err(ChainError::MissingPrevHash { seq: start_seq });
        }
        if start_seq == 0 && prev_hash.is_some() {
            return Err(ChainError::GenesisHasPrevHash);
        }

        let mut prev = prev_hash;
        for (offset, entry) in entries.iter().enumerate() {
            let expected_seq = start_seq + offset as u64;
            if entry.seq() != expected_seq {
                return Err(ChainError::SequenceGap {
                    expected: expected_seq,
                    found: entry.seq(),
                });
            }

            let computed = Self::compute_hash(prev, expected_seq, entry.payload());
            if computed != entry.chain_hash() {
                return Err(ChainError::HashMismatch { seq: expected_seq });
            }
            prev = Some(computed);
        }

        Ok(prev)
    }
}

/// Errors from chain verification.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("genesis entry was given a previous hash")]
    GenesisHasPrevHash,

    #[error("missing previous hash for entry {seq}")]
    MissingPrevHash { seq: u64 },

    #[error("sequence gap: expected {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },

    #[error("hash mismatch at seq {seq}: computed hash differs from stored")]
    HashMismatch { seq: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestEntry {
        seq: u64,
        hash: [u8; 32],
        payload: Vec<u8>,
    }

    impl ChainedEntry for TestEntry {
        fn seq(&self) -> u64 {
            self.seq
        }
        fn chain_hash(&self) -> [u8; 32] {
            self.hash
        }
        fn payload(&self) -> &[u8] {
            &self.payload
        }
    }

    fn build_chain(count: u64) -> Vec<TestEntry> {
        let mut chain = Vec::new();
        let mut prev = None;
        for seq in 0..count {
            let payload = format!("entry-{seq}").into_bytes();
            let hash = EntryChain::compute_hash(prev, seq, &payload);
            chain.push(TestEntry { seq, hash, payload });
            prev = Some(hash);
        }
        chain
    }

    #[test]
    fn empty_segment_is_valid() {
        let chain: Vec<TestEntry> = vec![];
        assert_eq!(EntryChain::verify_segment(&chain, 0, None), Ok(None));
    }

    #[test]
    fn full_chain_verifies() {
        let chain = build_chain(10);
        let tip = EntryChain::verify_segment(&chain, 0, None).unwrap();
        assert_eq!(tip, Some(chain[9].hash));
    }

    #[test]
    fn tail_segment_verifies_against_prefix() {
        let chain = build_chain(6);
        let tail = &chain[3..];
        assert!(EntryChain::verify_segment(tail, 3, Some(chain[2].hash)).is_ok());
    }

    #[test]
    fn tail_without_prev_hash_fails() {
        let chain = build_chain(4);
        let err = EntryChain::verify_segment(&chain[2..], 2, None).unwrap_err();
        assert_eq!(err, ChainError::MissingPrevHash { seq: 2 });
    }

    #[test]
    fn genesis_with_prev_hash_fails() {
        let chain = build_chain(1);
        let err = EntryChain::verify_segment(&chain, 0, Some([1; 32])).unwrap_err();
        assert_eq!(err, ChainError::GenesisHasPrevHash);
    }

    #[test]
    fn sequence_gap_detected() {
        let mut chain = build_chain(3);
        chain.remove(1);
        let err = EntryChain::verify_segment(&chain, 0, None).unwrap_err();
        assert_eq!(err, ChainError::SequenceGap { expected: 1, found: 2 });
    }

    #[test]
    fn tampered_payload_detected() {
        let mut chain = build_chain(3);
        chain[1].payload = b"tampered".to_vec();
        let err = EntryChain::verify_segment(&chain, 0, None).unwrap_err();
        assert_eq!(err, ChainError::HashMismatch { seq: 1 });
    }

    #[test]
    fn wrong_prefix_detected() {
        let chain = build_chain(4);
        let err = EntryChain::verify_segment(&chain[2..], 2, Some([9; 32])).unwrap_err();
        assert_eq!(err, ChainError::HashMismatch { seq: 2 });
    }
}
