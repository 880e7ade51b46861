use tagtree_crypto::{EntryChain, VerifyingKey};
use tagtree_log::SignedEntry;
use tagtree_types::LogId;

use crate::types::VerificationReport;

/// Verifies a batch of entries received from a peer before it is applied.
///
/// A batch may start mid-log, so the link to the local tip is checked later by
/// the log itself. This pass checks what the batch alone can prove.
pub struct SyncVerifier;

impl SyncVerifier {
    pub fn verify_received_entries(log: &LogId, entries: &[SignedEntry]) -> VerificationReport {
        let mut violations = Vec::new();
        let key = match VerifyingKey::from_log_id(log) {
            Ok(key) => Some(key),
            Err(_) => {
                violations.push(format!("{}: not a valid log key", log.short_id()));
                None
            }
        };

        let mut prev: Option<&SignedEntry> = None;
        for entry in entries {
            if let Some(p) = prev {
                if entry.seq != p.seq + 1 {
                    violations.push(format!("seq {}: expected {}, gap", entry.seq, p.seq + 1));
                }
            }

            let prev_hash = match (prev, entry.seq) {
                (Some(p), _) => Some(Some(p.chain_hash)),
                (None, 0) => Some(None),
                (None, _) => None,
            };
            if let Some(prev_hash) = prev_hash {
                let expected = EntryChain::compute_hash(prev_hash, entry.seq, &entry.payload);
                if expected != entry.chain_hash {
                    violations.push(format!("seq {}: chain hash mismatch", entry.seq));
                }
            }

            if let Some(key) = &key {
                if !entry.verify_signature(key) {
                    violations.push(format!("seq {}: bad signature", entry.seq));
                }
            }

            prev = Some(entry);
        }

        VerificationReport {
            log: *log,
            entries_verified: entries.len() as u64,
            chain_valid: violations.is_empty(),
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagtree_crypto::SigningKey;

    fn chain(key: &SigningKey, count: u64) -> Vec<SignedEntry> {
        let mut out: Vec<SignedEntry> = Vec::new();
        for seq in 0..count {
            let prev = out.last().map(|e| e.chain_hash);
            out.push(SignedEntry::sign(key, seq, prev, vec![seq as u8]));
        }
        out
    }

    #[test]
    fn valid_chain_passes() {
        let key = SigningKey::generate();
        let entries = chain(&key, 3);
        let report = SyncVerifier::verify_received_entries(&key.log_id(), &entries);
        assert!(report.chain_valid);
        assert_eq!(report.entries_verified, 3);
    }

    #[test]
    fn batch_starting_mid_log_passes() {
        let key = SigningKey::generate();
        let entries = chain(&key, 4);
        let report = SyncVerifier::verify_received_entries(&key.log_id(), &entries[2..]);
        assert!(report.chain_valid);
    }

    #[test]
    fn sequence_gap_detected() {
        let key = SigningKey::generate();
        let entries = chain(&key, 3);
        let batch = vec![entries[0].clone(), entries[2].clone()];
        let report = SyncVerifier::verify_received_entries(&key.log_id(), &batch);
        assert!(!report.chain_valid);
        assert!(report.violations.iter().any(|v| v.contains("gap")));
    }

    #[test]
    fn tampered_payload_detected() {
        let key = SigningKey::generate();
        let mut entries = chain(&key, 2);
        entries[1].payload = b"tampered".to_vec();
        let report = SyncVerifier::verify_received_entries(&key.log_id(), &entries);
        assert!(!report.chain_valid);
        assert!(report.violations.iter().any(|v| v.contains("chain hash")));
    }

    #[test]
    fn foreign_signature_detected() {
        let owner = SigningKey::generate();
        let forger = SigningKey::generate();
        let entries = chain(&forger, 1);
        let report = SyncVerifier::verify_received_entries(&owner.log_id(), &entries);
        assert!(!report.chain_valid);
        assert!(report.violations.iter().any(|v| v.contains("signature")));
    }

    #[test]
    fn empty_batch_valid() {
        let key = SigningKey::generate();
        let report = SyncVerifier::verify_received_entries(&key.log_id(), &[]);
        assert!(report.chain_valid);
        assert_eq!(report.entries_verified, 0);
    }
}
