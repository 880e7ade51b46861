use std::collections::HashMap;

use tagtree_types::LogId;

use crate::types::{LogStatus, LogTransfer, Negotiation};

/// Status negotiation: decides which log ranges cross the wire.
pub struct NegotiationEngine;

impl NegotiationEngine {
    /// Ranges we hold that the remote lacks, for logs both sides have open.
    pub fn compute_sends(local: &[LogStatus], remote: &[LogStatus]) -> Vec<LogTransfer> {
        let ours = lengths(local);
        remote
            .iter()
            .filter_map(|r| {
                let have = *ours.get(&r.log)?;
                (have > r.len).then_some(LogTransfer {
                    log: r.log,
                    from: r.len,
                    to: have,
                })
            })
            .collect()
    }

    /// Full negotiation.
    pub fn negotiate(local: &[LogStatus], remote: &[LogStatus]) -> Negotiation {
        let ours = lengths(local);
        let unknown = remote
            .iter()
            .filter(|r| !ours.contains_key(&r.log))
            .map(|r| r.log)
            .collect();
        Negotiation {
            sends: Self::compute_sends(local, remote),
            unknown,
        }
    }
}

fn lengths(status: &[LogStatus]) -> HashMap<LogId, u64> {
    status.iter().map(|s| (s.log, s.len)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(seed: u8) -> LogId {
        LogId::from_bytes([seed; 32])
    }

    fn st(seed: u8, len: u64) -> LogStatus {
        LogStatus { log: id(seed), len }
    }

    #[test]
    fn compute_sends_finds_missing_tail() {
        let local = vec![st(1, 5), st(2, 1)];
        let remote = vec![st(1, 2), st(2, 1)];
        let sends = NegotiationEngine::compute_sends(&local, &remote);
        assert_eq!(sends, vec![LogTransfer { log: id(1), from: 2, to: 5 }]);
    }

    #[test]
    fn compute_sends_empty_when_synced() {
        let status = vec![st(1, 3)];
        assert!(NegotiationEngine::compute_sends(&status, &status).is_empty());
    }

    #[test]
    fn logs_only_we_have_are_not_pushed() {
        let local = vec![st(1, 3), st(9, 4)];
        let remote = vec![st(1, 3)];
        assert!(NegotiationEngine::compute_sends(&local, &remote).is_empty());
    }

    #[test]
    fn negotiate_reports_unknown_logs() {
        let local = vec![st(1, 1)];
        let remote = vec![st(1, 4), st(3, 2)];
        let neg = NegotiationEngine::negotiate(&local, &remote);
        assert!(neg.sends.is_empty());
        assert_eq!(neg.unknown, vec![id(3)]);
    }

    #[test]
    fn negotiate_empty_local() {
        let neg = NegotiationEngine::negotiate(&[], &[st(1, 1)]);
        assert!(neg.sends.is_empty());
        assert_eq!(neg.unknown.len(), 1);
    }
}
