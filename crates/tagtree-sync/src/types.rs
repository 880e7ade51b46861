use serde::{Deserialize, Serialize};
use tagtree_types::LogId;

/// How many entries of a log one side holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogStatus {
    pub log: LogId,
    pub len: u64,
}

/// Tuning for one replication session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicateOptions {
    /// Upper bound on exchange rounds before the session gives up.
    pub max_rounds: u32,
    /// Maximum number of entries per `Entries` message.
    pub batch_size: usize,
}

impl Default for ReplicateOptions {
    fn default() -> Self {
        Self {
            max_rounds: 16,
            batch_size: 256,
        }
    }
}

/// A contiguous range of one log to transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogTransfer {
    pub log: LogId,
    pub from: u64,
    pub to: u64,
}

impl LogTransfer {
    pub fn count(&self) -> u64 {
        self.to.saturating_sub(self.from)
    }
}

/// What each side should send after a status exchange.
#[derive(Clone, Debug, Default)]
pub struct Negotiation {
    /// Ranges the local side holds and the peer lacks.
    pub sends: Vec<LogTransfer>,
    /// Logs the peer listed that are not open locally.
    pub unknown: Vec<LogId>,
}

/// Counters from a finished session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub rounds: u32,
    pub entries_sent: u64,
    pub entries_received: u64,
}

#[derive(Clone, Debug)]
pub struct VerificationReport {
    pub log: LogId,
    pub entries_verified: u64,
    pub chain_valid: bool,
    pub violations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replicate_options_defaults() {
        let o = ReplicateOptions::default();
        assert_eq!(o.max_rounds, 16);
        assert_eq!(o.batch_size, 256);
    }

    #[test]
    fn transfer_count_saturates() {
        let log = LogId::from_bytes([7; 32]);
        assert_eq!(LogTransfer { log, from: 2, to: 5 }.count(), 3);
        assert_eq!(LogTransfer { log, from: 5, to: 2 }.count(), 0);
    }

    #[test]
    fn session_summary_defaults() {
        let s = SessionSummary::default();
        assert_eq!(s.rounds, 0);
        assert_eq!(s.entries_received, 0);
    }
}
