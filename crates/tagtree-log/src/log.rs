use std::sync::Arc;

use tagtree_crypto::{EntryChain, SigningKey, VerifyingKey};
use tagtree_types::LogId;
use tokio::sync::{watch, RwLock};
use tracing::debug;

use crate::container::StallTracker;
use crate::entry::SignedEntry;
use crate::error::{LogError, LogResult};
use crate::traits::LogStorage;

/// Largest payload one entry may carry. Leaves room for an entry to travel
/// alone in a single replication message.
pub const MAX_PAYLOAD_SIZE: usize = 8 * 1024 * 1024;

/// Shared handle to one append-only log.
///
/// Cloning is cheap; every clone observes the same entries. Entries are never
/// rewritten: `append` adds at the end, `get` reads by sequence number and
/// waits if the entry has not arrived yet.
#[derive(Clone)]
pub struct Log {
    inner: Arc<LogInner>,
}

struct LogInner {
    id: LogId,
    key: VerifyingKey,
    signer: Option<SigningKey>,
    entries: RwLock<Vec<SignedEntry>>,
    length: watch::Sender<u64>,
    storage: Arc<dyn LogStorage>,
    stalls: Arc<StallTracker>,
}

impl Log {
    /// Build a handle over already-loaded entries, verifying them first.
    pub(crate) fn open(
        key: VerifyingKey,
        signer: Option<SigningKey>,
        entries: Vec<SignedEntry>,
        storage: Arc<dyn LogStorage>,
        stalls: Arc<StallTracker>,
    ) -> LogResult<Self> {
        let id = key.to_log_id();
        verify_entries(&id, &key, &entries, 0, None)?;

        let (length, _) = watch::channel(entries.len() as u64);
        Ok(Self {
            inner: Arc::new(LogInner {
                id,
                key,
                signer,
                entries: RwLock::new(entries),
                length,
                storage,
                stalls,
            }),
        })
    }

    /// Public identifier of this log.
    pub fn id(&self) -> LogId {
        self.inner.id
    }

    /// Number of entries held locally.
    pub fn len(&self) -> u64 {
        *self.inner.length.borrow()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this container holds the secret key and can append.
    pub fn is_writable(&self) -> bool {
        self.inner.signer.is_some()
    }

    /// Append a payload and return its sequence number.
    pub async fn append(&self, payload: Vec<u8>) -> LogResult<u64> {
        let signer = self
            .inner
            .signer
            .as_ref()
            .ok_or(LogError::ReadOnly(self.inner.id))?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(LogError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut entries = self.inner.entries.write().await;
        let seq = entries.len() as u64;
        let prev = entries.last().map(|e| e.chain_hash);
        let entry = SignedEntry::sign(signer, seq, prev, payload);

        self.inner.storage.append_entry(&self.inner.id, &entry).await?;
        entries.push(entry);
        self.inner.length.send_replace(seq + 1);

        debug!(log = %self.inner.id.short_id(), seq, "appended entry");
        Ok(seq)
    }

    /// Read the payload at `seq`, waiting until it is available locally.
    ///
    /// While waiting, the read is registered with the container as stalled so
    /// that replication can tell it needs more data.
    pub async fn get(&self, seq: u64) -> LogResult<Vec<u8>> {
        let mut length = self.inner.length.subscribe();
        let have = *length.borrow_and_update();
        if have <= seq {
            let _stall = self.inner.stalls.register(self.inner.id, seq);
            debug!(log = %self.inner.id.short_id(), seq, "waiting for entry");
            length
                .wait_for(|len| *len > seq)
                .await
                .map_err(|_| LogError::Closed {
                    log: self.inner.id,
                    seq,
                })?;
        }

        self.try_get(seq).await.ok_or(LogError::OutOfRange {
            seq,
            len: self.len(),
        })
    }

    /// Read the payload at `seq` if it is present locally.
    pub async fn try_get(&self, seq: u64) -> Option<Vec<u8>> {
        let entries = self.inner.entries.read().await;
        entries.get(seq as usize).map(|e| e.payload.clone())
    }

    /// Signed entries from `start` to the current end, for replication.
    pub async fn entries_from(&self, start: u64) -> Vec<SignedEntry> {
        let entries = self.inner.entries.read().await;
        entries
            .get(start as usize..)
            .map(<[SignedEntry]>::to_vec)
            .unwrap_or_default()
    }

    /// Verify and append entries received from a peer.
    ///
    /// Entries this log already has are skipped. The rest must continue the
    /// local chain and carry valid signatures from the log key; otherwise
    /// nothing is applied. Returns the number of entries appended.
    pub async fn apply_remote(&self, incoming: Vec<SignedEntry>) -> LogResult<usize> {
        let mut entries = self.inner.entries.write().await;
        let have = entries.len() as u64;
        let fresh: Vec<SignedEntry> = incoming.into_iter().filter(|e| e.seq >= have).collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let prev = entries.last().map(|e| e.chain_hash);
        verify_entries(&self.inner.id, &self.inner.key, &fresh, have, prev)?;

        for entry in &fresh {
            self.inner.storage.append_entry(&self.inner.id, entry).await?;
        }
        let applied = fresh.len();
        entries.extend(fresh);
        self.inner.length.send_replace(entries.len() as u64);

        debug!(log = %self.inner.id.short_id(), applied, len = entries.len(), "applied remote entries");
        Ok(applied)
    }
}

fn verify_entries(
    id: &LogId,
    key: &VerifyingKey,
    entries: &[SignedEntry],
    start_seq: u64,
    prev: Option<[u8; 32]>,
) -> LogResult<()> {
    EntryChain::verify_segment(entries, start_seq, prev).map_err(|e| LogError::Verification {
        log: id.short_id(),
        seq: start_seq,
        reason: e.to_string(),
    })?;

    if let Some(bad) = entries.iter().find(|e| !e.verify_signature(key)) {
        return Err(LogError::Verification {
            log: id.short_id(),
            seq: bad.seq,
            reason: "signature does not match log key".into(),
        });
    }
    Ok(())
}

impl std::fmt::Debug for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Log")
            .field("id", &self.inner.id)
            .field("len", &self.len())
            .field("writable", &self.is_writable())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryLogStorage;
    use std::time::Duration;

    fn writable_log() -> (Log, SigningKey) {
        let key = SigningKey::generate();
        let copy = SigningKey::from_bytes(*key.as_bytes());
        let log = Log::open(
            key.verifying_key(),
            Some(key),
            Vec::new(),
            Arc::new(InMemoryLogStorage::new()),
            Arc::new(StallTracker::new()),
        )
        .unwrap();
        (log, copy)
    }

    fn replica_of(log: &Log) -> Log {
        Log::open(
            VerifyingKey::from_log_id(&log.id()).unwrap(),
            None,
            Vec::new(),
            Arc::new(InMemoryLogStorage::new()),
            Arc::new(StallTracker::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn append_assigns_contiguous_seqs() {
        let (log, _) = writable_log();
        assert_eq!(log.append(b"a".to_vec()).await.unwrap(), 0);
        assert_eq!(log.append(b"b".to_vec()).await.unwrap(), 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.get(1).await.unwrap(), b"b");
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected() {
        let (log, _) = writable_log();
        let err = log.append(vec![0; MAX_PAYLOAD_SIZE + 1]).await.unwrap_err();
        assert_eq!(
            err,
            LogError::PayloadTooLarge {
                size: MAX_PAYLOAD_SIZE + 1,
                max: MAX_PAYLOAD_SIZE
            }
        );
        assert!(log.is_empty());
        assert_eq!(log.append(vec![0; MAX_PAYLOAD_SIZE]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn read_only_log_rejects_append() {
        let (log, _) = writable_log();
        let replica = replica_of(&log);
        let err = replica.append(b"x".to_vec()).await.unwrap_err();
        assert_eq!(err, LogError::ReadOnly(log.id()));
    }

    #[tokio::test]
    async fn get_waits_for_replicated_entry() {
        let (log, _) = writable_log();
        let replica = replica_of(&log);

        let reader = {
            let replica = replica.clone();
            tokio::spawn(async move { replica.get(0).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!reader.is_finished());

        log.append(b"header".to_vec()).await.unwrap();
        let applied = replica.apply_remote(log.entries_from(0).await).await.unwrap();
        assert_eq!(applied, 1);
        assert_eq!(reader.await.unwrap().unwrap(), b"header");
    }

    #[tokio::test]
    async fn apply_remote_skips_known_entries() {
        let (log, _) = writable_log();
        let replica = replica_of(&log);
        for i in 0..3u8 {
            log.append(vec![i]).await.unwrap();
        }

        assert_eq!(replica.apply_remote(log.entries_from(0).await).await.unwrap(), 3);
        assert_eq!(replica.apply_remote(log.entries_from(0).await).await.unwrap(), 0);
        log.append(vec![3]).await.unwrap();
        assert_eq!(replica.apply_remote(log.entries_from(0).await).await.unwrap(), 1);
        assert_eq!(replica.entries_from(0).await, log.entries_from(0).await);
    }

    #[tokio::test]
    async fn apply_remote_rejects_foreign_signatures() {
        let (log, _) = writable_log();
        let replica = replica_of(&log);

        let forger = SigningKey::generate();
        let forged = SignedEntry::sign(&forger, 0, None, b"evil".to_vec());
        let err = replica.apply_remote(vec![forged]).await.unwrap_err();
        assert!(matches!(err, LogError::Verification { seq: 0, .. }));
        assert!(replica.is_empty());
    }

    #[tokio::test]
    async fn apply_remote_rejects_gaps() {
        let (log, _) = writable_log();
        let replica = replica_of(&log);
        for i in 0..3u8 {
            log.append(vec![i]).await.unwrap();
        }
        let tail = log.entries_from(1).await;
        let err = replica.apply_remote(tail).await.unwrap_err();
        assert!(matches!(err, LogError::Verification { .. }));
    }

    #[tokio::test]
    async fn try_get_does_not_wait() {
        let (log, _) = writable_log();
        assert!(log.try_get(0).await.is_none());
        log.append(b"x".to_vec()).await.unwrap();
        assert_eq!(log.try_get(0).await.unwrap(), b"x");
    }
}
