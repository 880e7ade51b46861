//! The multi-log container.
//!
//! A [`LogContainer`] owns one storage backend and hands out shared [`Log`]
//! handles by id. It also tracks reads that are blocked waiting for entries
//! that have not been replicated yet, which replication uses to decide when a
//! round has settled.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tagtree_crypto::{SigningKey, VerifyingKey};
use tagtree_types::LogId;
use tokio::sync::{watch, Mutex, OnceCell};
use tracing::{debug, info};

use crate::error::{LogError, LogResult, StorageError, StorageResult};
use crate::file::{FileLogStorage, FileStorageConfig};
use crate::log::Log;
use crate::memory::InMemoryLogStorage;
use crate::traits::LogStorage;

/// Registry of reads waiting on entries a log does not have yet.
pub(crate) struct StallTracker {
    next_token: AtomicU64,
    waits: StdMutex<Vec<(u64, LogId, u64)>>,
    activity: watch::Sender<u64>,
}

impl StallTracker {
    pub(crate) fn new() -> Self {
        let (activity, _) = watch::channel(0);
        Self {
            next_token: AtomicU64::new(0),
            waits: StdMutex::new(Vec::new()),
            activity,
        }
    }

    /// Record a blocked read of `seq` on `log`. Dropping the guard removes it.
    pub(crate) fn register(self: &Arc<Self>, log: LogId, seq: u64) -> StallGuard {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut waits) = self.waits.lock() {
            waits.push((token, log, seq));
        }
        self.activity.send_modify(|n| *n += 1);
        StallGuard {
            tracker: Arc::clone(self),
            token,
        }
    }

    fn waiting(&self) -> Vec<(LogId, u64)> {
        self.waits
            .lock()
            .map(|w| w.iter().map(|(_, log, seq)| (*log, *seq)).collect())
            .unwrap_or_default()
    }
}

pub(crate) struct StallGuard {
    tracker: Arc<StallTracker>,
    token: u64,
}

impl Drop for StallGuard {
    fn drop(&mut self) {
        if let Ok(mut waits) = self.tracker.waits.lock() {
            waits.retain(|(token, _, _)| *token != self.token);
        }
        self.tracker.activity.send_modify(|n| *n += 1);
    }
}

/// A set of logs sharing one storage backend.
///
/// Cloning is cheap; clones share the same open logs. Opening the same id
/// twice returns handles to the same log.
#[derive(Clone)]
pub struct LogContainer {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    storage: Arc<dyn LogStorage>,
    open: Mutex<HashMap<LogId, Log>>,
    stalls: Arc<StallTracker>,
    ready: OnceCell<()>,
}

impl LogContainer {
    pub fn new(storage: Arc<dyn LogStorage>) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                storage,
                open: Mutex::new(HashMap::new()),
                stalls: Arc::new(StallTracker::new()),
                ready: OnceCell::new(),
            }),
        }
    }

    /// A container backed by ephemeral memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryLogStorage::new()))
    }

    /// A container persisted under `root`, one subdirectory per log.
    pub fn open_dir(root: impl Into<PathBuf>) -> Self {
        Self::open_dir_with(root, FileStorageConfig::default())
    }

    pub fn open_dir_with(root: impl Into<PathBuf>, config: FileStorageConfig) -> Self {
        Self::new(Arc::new(FileLogStorage::new(root, config)))
    }

    /// Wait until the storage backend is usable. Idempotent.
    pub async fn ready(&self) -> StorageResult<()> {
        self.inner
            .ready
            .get_or_try_init(|| async {
                self.inner.storage.ready().await?;
                debug!("log container ready");
                Ok::<(), StorageError>(())
            })
            .await?;
        Ok(())
    }

    /// Create a fresh writable log with a random key.
    pub async fn create_log(&self) -> LogResult<Log> {
        self.ready().await?;

        let key = SigningKey::generate();
        let id = key.log_id();
        self.inner.storage.store_secret(&id, key.as_bytes()).await?;

        let log = Log::open(
            key.verifying_key(),
            Some(key),
            Vec::new(),
            Arc::clone(&self.inner.storage),
            Arc::clone(&self.inner.stalls),
        )?;
        self.inner.open.lock().await.insert(id, log.clone());

        info!(log = %id.short_id(), "created log");
        Ok(log)
    }

    /// Open a log by id.
    ///
    /// The log is writable if this container created it. Otherwise it is a
    /// read-only replica that starts empty (or with whatever was replicated
    /// into this backend earlier) and fills in through replication.
    pub async fn open_log(&self, id: &LogId) -> LogResult<Log> {
        self.ready().await?;

        let mut open = self.inner.open.lock().await;
        if let Some(log) = open.get(id) {
            return Ok(log.clone());
        }

        let key = VerifyingKey::from_log_id(id)
            .map_err(|e| LogError::InvalidId(format!("{}: {e}", id.short_id())))?;

        let signer = match self.inner.storage.load_secret(id).await? {
            Some(secret) => {
                let signer = SigningKey::from_bytes(secret);
                if signer.log_id() != *id {
                    return Err(StorageError::CorruptKey {
                        log: id.short_id(),
                        reason: "stored secret does not match log id".into(),
                    }
                    .into());
                }
                Some(signer)
            }
            None => None,
        };

        let entries = self.inner.storage.load_entries(id).await?;
        let len = entries.len();
        let log = Log::open(
            key,
            signer,
            entries,
            Arc::clone(&self.inner.storage),
            Arc::clone(&self.inner.stalls),
        )?;
        open.insert(*id, log.clone());

        debug!(log = %id.short_id(), len, writable = log.is_writable(), "opened log");
        Ok(log)
    }

    /// Handles of all logs opened in this container, sorted by id.
    pub async fn logs(&self) -> Vec<Log> {
        let open = self.inner.open.lock().await;
        let mut logs: Vec<Log> = open.values().cloned().collect();
        logs.sort_by_key(Log::id);
        logs
    }

    /// The open log with this id, if any.
    pub async fn get_open(&self, id: &LogId) -> Option<Log> {
        self.inner.open.lock().await.get(id).cloned()
    }

    /// Ids of every log the backend has stored, opened or not.
    pub async fn stored_logs(&self) -> StorageResult<Vec<LogId>> {
        self.ready().await?;
        self.inner.storage.list_logs().await
    }

    /// Whether some read is blocked on an entry this container lacks.
    pub async fn has_stalled_reads(&self) -> bool {
        let waiting = self.inner.stalls.waiting();
        if waiting.is_empty() {
            return false;
        }
        let open = self.inner.open.lock().await;
        waiting
            .iter()
            .any(|(id, seq)| open.get(id).map_or(true, |log| log.len() <= *seq))
    }

    /// A counter that changes whenever a read starts or stops waiting.
    pub fn activity(&self) -> watch::Receiver<u64> {
        self.inner.stalls.activity.subscribe()
    }
}

impl std::fmt::Debug for LogContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogContainer")
            .field("ready", &self.inner.ready.initialized())
            .finish_non_exhaustive()
    }
}
