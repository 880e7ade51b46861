use std::collections::BTreeMap;

use tagtree_log::Log;
use tagtree_types::{LogId, Version};
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::error::{IndexError, IndexResult};
use crate::names::validate_key;
use crate::record::{IndexHeader, IndexRecord};

/// Ordered map from tag name to [`Version`], persisted in one log.
///
/// Entry 0 of the log is the [`IndexHeader`]. Each later entry assigns or
/// removes one key, and the latest entry for a key wins. The in-memory view is
/// rebuilt lazily by replaying entries it has not seen yet, so entries that
/// arrive through replication show up on the next read.
pub struct TagIndex {
    log: Log,
    header: OnceCell<IndexHeader>,
    view: Mutex<View>,
}

struct View {
    /// Next log sequence number to replay.
    next_seq: u64,
    map: BTreeMap<String, Version>,
}

impl TagIndex {
    /// Write the header into an empty, writable log.
    pub async fn create(log: Log, metadata: Option<Vec<u8>>) -> IndexResult<Self> {
        if !log.is_empty() {
            return Err(IndexError::NotEmpty(log.id().short_id()));
        }
        let header = IndexHeader::new(metadata);
        log.append(header.encode()?).await?;
        debug!(index = %log.id().short_id(), "created tag index");

        let index = Self::attach(log);
        index.header.set(header).ok();
        Ok(index)
    }

    /// Wrap an existing (possibly still empty) index log.
    pub fn attach(log: Log) -> Self {
        Self {
            log,
            header: OnceCell::new(),
            view: Mutex::new(View {
                next_seq: 1,
                map: BTreeMap::new(),
            }),
        }
    }

    pub fn id(&self) -> LogId {
        self.log.id()
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    /// The header, waiting for entry 0 to arrive if necessary.
    pub async fn header(&self) -> IndexResult<&IndexHeader> {
        self.header
            .get_or_try_init(|| async {
                let bytes = self.log.get(0).await?;
                let header = IndexHeader::decode(&bytes)?;
                debug!(index = %self.log.id().short_id(), "read index header");
                Ok::<_, IndexError>(header)
            })
            .await
    }

    /// Assign `version` to `key`. Returns the log sequence of the record.
    pub async fn put(&self, key: &str, version: Version) -> IndexResult<u64> {
        validate_key(key)?;
        self.append(IndexRecord {
            key: key.to_string(),
            value: Some(version.to_text()),
        })
        .await
    }

    /// The current version of `key`, if any.
    pub async fn get(&self, key: &str) -> IndexResult<Option<Version>> {
        let view = self.caught_up().await?;
        Ok(view.map.get(key).copied())
    }

    /// Remove `key`. Returns whether it was present.
    pub async fn delete(&self, key: &str) -> IndexResult<bool> {
        validate_key(key)?;
        if self.get(key).await?.is_none() {
            return Ok(false);
        }
        self.append(IndexRecord {
            key: key.to_string(),
            value: None,
        })
        .await?;
        Ok(true)
    }

    /// All keys in order.
    pub async fn entries(&self) -> IndexResult<Vec<(String, Version)>> {
        let view = self.caught_up().await?;
        Ok(view.map.iter().map(|(k, v)| (k.clone(), *v)).collect())
    }

    /// Keys starting with `prefix`, in order.
    pub async fn entries_with_prefix(&self, prefix: &str) -> IndexResult<Vec<(String, Version)>> {
        let view = self.caught_up().await?;
        Ok(view
            .map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }

    /// Number of live keys.
    pub async fn len(&self) -> IndexResult<usize> {
        Ok(self.caught_up().await?.map.len())
    }

    pub async fn is_empty(&self) -> IndexResult<bool> {
        Ok(self.len().await? == 0)
    }

    async fn append(&self, record: IndexRecord) -> IndexResult<u64> {
        if self.log.is_empty() {
            return Err(IndexError::Header("index log has no header".into()));
        }
        let seq = self.log.append(record.encode()?).await?;
        debug!(index = %self.log.id().short_id(), seq, key = %record.key, deleted = record.value.is_none(), "index write");
        Ok(seq)
    }

    /// Replay any entries appended since the last read.
    async fn caught_up(&self) -> IndexResult<tokio::sync::MutexGuard<'_, View>> {
        let mut view = self.view.lock().await;
        let len = self.log.len();
        while view.next_seq < len {
            let seq = view.next_seq;
            let Some(bytes) = self.log.try_get(seq).await else {
                break;
            };
            let record = IndexRecord::decode(seq, &bytes)?;
            match record.value {
                Some(text) => {
                    let version = Version::from_text(&text).map_err(|e| IndexError::CorruptEntry {
                        seq,
                        reason: e.to_string(),
                    })?;
                    view.map.insert(record.key, version);
                }
                None => {
                    view.map.remove(&record.key);
                }
            }
            view.next_seq = seq + 1;
        }
        Ok(view)
    }
}

impl std::fmt::Debug for TagIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagIndex").field("log", &self.log).finish()
    }
}
