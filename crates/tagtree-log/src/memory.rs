//! Ephemeral in-memory storage backend.
//!
//! [`InMemoryLogStorage`] is the default backend of a
//! [`LogContainer`](crate::LogContainer). Everything is lost when the last
//! handle is dropped.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tagtree_types::LogId;

use crate::entry::SignedEntry;
use crate::error::{StorageError, StorageResult};
use crate::traits::LogStorage;

#[derive(Default)]
struct MemoryState {
    entries: HashMap<LogId, Vec<SignedEntry>>,
    secrets: HashMap<LogId, [u8; 32]>,
}

/// An in-memory implementation of [`LogStorage`].
#[derive(Default)]
pub struct InMemoryLogStorage {
    state: RwLock<MemoryState>,
}

impl InMemoryLogStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored entries across all logs.
    pub fn entry_count(&self) -> usize {
        self.state
            .read()
            .map(|s| s.entries.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Unavailable(format!("lock poisoned: {e}"))
}

#[async_trait]
impl LogStorage for InMemoryLogStorage {
    async fn ready(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn list_logs(&self) -> StorageResult<Vec<LogId>> {
        let state = self.state.read().map_err(poisoned)?;
        let mut ids: Vec<LogId> = state
            .entries
            .keys()
            .chain(state.secrets.keys())
            .copied()
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn load_entries(&self, id: &LogId) -> StorageResult<Vec<SignedEntry>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.entries.get(id).cloned().unwrap_or_default())
    }

    async fn append_entry(&self, id: &LogId, entry: &SignedEntry) -> StorageResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.entries.entry(*id).or_default().push(entry.clone());
        Ok(())
    }

    async fn load_secret(&self, id: &LogId) -> StorageResult<Option<[u8; 32]>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.secrets.get(id).copied())
    }

    async fn store_secret(&self, id: &LogId, secret: &[u8; 32]) -> StorageResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.secrets.insert(*id, *secret);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryLogStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLogStorage")
            .field("entry_count", &self.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagtree_crypto::SigningKey;

    #[tokio::test]
    async fn append_and_load() {
        let storage = InMemoryLogStorage::new();
        let key = SigningKey::generate();
        let id = key.log_id();

        let e0 = SignedEntry::sign(&key, 0, None, b"a".to_vec());
        let e1 = SignedEntry::sign(&key, 1, Some(e0.chain_hash), b"b".to_vec());
        storage.append_entry(&id, &e0).await.unwrap();
        storage.append_entry(&id, &e1).await.unwrap();

        let loaded = storage.load_entries(&id).await.unwrap();
        assert_eq!(loaded, vec![e0, e1]);
        assert_eq!(storage.entry_count(), 2);
    }

    #[tokio::test]
    async fn unknown_log_is_empty() {
        let storage = InMemoryLogStorage::new();
        let id = SigningKey::generate().log_id();
        assert!(storage.load_entries(&id).await.unwrap().is_empty());
        assert!(storage.load_secret(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn secrets_are_listed() {
        let storage = InMemoryLogStorage::new();
        let key = SigningKey::generate();
        let id = key.log_id();
        storage.store_secret(&id, key.as_bytes()).await.unwrap();

        assert_eq!(storage.load_secret(&id).await.unwrap(), Some(*key.as_bytes()));
        assert_eq!(storage.list_logs().await.unwrap(), vec![id]);
    }
}
