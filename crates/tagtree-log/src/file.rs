//! Directory-backed storage backend.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<hex log id>/entries.log   framed entries, append-only
//! <root>/<hex log id>/secret.key    32-byte secret, only for logs created here
//! ```
//!
//! Each record in `entries.log` is framed as:
//!
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized SignedEntry)]
//! ```
//!
//! On load the file is read front-to-back. The first record with a bad
//! length or checksum marks a torn write from a crash: it and everything after
//! it are discarded and the file is truncated back to the last good record.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tagtree_types::LogId;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::entry::SignedEntry;
use crate::error::{StorageError, StorageResult};
use crate::traits::LogStorage;

const ENTRIES_FILE: &str = "entries.log";
const SECRET_FILE: &str = "secret.key";

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Flush/sync strategy for appends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// `fsync` after every append (safest, highest latency).
    EveryWrite,
    /// Rely on OS page-cache buffering.
    #[default]
    OsDefault,
}

/// Configuration for [`FileLogStorage`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileStorageConfig {
    pub sync_mode: SyncMode,
}

/// A [`LogStorage`] that keeps one directory per log.
pub struct FileLogStorage {
    root: PathBuf,
    config: FileStorageConfig,
    writers: Mutex<HashMap<LogId, Writer>>,
}

/// Open entries file plus the length of its intact prefix.
struct Writer {
    file: File,
    len: u64,
}

impl FileLogStorage {
    pub fn new(root: impl Into<PathBuf>, config: FileStorageConfig) -> Self {
        Self {
            root: root.into(),
            config,
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Root directory of this backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn log_dir(&self, id: &LogId) -> PathBuf {
        self.root.join(id.to_hex())
    }
}

/// Encode one entry as a framed record.
pub(crate) fn encode_frame(entry: &SignedEntry) -> StorageResult<Vec<u8>> {
    let payload =
        bincode::serialize(entry).map_err(|e| StorageError::Serialization(e.to_string()))?;
    let length = frame_length(payload.len())?;
    let crc = crc32fast::hash(&payload);

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&length.to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

fn frame_length(len: usize) -> StorageResult<u32> {
    u32::try_from(len).map_err(|_| {
        StorageError::Serialization(format!("record of {len} bytes does not fit a frame"))
    })
}

async fn write_frame(file: &mut File, frame: &[u8], sync_mode: SyncMode) -> StorageResult<()> {
    file.write_all(frame).await?;
    file.flush().await?;
    if sync_mode == SyncMode::EveryWrite {
        file.sync_data().await?;
    }
    Ok(())
}

/// Result of scanning an entries file.
#[derive(Debug)]
pub(crate) struct Recovered {
    pub entries: Vec<SignedEntry>,
    /// Byte length of the intact prefix.
    pub valid_len: u64,
}

/// Decode framed records, stopping at the first torn or corrupt record.
pub(crate) fn decode_frames(data: &[u8]) -> StorageResult<Recovered> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while offset + HEADER_SIZE <= data.len() {
        let length = u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) as usize;
        let expected_crc = u32::from_le_bytes([
            data[offset + 4],
            data[offset + 5],
            data[offset + 6],
            data[offset + 7],
        ]);

        let start = offset + HEADER_SIZE;
        if length == 0 || start + length > data.len() {
            warn!(offset, length, file_len = data.len(), "torn record; discarding tail");
            break;
        }

        let payload = &data[start..start + length];
        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; discarding tail"
            );
            break;
        }

        let entry: SignedEntry = bincode::deserialize(payload)
            .map_err(|e| StorageError::Serialization(format!("record at offset {offset}: {e}")))?;
        entries.push(entry);
        offset = start + length;
    }

    Ok(Recovered {
        entries,
        valid_len: offset as u64,
    })
}

#[async_trait]
impl LogStorage for FileLogStorage {
    async fn ready(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            StorageError::Unavailable(format!("{}: {e}", self.root.display()))
        })?;
        let meta = fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            return Err(StorageError::Unavailable(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }

    async fn list_logs(&self) -> StorageResult<Vec<LogId>> {
        let mut ids = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(|s| LogId::from_hex(s).ok()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn load_entries(&self, id: &LogId) -> StorageResult<Vec<SignedEntry>> {
        let path = self.log_dir(id).join(ENTRIES_FILE);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let recovered = decode_frames(&data)?;
        if recovered.valid_len < data.len() as u64 {
            let file = OpenOptions::new().write(true).open(&path).await?;
            file.set_len(recovered.valid_len).await?;
            file.sync_all().await?;
        }

        debug!(log = %id.short_id(), recovered = recovered.entries.len(), "log recovery complete");
        Ok(recovered.entries)
    }

    async fn append_entry(&self, id: &LogId, entry: &SignedEntry) -> StorageResult<()> {
        let frame = encode_frame(entry)?;
        let path = self.log_dir(id).join(ENTRIES_FILE);
        let mut writers = self.writers.lock().await;

        if !writers.contains_key(id) {
            fs::create_dir_all(self.log_dir(id)).await?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            let len = file.metadata().await?.len();
            writers.insert(*id, Writer { file, len });
        }
        let writer = writers
            .get_mut(id)
            .ok_or_else(|| StorageError::Unavailable("writer vanished".into()))?;

        match write_frame(&mut writer.file, &frame, self.config.sync_mode).await {
            Ok(()) => {
                writer.len += frame.len() as u64;
                Ok(())
            }
            Err(e) => {
                // Cut any partial frame so later appends follow the last good record.
                let len = writer.len;
                writers.remove(id);
                warn!(log = %id.short_id(), len, error = %e, "append failed; truncating partial record");
                let file = OpenOptions::new().write(true).open(&path).await?;
                file.set_len(len).await?;
                Err(e)
            }
        }
    }

    async fn load_secret(&self, id: &LogId) -> StorageResult<Option<[u8; 32]>> {
        let path = self.log_dir(id).join(SECRET_FILE);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let secret: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| StorageError::CorruptKey {
            log: id.short_id(),
            reason: format!("expected 32 bytes, found {}", b.len()),
        })?;
        Ok(Some(secret))
    }

    async fn store_secret(&self, id: &LogId, secret: &[u8; 32]) -> StorageResult<()> {
        let dir = self.log_dir(id);
        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(SECRET_FILE), secret).await?;
        Ok(())
    }
}

impl std::fmt::Debug for FileLogStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLogStorage")
            .field("root", &self.root)
            .field("sync_mode", &self.config.sync_mode)
            .finish()
    }
}
