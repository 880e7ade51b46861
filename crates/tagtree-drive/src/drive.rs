use std::collections::BTreeMap;

use tagtree_crypto::ContentHasher;
use tagtree_log::{Log, LogContainer};
use tagtree_types::{LogId, Version};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::checkout::Checkout;
use crate::error::{DriveError, DriveResult};
use crate::path::normalize;
use crate::record::{BlobRef, DriveHeader, DriveOp, LogRole, CHUNK_SIZE};

/// A versioned file tree kept in two logs.
///
/// The metadata log records one [`DriveOp`] per mutation and the content log
/// holds file bodies. Entry 0 of each is a [`DriveHeader`] naming the other, so
/// either id is enough to find the pair. The version is the metadata log
/// length: 1 right after creation, plus one per mutation.
pub struct VersionedStore {
    metadata: Log,
    content: Log,
    write_lock: Mutex<()>,
}

impl VersionedStore {
    /// Create a fresh drive with two new logs.
    pub async fn create(container: &LogContainer) -> DriveResult<Self> {
        let metadata = container.create_log().await?;
        let content = container.create_log().await?;

        content
            .append(DriveHeader::new(LogRole::Content, metadata.id()).encode()?)
            .await?;
        metadata
            .append(DriveHeader::new(LogRole::Metadata, content.id()).encode()?)
            .await?;

        info!(
            metadata = %metadata.id().short_id(),
            content = %content.id().short_id(),
            "created drive"
        );
        Ok(Self::from_logs(metadata, content))
    }

    /// Attach to an existing drive by its content log id.
    ///
    /// Waits until both headers are available locally, so on a fresh replica
    /// this completes only once replication has delivered them.
    pub async fn attach(container: &LogContainer, content_id: &LogId) -> DriveResult<Self> {
        let content = container.open_log(content_id).await?;
        let content_header =
            DriveHeader::decode(content_id, &content.get(0).await?, LogRole::Content)?;

        let metadata_id = content_header.peer;
        let metadata = container.open_log(&metadata_id).await?;
        let metadata_header =
            DriveHeader::decode(&metadata_id, &metadata.get(0).await?, LogRole::Metadata)?;
        if metadata_header.peer != *content_id {
            return Err(DriveError::HeaderMismatch(format!(
                "metadata log {} belongs to content log {}, not {}",
                metadata_id.short_id(),
                metadata_header.peer.short_id(),
                content_id.short_id()
            )));
        }

        info!(
            metadata = %metadata_id.short_id(),
            content = %content_id.short_id(),
            writable = metadata.is_writable(),
            "attached drive"
        );
        Ok(Self::from_logs(metadata, content))
    }

    fn from_logs(metadata: Log, content: Log) -> Self {
        Self {
            metadata,
            content,
            write_lock: Mutex::new(()),
        }
    }

    pub fn metadata_log_id(&self) -> LogId {
        self.metadata.id()
    }

    pub fn content_log_id(&self) -> LogId {
        self.content.id()
    }

    /// The latest version held locally.
    pub fn version(&self) -> Version {
        Version::new(self.metadata.len())
    }

    pub fn is_writable(&self) -> bool {
        self.metadata.is_writable() && self.content.is_writable()
    }

    /// Store `data` at `path`, replacing any existing file. Returns the new version.
    pub async fn write_file(&self, path: &str, data: &[u8]) -> DriveResult<Version> {
        let path = normalize(path)?;
        self.ensure_writable()?;

        let _guard = self.write_lock.lock().await;
        let mut chunks = Vec::with_capacity(data.len().div_ceil(CHUNK_SIZE));
        for chunk in data.chunks(CHUNK_SIZE) {
            chunks.push(self.content.append(chunk.to_vec()).await?);
        }
        let blob = BlobRef {
            chunks,
            size: data.len() as u64,
            digest: ContentHasher::FILE.hash(data),
        };
        let version = self.commit(DriveOp::Put { path, blob }).await?;
        Ok(version)
    }

    /// Remove the file at `path`. Returns the new version.
    pub async fn delete_file(&self, path: &str) -> DriveResult<Version> {
        let path = normalize(path)?;
        self.ensure_writable()?;

        let _guard = self.write_lock.lock().await;
        if !self.checkout(self.version()).await?.exists(&path) {
            return Err(DriveError::NotFound(path));
        }
        self.commit(DriveOp::Delete { path }).await
    }

    /// Read a file at the latest version.
    pub async fn read_file(&self, path: &str) -> DriveResult<Vec<u8>> {
        self.checkout(self.version()).await?.read_file(path).await
    }

    /// Read-only view of the tree after the first `version` metadata entries.
    pub async fn checkout(&self, version: Version) -> DriveResult<Checkout> {
        let latest = self.version();
        if version > latest {
            return Err(DriveError::VersionOutOfRange {
                requested: version,
                latest,
            });
        }

        let mut files = BTreeMap::new();
        for seq in 1..version.get() {
            let bytes = self.metadata.get(seq).await?;
            match DriveOp::decode(&self.metadata.id(), seq, &bytes)? {
                DriveOp::Put { path, blob } => {
                    files.insert(path, blob);
                }
                DriveOp::Delete { path } => {
                    files.remove(&path);
                }
            }
        }
        Ok(Checkout::new(version, self.content.clone(), files))
    }

    /// Metadata operations in version order, as `(version, op)`.
    pub async fn history(&self) -> DriveResult<Vec<(Version, DriveOp)>> {
        let mut out = Vec::new();
        for seq in 1..self.metadata.len() {
            let bytes = self.metadata.get(seq).await?;
            out.push((
                Version::new(seq + 1),
                DriveOp::decode(&self.metadata.id(), seq, &bytes)?,
            ));
        }
        Ok(out)
    }

    async fn commit(&self, op: DriveOp) -> DriveResult<Version> {
        let seq = self.metadata.append(op.encode()?).await?;
        let version = Version::new(seq + 1);
        debug!(drive = %self.content.id().short_id(), %version, path = op.path(), "drive mutation");
        Ok(version)
    }

    fn ensure_writable(&self) -> DriveResult<()> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(DriveError::ReadOnly)
        }
    }
}

impl std::fmt::Debug for VersionedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedStore")
            .field("metadata", &self.metadata.id())
            .field("content", &self.content.id())
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::DirEntry;
    use std::time::Duration;

    #[tokio::test]
    async fn fresh_drive_is_version_one_and_empty() {
        let container = LogContainer::in_memory();
        let drive = VersionedStore::create(&container).await.unwrap();
        assert_eq!(drive.version(), Version::new(1));
        assert!(drive.checkout(drive.version()).await.unwrap().is_empty());
        assert_ne!(drive.metadata_log_id(), drive.content_log_id());
    }

    #[tokio::test]
    async fn each_mutation_bumps_version() {
        let container = LogContainer::in_memory();
        let drive = VersionedStore::create(&container).await.unwrap();
        assert_eq!(drive.write_file("/a.txt", b"one").await.unwrap(), Version::new(2));
        assert_eq!(drive.write_file("/b.txt", b"two").await.unwrap(), Version::new(3));
        assert_eq!(drive.delete_file("/a.txt").await.unwrap(), Version::new(4));
        assert_eq!(drive.version(), Version::new(4));
    }

    #[tokio::test]
    async fn checkout_sees_historical_state() {
        let container = LogContainer::in_memory();
        let drive = VersionedStore::create(&container).await.unwrap();
        drive.write_file("/notes.txt", b"draft").await.unwrap();
        let v2 = drive.version();
        drive.write_file("/notes.txt", b"final").await.unwrap();
        drive.write_file("/extra.bin", &[0u8; 16]).await.unwrap();

        let old = drive.checkout(v2).await.unwrap();
        assert_eq!(old.read_file("/notes.txt").await.unwrap(), b"draft");
        assert!(!old.exists("/extra.bin"));

        let now = drive.checkout(drive.version()).await.unwrap();
        assert_eq!(now.read_file("notes.txt").await.unwrap(), b"final");
        assert_eq!(now.len(), 2);
        assert_eq!(drive.read_file("/extra.bin").await.unwrap(), vec![0u8; 16]);
    }

    #[tokio::test]
    async fn checkout_zero_is_empty_and_future_is_rejected() {
        let container = LogContainer::in_memory();
        let drive = VersionedStore::create(&container).await.unwrap();
        drive.write_file("/a", b"x").await.unwrap();

        assert!(drive.checkout(Version::ZERO).await.unwrap().is_empty());
        let err = drive.checkout(Version::new(9)).await.unwrap_err();
        assert_eq!(
            err,
            DriveError::VersionOutOfRange {
                requested: Version::new(9),
                latest: Version::new(2)
            }
        );
    }

    #[tokio::test]
    async fn checkout_is_not_affected_by_later_writes() {
        let container = LogContainer::in_memory();
        let drive = VersionedStore::create(&container).await.unwrap();
        drive.write_file("/a", b"1").await.unwrap();
        let snapshot = drive.checkout(drive.version()).await.unwrap();
        let digest = snapshot.content_digest();

        drive.write_file("/a", b"2").await.unwrap();
        drive.write_file("/b", b"3").await.unwrap();
        assert_eq!(snapshot.content_digest(), digest);
        assert_eq!(snapshot.read_file("/a").await.unwrap(), b"1");
    }

    #[tokio::test]
    async fn content_digest_ignores_history() {
        let container = LogContainer::in_memory();
        let one = VersionedStore::create(&container).await.unwrap();
        one.write_file("/x", b"same").await.unwrap();

        let two = VersionedStore::create(&container).await.unwrap();
        two.write_file("/x", b"other").await.unwrap();
        two.write_file("/x", b"same").await.unwrap();

        let a = one.checkout(one.version()).await.unwrap();
        let b = two.checkout(two.version()).await.unwrap();
        assert_eq!(a.content_digest(), b.content_digest());
        assert_eq!(a.files(), b.files());
    }

    #[tokio::test]
    async fn read_dir_lists_implicit_directories() {
        let container = LogContainer::in_memory();
        let drive = VersionedStore::create(&container).await.unwrap();
        drive.write_file("/readme.md", b"hi").await.unwrap();
        drive.write_file("/docs/guide.md", b"g").await.unwrap();
        drive.write_file("/docs/api/index.md", b"i").await.unwrap();

        let c = drive.checkout(drive.version()).await.unwrap();
        assert_eq!(
            c.read_dir("/").unwrap(),
            vec![DirEntry::File("readme.md".into()), DirEntry::Dir("docs".into())]
        );
        let docs: Vec<String> = c
            .read_dir("/docs")
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(docs, vec!["guide.md", "api"]);
        assert!(matches!(c.read_dir("/missing"), Err(DriveError::NotFound(_))));
    }

    #[tokio::test]
    async fn missing_files() {
        let container = LogContainer::in_memory();
        let drive = VersionedStore::create(&container).await.unwrap();
        assert!(matches!(drive.read_file("/nope").await, Err(DriveError::NotFound(_))));
        assert!(matches!(drive.delete_file("/nope").await, Err(DriveError::NotFound(_))));
        assert!(matches!(
            drive.write_file("/", b"x").await,
            Err(DriveError::InvalidPath { .. })
        ));
    }

    #[tokio::test]
    async fn attach_by_content_id_on_same_container() {
        let container = LogContainer::in_memory();
        let drive = VersionedStore::create(&container).await.unwrap();
        drive.write_file("/a", b"alpha").await.unwrap();

        let again = VersionedStore::attach(&container, &drive.content_log_id())
            .await
            .unwrap();
        assert_eq!(again.metadata_log_id(), drive.metadata_log_id());
        assert_eq!(again.version(), drive.version());
        assert_eq!(again.read_file("/a").await.unwrap(), b"alpha");
        assert!(again.is_writable());
    }

    #[tokio::test]
    async fn attach_rejects_metadata_log_id() {
        let container = LogContainer::in_memory();
        let drive = VersionedStore::create(&container).await.unwrap();
        let err = VersionedStore::attach(&container, &drive.metadata_log_id())
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::HeaderMismatch(_)));
    }

    #[tokio::test]
    async fn replica_attach_waits_for_headers_and_is_read_only() {
        let source = LogContainer::in_memory();
        let drive = VersionedStore::create(&source).await.unwrap();
        drive.write_file("/f", b"data").await.unwrap();

        let replica = LogContainer::in_memory();
        let content_id = drive.content_log_id();
        let pending = {
            let replica = replica.clone();
            tokio::spawn(async move { VersionedStore::attach(&replica, &content_id).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!pending.is_finished());

        // Hand-deliver entries the way replication would.
        let content = replica.get_open(&content_id).await.unwrap();
        let source_content = source.get_open(&content_id).await.unwrap();
        content.apply_remote(source_content.entries_from(0).await).await.unwrap();

        let metadata_id = drive.metadata_log_id();
        let metadata = loop {
            if let Some(log) = replica.get_open(&metadata_id).await {
                break log;
            }
            tokio::task::yield_now().await;
        };
        let source_metadata = source.get_open(&metadata_id).await.unwrap();
        metadata.apply_remote(source_metadata.entries_from(0).await).await.unwrap();

        let attached = pending.await.unwrap().unwrap();
        assert!(!attached.is_writable());
        assert_eq!(attached.read_file("/f").await.unwrap(), b"data");
        assert_eq!(attached.write_file("/g", b"x").await.unwrap_err(), DriveError::ReadOnly);
    }

    #[tokio::test]
    async fn large_files_span_several_content_entries() {
        let container = LogContainer::in_memory();
        let drive = VersionedStore::create(&container).await.unwrap();
        let body: Vec<u8> = (0..2 * CHUNK_SIZE + 17).map(|i| (i % 251) as u8).collect();

        drive.write_file("/big.bin", &body).await.unwrap();
        drive.write_file("/empty", b"").await.unwrap();

        let history = drive.history().await.unwrap();
        let DriveOp::Put { blob, .. } = &history[0].1 else {
            panic!("expected a put");
        };
        assert_eq!(blob.chunks, vec![1, 2, 3]);
        assert_eq!(blob.size, body.len() as u64);

        assert_eq!(drive.read_file("/big.bin").await.unwrap(), body);
        assert!(drive.read_file("/empty").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_lists_operations() {
        let container = LogContainer::in_memory();
        let drive = VersionedStore::create(&container).await.unwrap();
        drive.write_file("/a", b"1").await.unwrap();
        drive.delete_file("/a").await.unwrap();

        let history = drive.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].0, Version::new(2));
        assert!(matches!(history[1].1, DriveOp::Delete { .. }));
    }

    #[tokio::test]
    async fn file_backed_drive_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let content_id = {
            let container = LogContainer::open_dir(dir.path());
            let drive = VersionedStore::create(&container).await.unwrap();
            drive.write_file("/persist.txt", b"kept").await.unwrap();
            drive.content_log_id()
        };

        let container = LogContainer::open_dir(dir.path());
        let drive = VersionedStore::attach(&container, &content_id).await.unwrap();
        assert!(drive.is_writable());
        assert_eq!(drive.version(), Version::new(2));
        assert_eq!(drive.read_file("/persist.txt").await.unwrap(), b"kept");
    }
}
