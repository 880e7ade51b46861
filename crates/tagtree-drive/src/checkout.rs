use std::collections::{BTreeMap, BTreeSet};

use tagtree_crypto::{ContentHasher, MerkleTree};
use tagtree_log::Log;
use tagtree_types::{ContentDigest, Version};

use crate::error::{DriveError, DriveResult};
use crate::path::{normalize, normalize_dir};
use crate::record::BlobRef;

/// A file in a checkout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub digest: ContentDigest,
}

/// One name inside a directory listing.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DirEntry {
    File(String),
    Dir(String),
}

impl DirEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::File(n) | Self::Dir(n) => n,
        }
    }
}

/// Read-only view of a drive at a fixed version.
///
/// The file table is resolved when the checkout is made; later writes to the
/// drive never change it. File bodies are read from the content log on demand.
#[derive(Clone, Debug)]
pub struct Checkout {
    version: Version,
    content: Log,
    files: BTreeMap<String, BlobRef>,
}

impl Checkout {
    pub(crate) fn new(version: Version, content: Log, files: BTreeMap<String, BlobRef>) -> Self {
        Self {
            version,
            content,
            files,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn exists(&self, path: &str) -> bool {
        normalize(path).map_or(false, |p| self.files.contains_key(&p))
    }

    pub fn stat(&self, path: &str) -> DriveResult<FileEntry> {
        let path = normalize(path)?;
        let blob = self
            .files
            .get(&path)
            .ok_or_else(|| DriveError::NotFound(path.clone()))?;
        Ok(FileEntry {
            path,
            size: blob.size,
            digest: blob.digest,
        })
    }

    /// Read a file body, checking it against the recorded digest.
    pub async fn read_file(&self, path: &str) -> DriveResult<Vec<u8>> {
        let path = normalize(path)?;
        let blob = self
            .files
            .get(&path)
            .ok_or_else(|| DriveError::NotFound(path.clone()))?;

        let mut bytes = Vec::with_capacity(blob.size as usize);
        for seq in &blob.chunks {
            bytes.extend_from_slice(&self.content.get(*seq).await?);
        }
        if bytes.len() as u64 != blob.size || !ContentHasher::FILE.verify(&bytes, &blob.digest) {
            return Err(DriveError::HashMismatch { path });
        }
        Ok(bytes)
    }

    /// Every file, in path order.
    pub fn files(&self) -> Vec<FileEntry> {
        self.files
            .iter()
            .map(|(path, blob)| FileEntry {
                path: path.clone(),
                size: blob.size,
                digest: blob.digest,
            })
            .collect()
    }

    /// Immediate children of a directory. Directories exist implicitly.
    pub fn read_dir(&self, dir: &str) -> DriveResult<Vec<DirEntry>> {
        let dir = normalize_dir(dir)?;
        let prefix = if dir == "/" { "/".to_string() } else { format!("{dir}/") };

        let mut out = BTreeSet::new();
        for path in self.files.keys() {
            let Some(rest) = path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((child, _)) => out.insert(DirEntry::Dir(child.to_string())),
                None => out.insert(DirEntry::File(rest.to_string())),
            };
        }

        if out.is_empty() && dir != "/" {
            return Err(DriveError::NotFound(dir));
        }
        Ok(out.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Fingerprint of the tree: equal for checkouts with the same paths and
    /// file contents, however they were produced.
    pub fn content_digest(&self) -> ContentDigest {
        let leaves = self
            .files
            .iter()
            .map(|(path, blob)| {
                ContentHasher::TREE_LEAF.hash_parts(&[path.as_bytes(), blob.digest.as_bytes()])
            })
            .collect();
        MerkleTree::from_leaves(leaves).root()
    }
}
