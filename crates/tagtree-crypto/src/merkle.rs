use tagtree_types::ContentDigest;

/// Binary Merkle tree over content digests.
///
/// Used to fingerprint a drive checkout: the leaves are the per-file
/// `(path, digest)` hashes in path order, so two checkouts with the same files
/// and contents have the same root regardless of how they were built.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    root: ContentDigest,
    leaf_count: usize,
}

impl MerkleTree {
    /// Build a Merkle tree from leaf digests.
    ///
    /// An empty list produces a null root. A single leaf is its own root.
    pub fn from_leaves(leaves: Vec<ContentDigest>) -> Self {
        let leaf_count = leaves.len();
        if leaves.is_empty() {
            return Self {
                root: ContentDigest::null(),
                leaf_count,
            };
        }

        let mut current = leaves;
        while current.len() > 1 {
            let mut next = Vec::with_capacity((current.len() + 1) / 2);
            for pair in current.chunks(2) {
                let hash = if pair.len() == 2 {
                    hash_pair(&pair[0], &pair[1])
                } else {
                    // Odd node: hash with itself
                    hash_pair(&pair[0], &pair[0])
                };
                next.push(hash);
            }
            current = next;
        }

        Self {
            root: current[0],
            leaf_count,
        }
    }

    /// The root hash of the tree.
    pub fn root(&self) -> ContentDigest {
        self.root
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }
}

fn hash_pair(left: &ContentDigest, right: &ContentDigest) -> ContentDigest {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"tagtree-merkle-v1:");
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    ContentDigest::from_hash(*hasher.finalize().as_bytes())
}
