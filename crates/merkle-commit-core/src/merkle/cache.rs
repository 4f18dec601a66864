//! Memoization of built trees keyed by leaf sequence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use super::hash::Hash;
use super::hasher::MerkleHasher;
use super::tree::MerkleTree;
use super::{MerkleError, MerkleResult};

/// Thread-safe cache of built trees.
///
/// Building happens under the lock, so concurrent requests for the same
/// leaf sequence create exactly one entry.
#[derive(Default)]
pub struct TreeCache {
    trees: Mutex<HashMap<Hash, Arc<MerkleTree>>>,
}

impl TreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for a leaf sequence: `H(len_be ++ leaf_0 ++ ... ++ leaf_n)`.
    pub fn key_for<H: MerkleHasher + ?Sized>(hasher: &H, leaves: &[Hash]) -> MerkleResult<Hash> {
        let mut buf = Vec::with_capacity(8 + leaves.len() * super::HASH_LEN);
        buf.extend_from_slice(&(leaves.len() as u64).to_be_bytes());
        for leaf in leaves {
            buf.extend_from_slice(leaf.as_bytes());
        }
        hasher.hash(&buf)
    }

    /// Return the cached tree for `leaves`, building it on first request.
    pub fn get_or_build<H: MerkleHasher + ?Sized>(
        &self,
        hasher: &H,
        leaves: &[Hash],
    ) -> MerkleResult<Arc<MerkleTree>> {
        let key = Self::key_for(hasher, leaves)?;
        let mut trees = self.lock()?;

        if let Some(tree) = trees.get(&key) {
            trace!(%key, "tree cache hit");
            return Ok(Arc::clone(tree));
        }

        debug!(%key, leaf_count = leaves.len(), "tree cache miss");
        let tree = Arc::new(MerkleTree::build(hasher, leaves)?);
        trees.insert(key, Arc::clone(&tree));
        Ok(tree)
    }

    pub fn len(&self) -> MerkleResult<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> MerkleResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    pub fn clear(&self) -> MerkleResult<()> {
        self.lock()?.clear();
        Ok(())
    }

    fn lock(&self) -> MerkleResult<std::sync::MutexGuard<'_, HashMap<Hash, Arc<MerkleTree>>>> {
        self.trees
            .lock()
            .map_err(|e| MerkleError::Config(format!("Tree cache lock poisoned: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::hasher::Sha256Hasher;
    use std::thread;

    fn leaves(n: usize) -> Vec<Hash> {
        let hasher = Sha256Hasher::sha256();
        (0..n)
            .map(|i| hasher.hash(&(i as u32).to_le_bytes()).unwrap())
            .collect()
    }

    #[test]
    fn test_same_leaves_share_tree() {
        let hasher = Sha256Hasher::sha256();
        let cache = TreeCache::new();
        let l = leaves(5);

        let first = cache.get_or_build(&hasher, &l).unwrap();
        let second = cache.get_or_build(&hasher, &l).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_different_leaves_different_entries() {
        let hasher = Sha256Hasher::sha256();
        let cache = TreeCache::new();

        cache.get_or_build(&hasher, &leaves(3)).unwrap();
        cache.get_or_build(&hasher, &leaves(4)).unwrap();
        assert_eq!(cache.len().unwrap(), 2);

        cache.clear().unwrap();
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_key_distinguishes_order() {
        let hasher = Sha256Hasher::sha256();
        let mut l = leaves(2);
        let forward = TreeCache::key_for(&hasher, &l).unwrap();
        l.reverse();
        assert_ne!(forward, TreeCache::key_for(&hasher, &l).unwrap());
    }

    #[test]
    fn test_concurrent_builds_create_one_entry() {
        let hasher = Arc::new(Sha256Hasher::sha256());
        let cache = Arc::new(TreeCache::new());
        let l = Arc::new(leaves(33));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (hasher, cache, l) = (Arc::clone(&hasher), Arc::clone(&cache), Arc::clone(&l));
                thread::spawn(move || cache.get_or_build(hasher.as_ref(), &l).unwrap().root())
            })
            .collect();

        let roots: Vec<Hash> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(roots.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.len().unwrap(), 1);
    }
}
