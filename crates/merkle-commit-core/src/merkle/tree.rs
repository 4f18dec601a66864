//! Merkle tree core implementation.

use thiserror::Error;
use tracing::debug;

use super::hash::{Hash, EMPTY_HASH};
use super::hasher::{hash_leaves, MerkleHasher};
use super::proof::{self, InclusionProof, Proof};

/// Merkle tree errors.
#[derive(Error, Debug)]
pub enum MerkleError {
    #[error("Leaf index {index} out of range for {leaf_count} leaves")]
    IndexOutOfRange { index: i64, leaf_count: usize },

    #[error("Malformed proof: {0}")]
    MalformedProof(String),

    #[error("Hash function failure: {0}")]
    HashFunctionFailure(String),

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type MerkleResult<T> = Result<T, MerkleError>;

/// A fully built tree: every level from the leaves up to the single root.
///
/// Level 0 holds the leaves in input order. Each following level has
/// `ceil(len / 2)` entries; an unpaired last node is hashed with itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Build the tree for `leaves`.
    pub fn build<H: MerkleHasher + ?Sized>(hasher: &H, leaves: &[Hash]) -> MerkleResult<Self> {
        let mut levels = vec![leaves.to_vec()];

        while levels[levels.len() - 1].len() > 1 {
            let next = next_level(hasher, &levels[levels.len() - 1])?;
            levels.push(next);
        }

        let tree = Self { levels };
        debug!(
            leaf_count = tree.leaf_count(),
            depth = tree.depth(),
            hasher = hasher.name(),
            "built merkle tree"
        );
        Ok(tree)
    }

    /// Build the tree from raw items, hashing each into a leaf first.
    pub fn from_items<H, I, T>(hasher: &H, items: I) -> MerkleResult<Self>
    where
        H: MerkleHasher + ?Sized,
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let leaves = hash_leaves(hasher, items)?;
        Self::build(hasher, &leaves)
    }

    /// Root hash; the empty-set sentinel for a tree without leaves.
    pub fn root(&self) -> Hash {
        match self.levels.last() {
            Some(top) if top.len() == 1 => top[0],
            _ => EMPTY_HASH,
        }
    }

    /// Number of levels above the leaves. Equals the length of every proof.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    pub fn leaves(&self) -> &[Hash] {
        &self.levels[0]
    }

    pub fn levels(&self) -> &[Vec<Hash>] {
        &self.levels
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_count() == 0
    }

    /// Sibling path for the leaf at `index`.
    pub fn generate_proof(&self, index: usize) -> MerkleResult<Proof> {
        proof::generate_proof(self, index)
    }

    /// Self-contained proof bundle for the leaf at `index`.
    pub fn inclusion_proof(&self, index: usize) -> MerkleResult<InclusionProof> {
        let proof = self.generate_proof(index)?;
        Ok(InclusionProof {
            leaf_hash: self.levels[0][index],
            root_hash: self.root(),
            leaf_index: index,
            leaf_count: self.leaf_count(),
            proof,
        })
    }

    /// Get the current tree statistics.
    pub fn stats(&self) -> TreeStats {
        TreeStats {
            root_hash: self.root(),
            depth: self.depth(),
            leaf_count: self.leaf_count(),
        }
    }
}

/// Tree statistics.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TreeStats {
    pub root_hash: Hash,
    pub depth: usize,
    pub leaf_count: usize,
}

/// Combine adjacent pairs of `level` into its parent level.
fn next_level<H: MerkleHasher + ?Sized>(hasher: &H, level: &[Hash]) -> MerkleResult<Vec<Hash>> {
    level
        .chunks(2)
        .map(|chunk| {
            let left = &chunk[0];
            // Odd node - pair with itself
            let right = chunk.get(1).unwrap_or(left);
            hasher.hash_pair(left, right)
        })
        .collect()
}

/// Compute only the root of `leaves`, discarding intermediate levels.
pub fn build_root<H: MerkleHasher + ?Sized>(hasher: &H, leaves: &[Hash]) -> MerkleResult<Hash> {
    match leaves {
        [] => Ok(EMPTY_HASH),
        [single] => Ok(*single),
        _ => {
            let mut current = next_level(hasher, leaves)?;
            while current.len() > 1 {
                current = next_level(hasher, &current)?;
            }
            Ok(current[0])
        }
    }
}

/// Build the full level sequence for `leaves`.
pub fn build_tree<H: MerkleHasher + ?Sized>(hasher: &H, leaves: &[Hash]) -> MerkleResult<MerkleTree> {
    MerkleTree::build(hasher, leaves)
}

/// Hash raw items into leaves and return their root.
pub fn derive_root<H, I, T>(hasher: &H, items: I) -> MerkleResult<Hash>
where
    H: MerkleHasher + ?Sized,
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let leaves = hash_leaves(hasher, items)?;
    build_root(hasher, &leaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::hasher::{Keccak256Hasher, Sha256Hasher};

    fn leaves(hasher: &Sha256Hasher, n: usize) -> Vec<Hash> {
        (0..n)
            .map(|i| hasher.hash(format!("item-{}", i).as_bytes()).unwrap())
            .collect()
    }

    #[test]
    fn test_empty_root_is_sentinel() {
        let hasher = Sha256Hasher::sha256();
        assert_eq!(build_root(&hasher, &[]).unwrap(), EMPTY_HASH);

        let tree = build_tree(&hasher, &[]).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.root(), EMPTY_HASH);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_single_leaf_is_root() {
        let hasher = Sha256Hasher::sha256();
        let leaf = hasher.hash(b"only").unwrap();

        assert_eq!(build_root(&hasher, &[leaf]).unwrap(), leaf);

        let tree = build_tree(&hasher, &[leaf]).unwrap();
        assert_eq!(tree.root(), leaf);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.levels().len(), 1);
    }

    #[test]
    fn test_two_leaves() {
        let hasher = Sha256Hasher::sha256();
        let l = leaves(&hasher, 2);
        assert_eq!(
            build_root(&hasher, &l).unwrap(),
            hasher.hash_pair(&l[0], &l[1]).unwrap()
        );
    }

    #[test]
    fn test_three_leaves_duplicates_last() {
        let hasher = Sha256Hasher::sha256();
        let l = leaves(&hasher, 3);

        let ab = hasher.hash_pair(&l[0], &l[1]).unwrap();
        let cc = hasher.hash_pair(&l[2], &l[2]).unwrap();
        let expected = hasher.hash_pair(&ab, &cc).unwrap();

        assert_eq!(build_root(&hasher, &l).unwrap(), expected);
    }

    #[test]
    fn test_odd_level_above_leaves_duplicates_last() {
        // 5 leaves -> 3 parents -> 2 -> 1; the middle level is odd as well.
        let hasher = Sha256Hasher::sha256();
        let l = leaves(&hasher, 5);

        let p0 = hasher.hash_pair(&l[0], &l[1]).unwrap();
        let p1 = hasher.hash_pair(&l[2], &l[3]).unwrap();
        let p2 = hasher.hash_pair(&l[4], &l[4]).unwrap();
        let q0 = hasher.hash_pair(&p0, &p1).unwrap();
        let q1 = hasher.hash_pair(&p2, &p2).unwrap();
        let expected = hasher.hash_pair(&q0, &q1).unwrap();

        assert_eq!(build_root(&hasher, &l).unwrap(), expected);
    }

    #[test]
    fn test_level_lengths_halve() {
        let hasher = Sha256Hasher::sha256();
        let tree = build_tree(&hasher, &leaves(&hasher, 13)).unwrap();

        let lengths: Vec<usize> = tree.levels().iter().map(|l| l.len()).collect();
        assert_eq!(lengths, vec![13, 7, 4, 2, 1]);
        assert_eq!(tree.depth(), 4);
    }

    #[test]
    fn test_tree_root_matches_build_root() {
        let hasher = Keccak256Hasher::keccak256();
        for n in 0..20 {
            let l: Vec<Hash> = (0..n)
                .map(|i| hasher.hash(&[i as u8]).unwrap())
                .collect();
            let tree = build_tree(&hasher, &l).unwrap();
            assert_eq!(tree.root(), build_root(&hasher, &l).unwrap(), "n = {}", n);
        }
    }

    #[test]
    fn test_deterministic() {
        let hasher = Sha256Hasher::sha256();
        let l = leaves(&hasher, 9);
        assert_eq!(build_root(&hasher, &l).unwrap(), build_root(&hasher, &l).unwrap());
    }

    #[test]
    fn test_derive_root_hashes_items() {
        let hasher = Sha256Hasher::sha256();
        let items = ["tx-1", "tx-2", "tx-3"];

        let expected = build_root(&hasher, &hash_leaves(&hasher, items).unwrap()).unwrap();
        assert_eq!(derive_root(&hasher, items).unwrap(), expected);
        assert_eq!(MerkleTree::from_items(&hasher, items).unwrap().root(), expected);
    }

    #[test]
    fn test_stats() {
        let hasher = Sha256Hasher::sha256();
        let tree = build_tree(&hasher, &leaves(&hasher, 6)).unwrap();
        let stats = tree.stats();

        assert_eq!(stats.leaf_count, 6);
        assert_eq!(stats.depth, 3);
        assert_eq!(stats.root_hash, tree.root());
    }
}
