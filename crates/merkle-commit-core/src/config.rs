//! Commitment configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::merkle::{Hash, HashAlgorithm, MerkleError, MerkleHasher, MerkleResult, VerifyMode};

/// How textual items are turned into leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafEncoding {
    /// Hash the UTF-8 bytes of each item.
    #[default]
    Utf8,
    /// Hex-decode each item, then hash the bytes.
    Hex,
    /// Each item already is a hex-encoded leaf hash.
    Prehashed,
}

impl LeafEncoding {
    pub fn to_leaves<H, S>(&self, hasher: &H, items: &[S]) -> MerkleResult<Vec<Hash>>
    where
        H: MerkleHasher + ?Sized,
        S: AsRef<str>,
    {
        items
            .iter()
            .map(|item| {
                let item = item.as_ref();
                match self {
                    LeafEncoding::Utf8 => hasher.hash(item.as_bytes()),
                    LeafEncoding::Hex => {
                        let digits = item.strip_prefix("0x").unwrap_or(item);
                        let bytes = hex::decode(digits).map_err(|e| {
                            MerkleError::Config(format!("item {:?} is not hex: {}", item, e))
                        })?;
                        hasher.hash(&bytes)
                    }
                    LeafEncoding::Prehashed => Hash::from_hex(item),
                }
            })
            .collect()
    }
}

/// Settings shared by tree building and proof verification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommitConfig {
    pub algorithm: HashAlgorithm,
    pub verify_mode: VerifyMode,
    pub leaf_encoding: LeafEncoding,
}

impl CommitConfig {
    pub fn from_json_str(json: &str) -> MerkleResult<Self> {
        serde_json::from_str(json).map_err(|e| MerkleError::Config(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> MerkleResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn hasher(&self) -> Box<dyn MerkleHasher> {
        self.algorithm.hasher()
    }
}
