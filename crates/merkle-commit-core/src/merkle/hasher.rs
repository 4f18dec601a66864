//! Pluggable hash functions for leaves and interior nodes.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::Digest;

use super::hash::{Hash, HASH_LEN};
use super::{MerkleError, MerkleResult};

/// The one capability the tree needs from its environment: a deterministic,
/// collision-resistant hash with a `HASH_LEN`-byte output.
pub trait MerkleHasher: Send + Sync {
    /// Human-readable algorithm name, recorded in proof exports.
    fn name(&self) -> &'static str;

    /// Hash an arbitrary byte string.
    fn hash(&self, data: &[u8]) -> MerkleResult<Hash>;

    /// Hash the concatenation `left ++ right`.
    fn hash_pair(&self, left: &Hash, right: &Hash) -> MerkleResult<Hash> {
        let mut buf = [0u8; HASH_LEN * 2];
        buf[..HASH_LEN].copy_from_slice(left.as_bytes());
        buf[HASH_LEN..].copy_from_slice(right.as_bytes());
        self.hash(&buf)
    }
}

impl<H: MerkleHasher + ?Sized> MerkleHasher for Box<H> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn hash(&self, data: &[u8]) -> MerkleResult<Hash> {
        (**self).hash(data)
    }

    fn hash_pair(&self, left: &Hash, right: &Hash) -> MerkleResult<Hash> {
        (**self).hash_pair(left, right)
    }
}

/// Adapter from any RustCrypto [`Digest`] to [`MerkleHasher`].
///
/// Digests whose output is not `HASH_LEN` bytes cannot address tree nodes;
/// every call on such an adapter fails with `HashFunctionFailure`.
pub struct DigestHasher<D> {
    name: &'static str,
    _digest: PhantomData<fn() -> D>,
}

pub type Keccak256Hasher = DigestHasher<sha3::Keccak256>;
pub type Sha256Hasher = DigestHasher<sha2::Sha256>;

impl<D: Digest> DigestHasher<D> {
    pub const fn with_name(name: &'static str) -> Self {
        Self {
            name,
            _digest: PhantomData,
        }
    }

    fn check_width(&self) -> MerkleResult<()> {
        let width = <D as Digest>::output_size();
        if width != HASH_LEN {
            return Err(MerkleError::HashFunctionFailure(format!(
                "{} produces {}-byte digests, tree nodes are {} bytes",
                self.name, width, HASH_LEN
            )));
        }
        Ok(())
    }
}

impl Keccak256Hasher {
    pub const fn keccak256() -> Self {
        Self::with_name("Keccak-256")
    }
}

impl Default for Keccak256Hasher {
    fn default() -> Self {
        Self::keccak256()
    }
}

impl Sha256Hasher {
    pub const fn sha256() -> Self {
        Self::with_name("SHA-256")
    }
}

impl Default for Sha256Hasher {
    fn default() -> Self {
        Self::sha256()
    }
}

impl<D> Clone for DigestHasher<D> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            _digest: PhantomData,
        }
    }
}

impl<D> fmt::Debug for DigestHasher<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestHasher").field("name", &self.name).finish()
    }
}

impl<D: Digest> MerkleHasher for DigestHasher<D> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn hash(&self, data: &[u8]) -> MerkleResult<Hash> {
        self.check_width()?;
        Hash::from_slice(D::digest(data).as_slice())
    }

    fn hash_pair(&self, left: &Hash, right: &Hash) -> MerkleResult<Hash> {
        self.check_width()?;
        let output = D::new().chain_update(left).chain_update(right).finalize();
        Hash::from_slice(output.as_slice())
    }
}

/// Hash algorithms selectable by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// Keccak-256, as used by Ethereum-style ledgers.
    #[default]
    Keccak256,
    Sha256,
}

impl HashAlgorithm {
    pub fn hasher(self) -> Box<dyn MerkleHasher> {
        match self {
            HashAlgorithm::Keccak256 => Box::new(Keccak256Hasher::keccak256()),
            HashAlgorithm::Sha256 => Box::new(Sha256Hasher::sha256()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Keccak256 => "keccak256",
            HashAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = MerkleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "keccak256" | "keccak" => Ok(HashAlgorithm::Keccak256),
            "sha256" => Ok(HashAlgorithm::Sha256),
            other => Err(MerkleError::Config(format!(
                "unknown hash algorithm: {}",
                other
            ))),
        }
    }
}

/// Hash each raw item into a leaf, preserving order.
pub fn hash_leaves<H, I, T>(hasher: &H, items: I) -> MerkleResult<Vec<Hash>>
where
    H: MerkleHasher + ?Sized,
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    items
        .into_iter()
        .map(|item| hasher.hash(item.as_ref()))
        .collect()
}
