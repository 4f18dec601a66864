//! Merkle-Commit Core Library
//!
//! Binary Merkle tree commitments over ordered sequences of opaque items,
//! with compact inclusion proofs that verify against the root alone.
//!
//! # Architecture
//!
//! ```text
//!   items ──hash──▶ leaves (level 0)
//!                      │
//!                 build_tree / build_root      H(left ++ right), odd tail H(x ++ x)
//!                      │
//!                      ▼
//!           ┌──────────────────────┐
//!           │ MerkleTree (levels)  │──generate_proof(i)──▶ Proof [(sibling, side)..]
//!           └──────────┬───────────┘                              │
//!                      │ root                                     │
//!                      ▼                                          ▼
//!                 commitment ◀──────── verify_proof(leaf, i, proof, root)
//! ```
//!
//! # Modules
//!
//! - [`merkle`]: hash type, pluggable hashers, tree building, proofs, tree cache
//! - [`config`]: algorithm / verification / leaf-encoding settings

pub mod config;
pub mod merkle;

// Re-export commonly used types
pub use config::{CommitConfig, LeafEncoding};
pub use merkle::{
    build_root, build_tree, derive_root, generate_proof, verify_proof, verify_proof_with, Hash,
    HashAlgorithm, InclusionProof, MerkleError, MerkleHasher, MerkleResult, MerkleTree, Proof,
    ProofExport, ProofStep, Side, TreeCache, TreeStats, VerifyMode, EMPTY_HASH, HASH_LEN,
};
