//! Binary Merkle tree commitments and inclusion proofs.

mod cache;
mod hash;
mod hasher;
mod proof;
mod tree;

pub use cache::*;
pub use hash::*;
pub use hasher::*;
pub use proof::*;
pub use tree::*;
