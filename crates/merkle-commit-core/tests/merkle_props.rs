//! Property tests for tree building and proofs.

use merkle_commit_core::merkle::{
    build_root, build_tree, expected_depth, verify_proof, Hash, MerkleHasher, Sha256Hasher,
    HASH_LEN,
};
use proptest::prelude::*;

fn leaf_strategy(max: usize) -> impl Strategy<Value = Vec<Hash>> {
    prop::collection::vec(prop::array::uniform32(any::<u8>()), 0..max)
        .prop_map(|raw| raw.into_iter().map(Hash::new).collect())
}

proptest! {
    #[test]
    fn prop_root_is_deterministic(leaves in leaf_strategy(40)) {
        let hasher = Sha256Hasher::sha256();
        prop_assert_eq!(build_root(&hasher, &leaves).unwrap(), build_root(&hasher, &leaves).unwrap());
    }

    #[test]
    fn prop_tree_root_matches_build_root(leaves in leaf_strategy(40)) {
        let hasher = Sha256Hasher::sha256();
        let tree = build_tree(&hasher, &leaves).unwrap();
        prop_assert_eq!(tree.root(), build_root(&hasher, &leaves).unwrap());
        prop_assert_eq!(tree.depth(), expected_depth(leaves.len()));
    }

    #[test]
    fn prop_every_proof_verifies(leaves in leaf_strategy(40)) {
        let hasher = Sha256Hasher::sha256();
        let tree = build_tree(&hasher, &leaves).unwrap();
        let root = build_root(&hasher, &leaves).unwrap();

        for (i, leaf) in leaves.iter().enumerate() {
            let proof = tree.generate_proof(i).unwrap();
            prop_assert_eq!(proof.len(), expected_depth(leaves.len()));
            prop_assert!(verify_proof(&hasher, leaf, i, &proof, &root).unwrap());
        }
    }

    #[test]
    fn prop_bit_flip_in_leaf_is_detected(
        leaves in leaf_strategy(24).prop_filter("need leaves", |l| !l.is_empty()),
        pick in any::<prop::sample::Index>(),
        byte in 0..HASH_LEN,
        bit in 0u8..8,
    ) {
        let hasher = Sha256Hasher::sha256();
        let tree = build_tree(&hasher, &leaves).unwrap();
        let i = pick.index(leaves.len());
        let proof = tree.generate_proof(i).unwrap();

        let mut bytes = *leaves[i].as_bytes();
        bytes[byte] ^= 1 << bit;
        prop_assert!(!verify_proof(&hasher, &Hash::new(bytes), i, &proof, &tree.root()).unwrap());
    }

    #[test]
    fn prop_bit_flip_in_sibling_is_detected(
        leaves in leaf_strategy(24).prop_filter("need siblings", |l| l.len() > 1),
        pick in any::<prop::sample::Index>(),
        step in any::<prop::sample::Index>(),
        byte in 0..HASH_LEN,
    ) {
        let hasher = Sha256Hasher::sha256();
        let tree = build_tree(&hasher, &leaves).unwrap();
        let i = pick.index(leaves.len());
        let mut proof = tree.generate_proof(i).unwrap();

        let s = step.index(proof.len());
        let mut sibling = *proof.steps[s].hash.as_bytes();
        sibling[byte] ^= 0x01;
        proof.steps[s].hash = Hash::new(sibling);

        prop_assert!(!verify_proof(&hasher, &leaves[i], i, &proof, &tree.root()).unwrap());
    }

    #[test]
    fn prop_pair_order_matters(a in prop::array::uniform32(any::<u8>()), b in prop::array::uniform32(any::<u8>())) {
        prop_assume!(a != b);
        let hasher = Sha256Hasher::sha256();
        let (a, b) = (Hash::new(a), Hash::new(b));
        prop_assert_ne!(hasher.hash_pair(&a, &b).unwrap(), hasher.hash_pair(&b, &a).unwrap());
    }
}
