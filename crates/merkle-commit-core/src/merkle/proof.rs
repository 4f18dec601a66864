//! Inclusion proofs: generation, replay and verification.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::hash::Hash;
use super::hasher::MerkleHasher;
use super::tree::MerkleTree;
use super::{MerkleError, MerkleResult};

/// Proof export format version.
pub const PROOF_FORMAT_VERSION: &str = "1.0";

/// Which side of the running hash a sibling sits on during replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// `parent = H(sibling ++ running)`
    Left,
    /// `parent = H(running ++ sibling)`
    Right,
}

impl Side {
    /// Side implied by a node's position: even nodes take their sibling on the right.
    pub fn for_position(index: usize) -> Self {
        if index % 2 == 0 {
            Side::Right
        } else {
            Side::Left
        }
    }
}

/// One level of a proof path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub hash: Hash,
    #[serde(rename = "position")]
    pub side: Side,
}

impl ProofStep {
    pub fn new(hash: Hash, side: Side) -> Self {
        Self { hash, side }
    }

    /// Fold this step into the running hash.
    pub fn apply<H: MerkleHasher + ?Sized>(&self, hasher: &H, running: &Hash) -> MerkleResult<Hash> {
        match self.side {
            Side::Right => hasher.hash_pair(running, &self.hash),
            Side::Left => hasher.hash_pair(&self.hash, running),
        }
    }
}

/// Sibling path from a leaf up to (not including) the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proof {
    pub steps: Vec<ProofStep>,
}

impl Proof {
    pub fn new(steps: Vec<ProofStep>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProofStep> {
        self.steps.iter()
    }
}

impl From<Vec<ProofStep>> for Proof {
    fn from(steps: Vec<ProofStep>) -> Self {
        Self { steps }
    }
}

impl<'a> IntoIterator for &'a Proof {
    type Item = &'a ProofStep;
    type IntoIter = std::slice::Iter<'a, ProofStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// How much structure `verify_proof_with` checks before replaying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMode {
    /// Reject proofs whose sides disagree with the leaf index.
    #[default]
    Strict,
    /// Replay the embedded sides only.
    Lenient,
}

/// Depth of a tree with `leaf_count` leaves, i.e. `ceil(log2(leaf_count))`.
pub fn expected_depth(leaf_count: usize) -> usize {
    if leaf_count <= 1 {
        0
    } else {
        (usize::BITS - (leaf_count - 1).leading_zeros()) as usize
    }
}

fn out_of_range(index: usize, leaf_count: usize) -> MerkleError {
    MerkleError::IndexOutOfRange {
        index: i64::try_from(index).unwrap_or(i64::MAX),
        leaf_count,
    }
}

/// Extract the sibling path for the leaf at `index`.
pub fn generate_proof(tree: &MerkleTree, index: usize) -> MerkleResult<Proof> {
    if index >= tree.leaf_count() {
        return Err(out_of_range(index, tree.leaf_count()));
    }

    let mut steps = Vec::with_capacity(tree.depth());
    let mut node = index;

    for level in &tree.levels()[..tree.depth()] {
        let step = if node % 2 == 0 {
            // Last node of an odd level is its own sibling
            let sibling = level.get(node + 1).unwrap_or(&level[node]);
            ProofStep::new(*sibling, Side::Right)
        } else {
            ProofStep::new(level[node - 1], Side::Left)
        };

        steps.push(step);
        node /= 2;
    }

    Ok(Proof { steps })
}

/// Replay `proof` from `leaf` using the embedded sides and return the resulting root.
pub fn replay_proof<H: MerkleHasher + ?Sized>(
    hasher: &H,
    leaf: &Hash,
    proof: &Proof,
) -> MerkleResult<Hash> {
    proof
        .iter()
        .try_fold(*leaf, |running, step| step.apply(hasher, &running))
}

/// Check that `proof` has exactly the shape a leaf at `index` produces.
fn check_sides(index: usize, proof: &Proof) -> MerkleResult<()> {
    let depth = proof.len();
    let addressable = u32::try_from(depth)
        .ok()
        .and_then(|d| index.checked_shr(d))
        .unwrap_or(0);
    if addressable != 0 {
        return Err(MerkleError::MalformedProof(format!(
            "leaf index {} does not fit a proof of depth {}",
            index, depth
        )));
    }

    let mut node = index;
    for (level, step) in proof.iter().enumerate() {
        let expected = Side::for_position(node);
        if step.side != expected {
            return Err(MerkleError::MalformedProof(format!(
                "step {} has side {:?}, index {} implies {:?}",
                level, step.side, index, expected
            )));
        }
        node /= 2;
    }

    Ok(())
}

/// Verify that `leaf` at `index` is committed to by `root`, cross-checking sides.
pub fn verify_proof<H: MerkleHasher + ?Sized>(
    hasher: &H,
    leaf: &Hash,
    index: usize,
    proof: &Proof,
    root: &Hash,
) -> MerkleResult<bool> {
    verify_proof_with(hasher, leaf, index, proof, root, VerifyMode::Strict)
}

/// Verify a proof under an explicit [`VerifyMode`].
///
/// Never consults the leaf set: only the leaf hash, the path and the root.
pub fn verify_proof_with<H: MerkleHasher + ?Sized>(
    hasher: &H,
    leaf: &Hash,
    index: usize,
    proof: &Proof,
    root: &Hash,
    mode: VerifyMode,
) -> MerkleResult<bool> {
    if mode == VerifyMode::Strict {
        check_sides(index, proof)?;
    }

    let computed = replay_proof(hasher, leaf, proof)?;
    let valid = computed == *root;
    if !valid {
        debug!(index, depth = proof.len(), %computed, %root, "proof does not reach root");
    }
    Ok(valid)
}

/// A proof together with everything needed to check it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Hash of the leaf being proven
    pub leaf_hash: Hash,
    /// Root hash at time of proof generation
    pub root_hash: Hash,
    pub leaf_index: usize,
    /// Leaf count of the committed tree
    pub leaf_count: usize,
    pub proof: Proof,
}

impl InclusionProof {
    /// Verify against the bundled root, also checking the path against the
    /// tree shape implied by `leaf_count`.
    pub fn verify<H: MerkleHasher + ?Sized>(&self, hasher: &H) -> MerkleResult<bool> {
        if self.leaf_index >= self.leaf_count {
            return Err(MerkleError::MalformedProof(format!(
                "leaf index {} outside tree of {} leaves",
                self.leaf_index, self.leaf_count
            )));
        }

        let depth = expected_depth(self.leaf_count);
        if self.proof.len() != depth {
            return Err(MerkleError::MalformedProof(format!(
                "proof has {} steps, a tree of {} leaves has depth {}",
                self.proof.len(),
                self.leaf_count,
                depth
            )));
        }

        check_sides(self.leaf_index, &self.proof)?;

        let mut running = self.leaf_hash;
        let mut node = self.leaf_index;
        let mut width = self.leaf_count;

        for (level, step) in self.proof.iter().enumerate() {
            if node + 1 == width && node % 2 == 0 && step.hash != running {
                return Err(MerkleError::MalformedProof(format!(
                    "step {} must pair the unpaired last node with itself",
                    level
                )));
            }
            running = step.apply(hasher, &running)?;
            node /= 2;
            width = (width + 1) / 2;
        }

        Ok(running == self.root_hash)
    }

    /// Verify against an externally held root instead of the bundled one.
    pub fn verify_against<H: MerkleHasher + ?Sized>(
        &self,
        hasher: &H,
        root: &Hash,
    ) -> MerkleResult<bool> {
        Ok(self.root_hash == *root && self.verify(hasher)?)
    }
}

/// Versioned, self-describing proof document for transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofExport {
    /// Format version
    pub version: String,
    /// Hash algorithm used
    pub algorithm: String,
    /// Export timestamp (RFC 3339)
    pub exported_at: String,
    pub leaf_hash: Hash,
    pub root_hash: Hash,
    pub leaf_index: usize,
    pub leaf_count: usize,
    /// Audit path from leaf to root
    pub audit_path: Vec<ProofStep>,
}

impl ProofExport {
    pub fn new(proof: &InclusionProof, algorithm: &str) -> Self {
        Self {
            version: PROOF_FORMAT_VERSION.to_string(),
            algorithm: algorithm.to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            leaf_hash: proof.leaf_hash,
            root_hash: proof.root_hash,
            leaf_index: proof.leaf_index,
            leaf_count: proof.leaf_count,
            audit_path: proof.proof.steps.clone(),
        }
    }

    /// Serialize to JSON for export.
    pub fn to_json(&self) -> MerkleResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> MerkleResult<Self> {
        let export: Self = serde_json::from_str(json)?;
        if export.version != PROOF_FORMAT_VERSION {
            return Err(MerkleError::MalformedProof(format!(
                "unsupported proof format version {}",
                export.version
            )));
        }
        Ok(export)
    }

    pub fn into_inclusion_proof(self) -> InclusionProof {
        InclusionProof {
            leaf_hash: self.leaf_hash,
            root_hash: self.root_hash,
            leaf_index: self.leaf_index,
            leaf_count: self.leaf_count,
            proof: Proof::new(self.audit_path),
        }
    }
}
