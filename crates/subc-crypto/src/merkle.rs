//! # Sorted-Pair Merkle Commitments
//!
//! A binary Merkle tree over plan or discount leaves, with inclusion proofs
//! the on-chain verifier can check without a left/right flag.
//!
//! ## Algorithm
//!
//! - Plan leaf: `keccak256(encode_plan(record))`.
//! - Discount leaf: `keccak256(discountId || encode_discount(record))`.
//! - Node: `keccak256(min(a, b) || max(a, b))`, bytes compared
//!   lexicographically.
//!
//! Leaves are sorted and de-duplicated before the tree is built, so the root
//! and every proof depend only on the leaf *set*. A node left without a
//! partner at any level is paired with itself; a one-leaf tree therefore
//! has root `node(leaf, leaf)` and proof `[leaf]`.
//!
//! The empty set commits to the all-zero root.
//!
//! ## Compatibility
//!
//! The hash function and the byte-wise pair ordering must match the
//! verifier exactly. A mismatch does not fail loudly: every proof simply
//! stops verifying. `tests/sorted_pair_vectors.rs` pins both.

use subc_core::{
    encode_discount, encode_plan, Bytes32, CodecError, CommitmentError, DiscountId,
    DiscountRecord, PlanRecord,
};

use crate::keccak::{keccak256, keccak256_concat};

/// The reserved root of an empty commitment.
pub const EMPTY_ROOT: Bytes32 = Bytes32([0u8; 32]);

/// An inclusion proof: sibling hashes from leaf level up to the root.
pub type MerkleProof = Vec<Bytes32>;

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Hash two nodes in sorted order.
pub fn hash_pair(a: &Bytes32, b: &Bytes32) -> Bytes32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    Bytes32(keccak256_concat(&[lo.as_bytes(), hi.as_bytes()]))
}

/// Leaf hash of a plan record.
pub fn plan_leaf(plan: &PlanRecord) -> Result<Bytes32, CodecError> {
    Ok(Bytes32(keccak256(&encode_plan(plan)?)))
}

/// Leaf hash of a discount record under its identity.
pub fn discount_leaf(id: &DiscountId, discount: &DiscountRecord) -> Result<Bytes32, CodecError> {
    let encoded = encode_discount(discount)?;
    Ok(Bytes32(keccak256_concat(&[id.as_bytes(), &encoded])))
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// A fully materialized sorted-pair Merkle tree.
///
/// `layers[0]` holds the sorted, de-duplicated leaves; the last layer holds
/// the root alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    layers: Vec<Vec<Bytes32>>,
}

impl MerkleTree {
    /// Build a tree over `leaves` in any order.
    pub fn new(leaves: impl IntoIterator<Item = Bytes32>) -> Self {
        let mut level: Vec<Bytes32> = leaves.into_iter().collect();
        level.sort_unstable();
        level.dedup();

        if level.is_empty() {
            return Self { layers: Vec::new() };
        }

        let mut layers = vec![level];
        loop {
            let current = &layers[layers.len() - 1];
            if current.len() == 1 && layers.len() > 1 {
                break;
            }
            let next: Vec<Bytes32> = current
                .chunks(2)
                .map(|pair| hash_pair(&pair[0], &pair[pair.len() - 1]))
                .collect();
            layers.push(next);
        }
        Self { layers }
    }

    /// The root, or [`EMPTY_ROOT`] for an empty tree.
    pub fn root(&self) -> Bytes32 {
        self.layers
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or(EMPTY_ROOT)
    }

    /// Number of distinct leaves.
    pub fn len(&self) -> usize {
        self.layers.first().map_or(0, Vec::len)
    }

    /// True when the tree commits to nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of hashing levels between leaves and root.
    pub fn depth(&self) -> usize {
        self.layers.len().saturating_sub(1)
    }

    /// The sorted leaves.
    pub fn leaves(&self) -> &[Bytes32] {
        self.layers.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `leaf` is committed by this tree.
    pub fn contains(&self, leaf: &Bytes32) -> bool {
        self.leaves().binary_search(leaf).is_ok()
    }

    /// Inclusion proof for `leaf`.
    pub fn proof(&self, leaf: &Bytes32) -> Result<MerkleProof, CommitmentError> {
        let mut index = self
            .leaves()
            .binary_search(leaf)
            .map_err(|_| CommitmentError::LeafNotFound {
                leaf: leaf.to_hex(),
            })?;

        let mut proof = Vec::with_capacity(self.depth());
        for layer in &self.layers[..self.depth()] {
            let sibling = layer.get(index ^ 1).unwrap_or(&layer[index]);
            proof.push(*sibling);
            index /= 2;
        }
        Ok(proof)
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Root over `leaves` in any order.
pub fn root(leaves: &[Bytes32]) -> Bytes32 {
    MerkleTree::new(leaves.iter().copied()).root()
}

/// Inclusion proof for `leaf` in the tree over `leaves`.
pub fn proof(leaves: &[Bytes32], leaf: &Bytes32) -> Result<MerkleProof, CommitmentError> {
    MerkleTree::new(leaves.iter().copied()).proof(leaf)
}

/// Recompute the root from `leaf` and `proof` and compare with `root`.
///
/// Pure: makes no assumption about tree shape beyond the proof length.
pub fn verify(leaf: &Bytes32, proof: &[Bytes32], root: &Bytes32) -> bool {
    let computed = proof
        .iter()
        .fold(*leaf, |acc, sibling| hash_pair(&acc, sibling));
    computed == *root
}
