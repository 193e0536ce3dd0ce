use std::sync::Arc;

use super::node::{IntervalTreeNode, MerkleNode};
use super::tree::{compute_root_from_proof, InclusionProof, MerkleTree};
use super::MerkleError;
use crate::crypto::hash::Hasher;
use crate::types::{Range, H256, U256};

pub type IntervalTree = MerkleTree<IntervalTreeNode>;

pub type IntervalTreeInclusionProof = InclusionProof<IntervalTreeNode>;

impl MerkleTree<IntervalTreeNode> {
    /// Leaves whose implicit range `[start_i, start_{i+1})` intersects `[start, end)`
    pub fn get_leaves(&self, start: U256, end: U256) -> Vec<(usize, IntervalTreeNode)> {
        let leaves = self.leaves();
        leaves
            .iter()
            .enumerate()
            .filter(|(index, leaf)| {
                let implicit_end = leaves.get(index + 1).map(|next| next.start).unwrap_or_else(IntervalTreeNode::max_key);
                leaf.start.max(start) < implicit_end.min(end)
            })
            .map(|(index, leaf)| (index, *leaf))
            .collect()
    }
}

/// Verifies single-layer interval tree proofs
pub struct IntervalTreeVerifier {
    hasher: Arc<dyn Hasher>,
}

impl IntervalTreeVerifier {
    pub fn new(hasher: Arc<dyn Hasher>) -> Self {
        Self { hasher }
    }

    /// Check that `leaf` is committed under `root` and owns `required`.
    ///
    /// A proof for a different root yields `Ok(false)`; a proof no sorted tree
    /// could produce, or a required range beyond the leaf's implicit range, is
    /// an error.
    pub fn verify_inclusion(
        &self,
        leaf: &IntervalTreeNode,
        required: &Range,
        root: &H256,
        proof: &IntervalTreeInclusionProof,
    ) -> Result<bool, MerkleError> {
        if leaf.start != proof.leaf_index {
            return Ok(false);
        }
        let computed = match compute_root_from_proof(self.hasher.as_ref(), leaf, proof)? {
            Some(computed) => computed,
            None => return Ok(false),
        };
        if required.start < leaf.start || required.end > computed.implicit_end {
            return Err(MerkleError::ExceedsImplicitRange);
        }
        Ok(computed.root.data == *root)
    }
}
