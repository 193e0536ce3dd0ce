use std::sync::Arc;

use super::node::AddressTreeNode;
use super::tree::{compute_root_from_proof, InclusionProof, MerkleTree};
use super::MerkleError;
use crate::crypto::hash::Hasher;
use crate::types::{Address, H256};

pub type AddressTree = MerkleTree<AddressTreeNode>;

pub type AddressTreeInclusionProof = InclusionProof<AddressTreeNode>;

impl MerkleTree<AddressTreeNode> {
    /// Position of the leaf for `address`
    pub fn position_of(&self, address: &Address) -> Option<usize> {
        self.leaves().binary_search_by(|leaf| leaf.address.cmp(address)).ok()
    }
}

/// Verifies single-layer address tree proofs
pub struct AddressTreeVerifier {
    hasher: Arc<dyn Hasher>,
}

impl AddressTreeVerifier {
    pub fn new(hasher: Arc<dyn Hasher>) -> Self {
        Self { hasher }
    }

    pub fn verify_inclusion(
        &self,
        leaf: &AddressTreeNode,
        root: &H256,
        proof: &AddressTreeInclusionProof,
    ) -> Result<bool, MerkleError> {
        if leaf.address != proof.leaf_index {
            return Ok(false);
        }
        Ok(compute_root_from_proof(self.hasher.as_ref(), leaf, proof)?
            .map(|computed| computed.root.data == *root)
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::Keccak256Hasher;
    use crate::merkle::node::MerkleNode;

    fn hasher() -> Arc<dyn Hasher> {
        Arc::new(Keccak256Hasher)
    }

    fn leaves() -> Vec<AddressTreeNode> {
        (1..=3u64)
            .map(|i| AddressTreeNode::new(Address::from_low_u64_be(i), hasher().hash(format!("leaf{}", i - 1).as_bytes())))
            .collect()
    }

    #[test]
    fn test_position_of() {
        let tree = AddressTree::new(leaves(), hasher()).unwrap();
        assert_eq!(tree.position_of(&Address::from_low_u64_be(2)), Some(1));
        assert_eq!(tree.position_of(&Address::from_low_u64_be(9)), None);
    }

    #[test]
    fn test_verify_every_leaf() {
        let leaves = leaves();
        let tree = AddressTree::new(leaves.clone(), hasher()).unwrap();
        let verifier = AddressTreeVerifier::new(hasher());

        for (index, leaf) in leaves.iter().enumerate() {
            let proof = tree.get_inclusion_proof(index).unwrap();
            assert!(verifier.verify_inclusion(leaf, &tree.get_root(), &proof).unwrap());
        }

        // proof for one address does not vouch for another
        let proof = tree.get_inclusion_proof(0).unwrap();
        assert!(!verifier.verify_inclusion(&leaves[1], &tree.get_root(), &proof).unwrap());
    }

    #[test]
    fn test_unsorted_addresses_are_rejected() {
        let mut leaves = leaves();
        leaves.swap(0, 2);
        assert!(matches!(AddressTree::new(leaves, hasher()), Err(MerkleError::InvalidOrderedLeaves)));
    }
}
