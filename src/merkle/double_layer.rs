use std::sync::Arc;

use super::address_tree::{AddressTree, AddressTreeInclusionProof};
use super::interval_tree::{IntervalTree, IntervalTreeInclusionProof};
use super::node::{hash_from_slice, AddressTreeNode, IntervalTreeNode, MerkleNode};
use super::tree::compute_root_from_proof;
use super::MerkleError;
use crate::codec::{Codable, CodecError, Encodable, Kind};
use crate::crypto::hash::Hasher;
use crate::types::{Address, Range, H256, U256};

/// Commitment to one coin range of one token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoubleLayerTreeLeaf {
    pub address: Address,
    pub start: U256,
    pub data: H256,
}

impl DoubleLayerTreeLeaf {
    pub fn new(address: Address, start: U256, data: H256) -> Self {
        Self { address, start, data }
    }

    pub fn from_slice(address: Address, start: U256, data: &[u8]) -> Result<Self, MerkleError> {
        Ok(Self { address, start, data: hash_from_slice(data)? })
    }

    fn interval_node(&self) -> IntervalTreeNode {
        IntervalTreeNode::new(self.start, self.data)
    }
}

/// Interval proof within the token's tree plus the token's address proof
#[derive(Debug, Clone, PartialEq)]
pub struct DoubleLayerInclusionProof {
    pub interval_inclusion_proof: IntervalTreeInclusionProof,
    pub address_inclusion_proof: AddressTreeInclusionProof,
}

impl Encodable for DoubleLayerInclusionProof {
    fn kind() -> Kind {
        Kind::structure(&[
            ("intervalInclusionProof", IntervalTreeInclusionProof::kind()),
            ("addressInclusionProof", AddressTreeInclusionProof::kind()),
        ])
    }

    fn to_codable(&self) -> Codable {
        Codable::structure(vec![
            ("intervalInclusionProof", self.interval_inclusion_proof.to_codable()),
            ("addressInclusionProof", self.address_inclusion_proof.to_codable()),
        ])
    }

    fn from_codable(value: Codable) -> Result<Self, CodecError> {
        let mut fields = value.into_fields(2)?;
        Ok(Self {
            interval_inclusion_proof: fields.next_decoded()?,
            address_inclusion_proof: fields.next_decoded()?,
        })
    }
}

/// Per-address interval trees joined by an address tree
pub struct DoubleLayerTree {
    /// One interval tree per address, sorted by address
    interval_trees: Vec<(Address, IntervalTree)>,
    address_tree: AddressTree,
}

impl DoubleLayerTree {
    /// Build from leaves sorted by `(address, start)`
    pub fn new(leaves: Vec<DoubleLayerTreeLeaf>, hasher: Arc<dyn Hasher>) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyTree);
        }
        let ordered = leaves
            .windows(2)
            .all(|pair| (pair[0].address, pair[0].start) < (pair[1].address, pair[1].start));
        if !ordered {
            return Err(MerkleError::InvalidOrderedLeaves);
        }

        let mut groups: Vec<(Address, Vec<IntervalTreeNode>)> = Vec::new();
        for leaf in &leaves {
            match groups.last_mut() {
                Some((address, nodes)) if *address == leaf.address => nodes.push(leaf.interval_node()),
                _ => groups.push((leaf.address, vec![leaf.interval_node()])),
            }
        }

        let mut interval_trees = Vec::with_capacity(groups.len());
        let mut address_leaves = Vec::with_capacity(groups.len());
        for (address, nodes) in groups {
            let tree = IntervalTree::new(nodes, hasher.clone())?;
            address_leaves.push(AddressTreeNode::new(address, tree.get_root()));
            interval_trees.push((address, tree));
        }
        let address_tree = AddressTree::new(address_leaves, hasher)?;

        Ok(Self { interval_trees, address_tree })
    }

    pub fn get_root(&self) -> H256 {
        self.address_tree.get_root()
    }

    pub fn get_interval_tree(&self, address: &Address) -> Option<&IntervalTree> {
        self.address_tree.position_of(address).map(|position| &self.interval_trees[position].1)
    }

    pub fn get_inclusion_proof_by_address_and_index(
        &self,
        address: &Address,
        index: usize,
    ) -> Result<DoubleLayerInclusionProof, MerkleError> {
        let position = self.address_tree.position_of(address).ok_or(MerkleError::UnknownAddress(*address))?;
        let interval_inclusion_proof = self.interval_trees[position].1.get_inclusion_proof(index)?;
        let address_inclusion_proof = self.address_tree.get_inclusion_proof(position)?;
        Ok(DoubleLayerInclusionProof { interval_inclusion_proof, address_inclusion_proof })
    }

    /// Locate a leaf by its data, returning its address and index within that address
    pub fn find_index(&self, data: &H256) -> Option<(Address, usize)> {
        self.interval_trees
            .iter()
            .find_map(|(address, tree)| tree.find_index(data).map(|index| (*address, index)))
    }

    /// Leaves of `address` whose implicit range intersects `[start, end)`
    pub fn get_leaves(&self, address: &Address, start: U256, end: U256) -> Vec<DoubleLayerTreeLeaf> {
        self.get_interval_tree(address)
            .map(|tree| {
                tree.get_leaves(start, end)
                    .into_iter()
                    .map(|(_, node)| DoubleLayerTreeLeaf::new(*address, node.start, node.data))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Verifies proofs against a double-layer root
pub struct DoubleLayerTreeVerifier {
    hasher: Arc<dyn Hasher>,
}

impl DoubleLayerTreeVerifier {
    pub fn new(hasher: Arc<dyn Hasher>) -> Self {
        Self { hasher }
    }

    /// Check that `leaf` is committed under `root` and owns `required`.
    ///
    /// `Ok(false)` means the proof does not lead to `root`. Errors mean the
    /// proof is structurally impossible (`IntersectionDetected`) or the
    /// required range is not owned by the leaf (`ExceedsImplicitRange`).
    pub fn verify_inclusion(
        &self,
        leaf: &DoubleLayerTreeLeaf,
        required: &Range,
        root: &H256,
        proof: &DoubleLayerInclusionProof,
    ) -> Result<bool, MerkleError> {
        if leaf.address != proof.address_inclusion_proof.leaf_index
            || leaf.start != proof.interval_inclusion_proof.leaf_index
        {
            return Ok(false);
        }

        let interval =
            match compute_root_from_proof(self.hasher.as_ref(), &leaf.interval_node(), &proof.interval_inclusion_proof)? {
                Some(computed) => computed,
                None => return Ok(false),
            };
        if required.start < leaf.start || required.end > interval.implicit_end {
            return Err(MerkleError::ExceedsImplicitRange);
        }

        let address_leaf = AddressTreeNode::new(leaf.address, interval.root.data);
        let address = match compute_root_from_proof(self.hasher.as_ref(), &address_leaf, &proof.address_inclusion_proof)? {
            Some(computed) => computed,
            None => return Ok(false),
        };
        Ok(address.root.data == *root)
    }
}
