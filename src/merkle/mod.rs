//! Interval and address keyed Merkle trees used for block commitments

pub mod address_tree;
pub mod double_layer;
pub mod interval_tree;
pub mod node;
pub mod tree;

use thiserror::Error;

use crate::types::Address;

pub use address_tree::{AddressTree, AddressTreeInclusionProof, AddressTreeVerifier};
pub use double_layer::{DoubleLayerInclusionProof, DoubleLayerTree, DoubleLayerTreeLeaf, DoubleLayerTreeVerifier};
pub use interval_tree::{IntervalTree, IntervalTreeInclusionProof, IntervalTreeVerifier};
pub use node::{AddressTreeNode, IntervalTreeNode, MerkleNode};
pub use tree::{compute_parent, compute_root_from_proof, ComputedRoot, InclusionProof, MerkleTree};

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("cannot build a tree without leaves")]
    EmptyTree,

    #[error("data length is not 32 bytes (got {0})")]
    InvalidDataLength(usize),

    #[error("leaves must be sorted by strictly ascending key")]
    InvalidOrderedLeaves,

    #[error("left node key must be lower than right node key")]
    InvalidParentOrder,

    #[error("sibling intersects the running node")]
    IntersectionDetected,

    #[error("required range must not exceed the implicit range")]
    ExceedsImplicitRange,

    #[error("leaf index {index} out of bounds for {len} leaves")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("no interval tree for address {0:?}")]
    UnknownAddress(Address),
}
