use std::sync::Arc;

use super::node::MerkleNode;
use super::MerkleError;
use crate::codec::{Codable, CodecError, Encodable, Kind};
use crate::crypto::hash::Hasher;
use crate::types::H256;

/// Sibling path from a leaf to the root, bottom to top
#[derive(Clone, Debug, PartialEq)]
pub struct InclusionProof<N: MerkleNode> {
    /// The leaf's own interval key
    pub leaf_index: N::Key,
    /// The leaf's position among all leaves; bit `i` set means the running
    /// node is the right child at level `i`
    pub leaf_position: u64,
    pub siblings: Vec<N>,
}

/// Binary Merkle tree over leaves sorted by interval key
pub struct MerkleTree<N: MerkleNode> {
    levels: Vec<Vec<N>>,
    hasher: Arc<dyn Hasher>,
}

/// Combine two adjacent nodes; the parent takes the left key
pub fn compute_parent<N: MerkleNode>(hasher: &dyn Hasher, left: &N, right: &N) -> Result<N, MerkleError> {
    if left.key() >= right.key() {
        return Err(MerkleError::InvalidParentOrder);
    }
    Ok(hash_pair(hasher, left, right))
}

fn hash_pair<N: MerkleNode>(hasher: &dyn Hasher, left: &N, right: &N) -> N {
    let mut buffer = left.encode();
    buffer.extend_from_slice(&right.encode());
    N::new(left.key(), hasher.hash(&buffer))
}

impl<N: MerkleNode> MerkleTree<N> {
    /// Build a tree from leaves that are already sorted by key.
    ///
    /// Leaves are never reordered here: unsorted input is a caller bug and is
    /// rejected.
    pub fn new(leaves: Vec<N>, hasher: Arc<dyn Hasher>) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyTree);
        }
        if leaves.windows(2).any(|pair| pair[0].key() >= pair[1].key()) {
            return Err(MerkleError::InvalidOrderedLeaves);
        }

        let empty = N::empty(hasher.as_ref());
        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let parents = level
                .chunks(2)
                .map(|pair| compute_parent(hasher.as_ref(), &pair[0], pair.get(1).unwrap_or(&empty)))
                .collect::<Result<Vec<_>, _>>()?;
            levels.push(parents);
        }

        Ok(Self { levels, hasher })
    }

    pub fn get_root(&self) -> H256 {
        self.root_node().data()
    }

    pub fn root_node(&self) -> &N {
        // construction guarantees a single node on the top level
        &self.levels[self.levels.len() - 1][0]
    }

    pub fn leaves(&self) -> &[N] {
        &self.levels[0]
    }

    pub fn get_leaf(&self, index: usize) -> Option<&N> {
        self.levels[0].get(index)
    }

    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Position of the first leaf carrying `data`
    pub fn find_index(&self, data: &H256) -> Option<usize> {
        self.levels[0].iter().position(|leaf| leaf.data() == *data)
    }

    pub fn get_inclusion_proof(&self, index: usize) -> Result<InclusionProof<N>, MerkleError> {
        let leaf = self.get_leaf(index).ok_or(MerkleError::IndexOutOfBounds { index, len: self.leaves().len() })?;

        let mut siblings = Vec::with_capacity(self.depth());
        let mut position = index;
        for level in &self.levels[..self.depth()] {
            let sibling = level.get(position ^ 1).cloned().unwrap_or_else(|| N::empty(self.hasher.as_ref()));
            siblings.push(sibling);
            position >>= 1;
        }

        Ok(InclusionProof { leaf_index: leaf.key(), leaf_position: index as u64, siblings })
    }
}

/// Root recomputed from a proof, with the upper bound of the leaf's interval
pub struct ComputedRoot<N: MerkleNode> {
    pub root: N,
    pub implicit_end: N::Key,
}

/// Walk a proof from `leaf` up to the root.
///
/// Returns `Ok(None)` when the position does not fit the proof depth, and
/// `IntersectionDetected` when a sibling is on the wrong side of the running
/// node, which no well-formed tree can produce.
pub fn compute_root_from_proof<N: MerkleNode>(
    hasher: &dyn Hasher,
    leaf: &N,
    proof: &InclusionProof<N>,
) -> Result<Option<ComputedRoot<N>>, MerkleError> {
    let depth = proof.siblings.len();
    if depth < 64 && proof.leaf_position >> depth != 0 {
        return Ok(None);
    }

    let mut current = leaf.clone();
    let mut implicit_end = None;
    for (level, sibling) in proof.siblings.iter().enumerate() {
        let is_right_child = level < 64 && (proof.leaf_position >> level) & 1 == 1;
        current = if is_right_child {
            if sibling.key() >= current.key() {
                return Err(MerkleError::IntersectionDetected);
            }
            hash_pair(hasher, sibling, &current)
        } else {
            if current.key() >= sibling.key() {
                return Err(MerkleError::IntersectionDetected);
            }
            implicit_end.get_or_insert(sibling.key());
            hash_pair(hasher, &current, sibling)
        };
    }

    Ok(Some(ComputedRoot { root: current, implicit_end: implicit_end.unwrap_or_else(N::max_key) }))
}

impl<N> Encodable for InclusionProof<N>
where
    N: MerkleNode + Encodable,
    N::Key: Encodable,
{
    fn kind() -> Kind {
        Kind::structure(&[
            ("leafIndex", N::Key::kind()),
            ("leafPosition", Kind::Integer),
            ("siblings", Kind::list(N::kind())),
        ])
    }

    fn to_codable(&self) -> Codable {
        Codable::structure(vec![
            ("leafIndex", self.leaf_index.to_codable()),
            ("leafPosition", Codable::Integer(self.leaf_position as i64)),
            ("siblings", Codable::List(self.siblings.iter().map(Encodable::to_codable).collect())),
        ])
    }

    fn from_codable(value: Codable) -> Result<Self, CodecError> {
        let mut fields = value.into_fields(3)?;
        let leaf_index = fields.next_decoded::<N::Key>()?;
        let position = fields.next_integer()?;
        let leaf_position =
            u64::try_from(position).map_err(|_| CodecError::InvalidValue(format!("negative leaf position {}", position)))?;
        let siblings = fields.next_decoded::<Vec<N>>()?;
        Ok(Self { leaf_index, leaf_position, siblings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::Keccak256Hasher;
    use crate::merkle::node::IntervalTreeNode;
    use crate::types::U256;

    fn node(start: u64, byte: u8) -> IntervalTreeNode {
        IntervalTreeNode::new(U256::from(start), H256::repeat_byte(byte))
    }

    fn tree(starts: &[u64]) -> MerkleTree<IntervalTreeNode> {
        let leaves = starts.iter().enumerate().map(|(i, s)| node(*s, i as u8 + 1)).collect();
        MerkleTree::new(leaves, Arc::new(Keccak256Hasher)).unwrap()
    }

    #[test]
    fn test_parent_takes_left_key() {
        let hasher = Keccak256Hasher;
        let parent = compute_parent(&hasher, &node(3, 1), &node(9, 2)).unwrap();
        assert_eq!(parent.start, U256::from(3));

        let mut buffer = node(3, 1).encode();
        buffer.extend_from_slice(&node(9, 2).encode());
        assert_eq!(parent.data, hasher.hash(&buffer));
    }

    #[test]
    fn test_parent_rejects_misordered_children() {
        let hasher = Keccak256Hasher;
        assert!(matches!(compute_parent(&hasher, &node(9, 1), &node(3, 2)), Err(MerkleError::InvalidParentOrder)));
        assert!(matches!(compute_parent(&hasher, &node(3, 1), &node(3, 2)), Err(MerkleError::InvalidParentOrder)));
    }

    #[test]
    fn test_construction_preconditions() {
        let hasher: Arc<dyn Hasher> = Arc::new(Keccak256Hasher);
        assert!(matches!(MerkleTree::<IntervalTreeNode>::new(vec![], hasher.clone()), Err(MerkleError::EmptyTree)));
        assert!(matches!(
            MerkleTree::new(vec![node(0, 1), node(7, 2), node(5, 3)], hasher),
            Err(MerkleError::InvalidOrderedLeaves)
        ));
    }

    #[test]
    fn test_single_leaf_tree() {
        let tree = tree(&[4]);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.get_root(), H256::repeat_byte(1));

        let proof = tree.get_inclusion_proof(0).unwrap();
        assert!(proof.siblings.is_empty());
        let computed = compute_root_from_proof(&Keccak256Hasher, &node(4, 1), &proof).unwrap().unwrap();
        assert_eq!(computed.root.data, tree.get_root());
        assert_eq!(computed.implicit_end, U256::MAX);
    }

    #[test]
    fn test_proofs_recompute_root_for_every_leaf() {
        for size in 1..=9u64 {
            let starts: Vec<u64> = (0..size).map(|i| i * 10).collect();
            let tree = tree(&starts);
            for (index, leaf) in tree.leaves().iter().enumerate() {
                let proof = tree.get_inclusion_proof(index).unwrap();
                assert_eq!(proof.siblings.len(), tree.depth());
                let computed = compute_root_from_proof(&Keccak256Hasher, leaf, &proof).unwrap().unwrap();
                assert_eq!(computed.root.data, tree.get_root(), "size {} index {}", size, index);

                let expected_end = starts.get(index + 1).map(|s| U256::from(*s)).unwrap_or(U256::MAX);
                assert_eq!(computed.implicit_end, expected_end);
            }
        }
    }

    #[test]
    fn test_out_of_bounds_proof() {
        let tree = tree(&[0, 1]);
        assert!(matches!(tree.get_inclusion_proof(2), Err(MerkleError::IndexOutOfBounds { index: 2, len: 2 })));
    }

    #[test]
    fn test_position_beyond_depth_is_rejected() {
        let tree = tree(&[0, 10, 20]);
        let mut proof = tree.get_inclusion_proof(1).unwrap();
        proof.leaf_position |= 1 << proof.siblings.len();
        assert!(compute_root_from_proof(&Keccak256Hasher, &node(10, 2), &proof).unwrap().is_none());
    }

    #[test]
    fn test_flipped_side_is_an_intersection() {
        let tree = tree(&[0, 10, 20, 30]);
        let mut proof = tree.get_inclusion_proof(1).unwrap();
        // claim leaf 1 is a left child: its left sibling now sits on the right
        proof.leaf_position = 0;
        let result = compute_root_from_proof(&Keccak256Hasher, &node(10, 2), &proof);
        assert!(matches!(result, Err(MerkleError::IntersectionDetected)));
    }

    #[test]
    fn test_find_index() {
        let tree = tree(&[0, 10, 20]);
        assert_eq!(tree.find_index(&H256::repeat_byte(3)), Some(2));
        assert_eq!(tree.find_index(&H256::repeat_byte(9)), None);
    }
}
