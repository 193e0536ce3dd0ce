use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::state_update::StateUpdate;
use crate::codec::{Codable, CodecError, Coder, Encodable, Kind};
use crate::crypto::Hasher;
use crate::merkle::{
    DoubleLayerInclusionProof, DoubleLayerTree, DoubleLayerTreeLeaf, DoubleLayerTreeVerifier, MerkleError,
};
use crate::types::{Address, H256, U256};

/// Plasma block: the state updates committed at one block number, grouped by token
pub struct Block {
    /// Block number
    pub block_number: U256,

    /// State updates per deposit contract, each list sorted by range start
    state_updates_map: BTreeMap<Address, Vec<StateUpdate>>,

    /// Commitment tree, built on first use
    tree: OnceCell<DoubleLayerTree>,
}

impl Block {
    pub fn new(block_number: U256, mut state_updates_map: BTreeMap<Address, Vec<StateUpdate>>) -> Self {
        state_updates_map.retain(|_, updates| !updates.is_empty());
        for updates in state_updates_map.values_mut() {
            updates.sort_by(|a, b| a.range.start.cmp(&b.range.start));
        }
        Self { block_number, state_updates_map, tree: OnceCell::new() }
    }

    pub fn state_updates_map(&self) -> &BTreeMap<Address, Vec<StateUpdate>> {
        &self.state_updates_map
    }

    /// State updates of one token
    pub fn state_updates(&self, token: &Address) -> &[StateUpdate] {
        self.state_updates_map.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Address> {
        self.state_updates_map.keys()
    }

    /// Total number of state updates
    pub fn len(&self) -> usize {
        self.state_updates_map.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Leaves of the commitment tree in (token, start) order
    pub fn leaves(&self, coder: &dyn Coder, hasher: &dyn Hasher) -> Vec<DoubleLayerTreeLeaf> {
        self.state_updates_map
            .iter()
            .flat_map(|(token, updates)| {
                updates
                    .iter()
                    .map(move |su| DoubleLayerTreeLeaf::new(*token, su.range.start, su.leaf_hash(coder, hasher)))
            })
            .collect()
    }

    /// The commitment tree; built once and reused
    pub fn get_tree(&self, coder: &dyn Coder, hasher: Arc<dyn Hasher>) -> Result<&DoubleLayerTree, MerkleError> {
        self.tree.get_or_try_init(|| DoubleLayerTree::new(self.leaves(coder, hasher.as_ref()), hasher.clone()))
    }

    pub fn get_root(&self, coder: &dyn Coder, hasher: Arc<dyn Hasher>) -> Result<H256, MerkleError> {
        Ok(self.get_tree(coder, hasher)?.get_root())
    }

    /// Inclusion proof of `state_update`, or `None` when it is not part of this block
    pub fn get_inclusion_proof(
        &self,
        state_update: &StateUpdate,
        coder: &dyn Coder,
        hasher: Arc<dyn Hasher>,
    ) -> Result<Option<DoubleLayerInclusionProof>, MerkleError> {
        let token = state_update.deposit_contract_address;
        let index = match self.state_updates(&token).iter().position(|su| su == state_update) {
            Some(index) => index,
            None => return Ok(None),
        };
        let tree = self.get_tree(coder, hasher)?;
        tree.get_inclusion_proof_by_address_and_index(&token, index).map(Some)
    }

    /// Verify that `state_update` is committed under this block's root
    pub fn verify_inclusion(
        &self,
        state_update: &StateUpdate,
        proof: &DoubleLayerInclusionProof,
        coder: &dyn Coder,
        hasher: Arc<dyn Hasher>,
    ) -> Result<bool, MerkleError> {
        let root = self.get_root(coder, hasher.clone())?;
        let leaf = DoubleLayerTreeLeaf::new(
            state_update.deposit_contract_address,
            state_update.range.start,
            state_update.leaf_hash(coder, hasher.as_ref()),
        );
        DoubleLayerTreeVerifier::new(hasher).verify_inclusion(&leaf, &state_update.range, &root, proof)
    }
}

impl Clone for Block {
    fn clone(&self) -> Self {
        Self {
            block_number: self.block_number,
            state_updates_map: self.state_updates_map.clone(),
            tree: OnceCell::new(),
        }
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.block_number == other.block_number && self.state_updates_map == other.state_updates_map
    }
}

impl Eq for Block {}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("block_number", &self.block_number)
            .field("state_updates_map", &self.state_updates_map)
            .finish()
    }
}

impl Encodable for Block {
    fn kind() -> Kind {
        Kind::structure(&[
            ("blockNumber", Kind::BigNumber),
            ("stateUpdatesMap", Kind::list(Kind::Tuple(vec![Kind::Address, Kind::list(StateUpdate::kind())]))),
        ])
    }

    fn to_codable(&self) -> Codable {
        let entries = self
            .state_updates_map
            .iter()
            .map(|(token, updates)| {
                Codable::Tuple(vec![
                    Codable::Address(*token),
                    Codable::List(updates.iter().map(StateUpdate::to_codable).collect()),
                ])
            })
            .collect();
        Codable::structure(vec![
            ("blockNumber", Codable::BigNumber(self.block_number)),
            ("stateUpdatesMap", Codable::List(entries)),
        ])
    }

    fn from_codable(value: Codable) -> Result<Self, CodecError> {
        let mut fields = value.into_fields(2)?;
        let block_number = fields.next_big_number()?;
        let mut state_updates_map = BTreeMap::new();
        for entry in fields.next_list()? {
            let mut items = entry.into_tuple()?.into_iter();
            let (token, updates) = match (items.next(), items.next(), items.next()) {
                (Some(token), Some(updates), None) => (token.into_address()?, updates.into_list()?),
                _ => return Err(CodecError::InvalidValue("state updates entry must be a pair".to_string())),
            };
            let updates = updates.into_iter().map(StateUpdate::from_codable).collect::<Result<Vec<_>, _>>()?;
            state_updates_map.insert(token, updates);
        }
        Ok(Block::new(block_number, state_updates_map))
    }
}
