use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::codec::{decode, encode, CodecError, Coder};
use crate::crypto::Hasher;
use crate::merkle::{DoubleLayerInclusionProof, MerkleError};
use crate::plasma::{Block, StateUpdate};
use crate::storage::{Bucket, KVStoreError, RangeStore, RangeStoreError, Schema};
use crate::types::{u256_from_be_bytes, u256_to_be_bytes, Address, U256};

/// Error type for BlockManager operations
#[derive(Debug, thiserror::Error)]
pub enum BlockManagerError {
    /// KVStore error
    #[error("KVStore error: {0}")]
    KVStoreError(#[from] KVStoreError),

    /// RangeStore error
    #[error("Range store error: {0}")]
    RangeStoreError(#[from] RangeStoreError),

    /// Codec error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Commitment tree error
    #[error("Merkle error: {0}")]
    Merkle(#[from] MerkleError),

    /// A pending StateUpdate must target the block after the current one
    #[error("State update targets block {actual}, expected {expected}")]
    UnexpectedBlockNumber { expected: U256, actual: U256 },

    /// The StateUpdate's deposit contract was never registered
    #[error("Unknown token: {0:?}")]
    UnknownToken(Address),

    /// The stored block counter could not be decoded
    #[error("Corrupt block number: {0}")]
    CorruptBlockNumber(String),

    /// The assembly mutex was poisoned by a panicking writer
    #[error("Block manager lock poisoned")]
    LockPoisoned,
}

/// Collects pending StateUpdates per token and seals them into blocks
pub struct BlockManager {
    /// Sealed blocks by number
    blocks: Bucket,

    /// Pending StateUpdates, by block number then token
    pending: RangeStore,

    /// Registered tokens
    tokens: Bucket,

    /// Committed block counter
    meta: Bucket,

    /// Serialises enqueueing against block generation
    assembly: Mutex<()>,

    coder: Arc<dyn Coder>,
    hasher: Arc<dyn Hasher>,
}

impl BlockManager {
    /// Create a BlockManager over the root namespace `db`
    pub fn new(db: &RangeStore, coder: Arc<dyn Coder>, hasher: Arc<dyn Hasher>) -> Self {
        Self {
            blocks: db.bucket(Schema::BLOCKS).kv().clone(),
            pending: db.bucket(Schema::PENDING),
            tokens: db.bucket(Schema::TOKENS).kv().clone(),
            meta: db.bucket(Schema::META).kv().clone(),
            assembly: Mutex::new(()),
            coder,
            hasher,
        }
    }

    /// Number of the last sealed block; zero before the first one
    pub fn get_current_block_number(&self) -> Result<U256, BlockManagerError> {
        match self.meta.get(Schema::BLOCK_NUMBER_KEY)? {
            Some(bytes) => u256_from_be_bytes(&bytes).ok_or_else(|| {
                BlockManagerError::CorruptBlockNumber(format!("0x{}", hex::encode(&bytes)))
            }),
            None => Ok(U256::zero()),
        }
    }

    /// Add `token` to the set sealed into blocks; registering twice is a no-op
    pub fn register_token(&self, token: &Address) -> Result<(), BlockManagerError> {
        let key = Schema::address_key(token);
        if self.tokens.get(&key)?.is_none() {
            self.tokens.put(&key, &[])?;
            info!("Registered token {:?}", token);
        }
        Ok(())
    }

    pub fn get_tokens(&self) -> Result<Vec<Address>, BlockManagerError> {
        Ok(self
            .tokens
            .entries()?
            .into_iter()
            .filter(|(key, _)| key.len() == 20)
            .map(|(key, _)| Address::from_slice(&key))
            .collect())
    }

    fn pending_bucket(&self, block_number: &U256, token: &Address) -> RangeStore {
        self.pending.bucket(&Schema::block_key(block_number)).bucket(&Schema::address_key(token))
    }

    /// Queue `state_update` for the next block
    pub fn enqueue_pending_state_update(&self, state_update: &StateUpdate) -> Result<(), BlockManagerError> {
        let _guard = self.assembly.lock().map_err(|_| BlockManagerError::LockPoisoned)?;

        let expected = self.get_current_block_number()? + U256::one();
        if state_update.block_number != expected {
            return Err(BlockManagerError::UnexpectedBlockNumber { expected, actual: state_update.block_number });
        }
        let token = state_update.deposit_contract_address;
        if self.tokens.get(&Schema::address_key(&token))?.is_none() {
            return Err(BlockManagerError::UnknownToken(token));
        }

        self.pending_bucket(&expected, &token).put(
            state_update.range.start,
            state_update.range.end,
            &encode(self.coder.as_ref(), state_update),
        )?;
        debug!("Enqueued {} of {:?} for block {}", state_update.range, token, expected);
        Ok(())
    }

    /// Seal every pending StateUpdate into the next block.
    ///
    /// Returns `None` and leaves the counter untouched when nothing is pending.
    pub fn generate_next_block(&self) -> Result<Option<Block>, BlockManagerError> {
        let _guard = self.assembly.lock().map_err(|_| BlockManagerError::LockPoisoned)?;

        let next = self.get_current_block_number()? + U256::one();
        let mut state_updates_map = BTreeMap::new();
        for token in self.get_tokens()? {
            let mut state_updates = Vec::new();
            for record in self.pending_bucket(&next, &token).all()? {
                let state_update: StateUpdate = decode(self.coder.as_ref(), &record.value)?;
                state_updates.push(state_update.with_range(record.range()));
            }
            if !state_updates.is_empty() {
                state_updates_map.insert(token, state_updates);
            }
        }
        if state_updates_map.is_empty() {
            debug!("No pending state updates for block {}", next);
            return Ok(None);
        }

        let block = Block::new(next, state_updates_map);
        let mut batch = Vec::new();
        self.blocks.batch_put(&mut batch, &Schema::block_key(&next), encode(self.coder.as_ref(), &block));
        self.meta.batch_put(&mut batch, Schema::BLOCK_NUMBER_KEY, u256_to_be_bytes(&next).to_vec());
        self.blocks.write_batch(batch)?;

        self.pending.bucket(&Schema::block_key(&next)).clear()?;
        info!("Generated block {} with {} state updates", next, block.len());
        Ok(Some(block))
    }

    pub fn get_block(&self, block_number: &U256) -> Result<Option<Block>, BlockManagerError> {
        match self.blocks.get(&Schema::block_key(block_number))? {
            Some(bytes) => Ok(Some(decode(self.coder.as_ref(), &bytes)?)),
            None => Ok(None),
        }
    }

    /// Store `block` without touching the block counter
    pub fn put_block(&self, block: &Block) -> Result<(), BlockManagerError> {
        self.blocks.put(&Schema::block_key(&block.block_number), &encode(self.coder.as_ref(), block))?;
        Ok(())
    }

    /// Inclusion proof of `state_update` in block `block_number`, if both exist
    pub fn get_inclusion_proof(
        &self,
        block_number: &U256,
        state_update: &StateUpdate,
    ) -> Result<Option<DoubleLayerInclusionProof>, BlockManagerError> {
        match self.get_block(block_number)? {
            Some(block) => Ok(block.get_inclusion_proof(state_update, self.coder.as_ref(), self.hasher.clone())?),
            None => Ok(None),
        }
    }

    pub fn coder(&self) -> &dyn Coder {
        self.coder.as_ref()
    }

    pub fn hasher(&self) -> Arc<dyn Hasher> {
        self.hasher.clone()
    }
}
