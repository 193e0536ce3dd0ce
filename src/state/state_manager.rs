use std::sync::Arc;

use futures::future::try_join_all;
use log::{debug, info, warn};

use crate::codec::{decode, encode, CodecError, Coder};
use crate::crypto::Hasher;
use crate::ovm::{replace_hint, DeciderError, DeciderManager, HintError, Property, SignedByDecider, WitnessDb};
use crate::plasma::{Checkpoint, SignedTransaction, StateUpdate};
use crate::storage::{Bucket, KVStoreError, RangeRecord, RangeStore, RangeStoreError, Schema};
use crate::types::{Address, Range, RangeError, H256, U256};

/// Error type for StateManager operations
#[derive(Debug, thiserror::Error)]
pub enum StateManagerError {
    /// The transaction does not legally transition its range
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// RangeStore error
    #[error("Range store error: {0}")]
    RangeStoreError(#[from] RangeStoreError),

    /// KVStore error
    #[error("KVStore error: {0}")]
    KVStoreError(#[from] KVStoreError),

    /// Codec error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Witness storage error
    #[error("Hint error: {0}")]
    Hint(#[from] HintError),

    /// A decider failed rather than deciding
    #[error("Decider error: {0}")]
    Decider(#[from] DeciderError),

    /// Invalid range
    #[error("Invalid range: {0}")]
    InvalidRange(#[from] RangeError),
}

/// Hint of the encoded signed transaction with hash `tx_hash`
fn tx_hint(tx_hash: &H256) -> String {
    replace_hint(&format!("{},KEY,${{hash}}", Schema::TRANSACTIONS), &[("hash", tx_hash.as_bytes())])
}

/// Hint of the block numbers spent by the transaction with hash `tx_hash`
fn prev_block_numbers_hint(tx_hash: &H256) -> String {
    replace_hint(&format!("{},KEY,${{hash}}", Schema::PREV_BLOCK_NUMBERS), &[("hash", tx_hash.as_bytes())])
}

/// Tracks the latest StateUpdate of every coin range and applies transactions to them
pub struct StateManager {
    /// Live StateUpdates, one namespace per deposit contract
    state_updates: RangeStore,

    /// StateUpdates being exited, one namespace per deposit contract
    exits: RangeStore,

    /// Checkpoints by id
    checkpoints: Bucket,

    /// Deposit contracts that have live StateUpdates
    deposit_contracts: Bucket,

    /// Witnesses written while applying transactions
    witness_db: WitnessDb,

    /// Address recorded as the decider of produced StateUpdates
    state_update_predicate: Address,

    coder: Arc<dyn Coder>,
    hasher: Arc<dyn Hasher>,
}

impl StateManager {
    /// Create a StateManager over the root namespace `db`
    pub fn new(db: &RangeStore, coder: Arc<dyn Coder>, hasher: Arc<dyn Hasher>, state_update_predicate: Address) -> Self {
        Self {
            state_updates: db.bucket(Schema::STATE_UPDATES),
            exits: db.bucket(Schema::EXITS),
            checkpoints: db.bucket(Schema::CHECKPOINTS).kv().clone(),
            deposit_contracts: db.bucket(Schema::DEPOSIT_CONTRACTS).kv().clone(),
            witness_db: WitnessDb::new(db.clone(), coder.clone()),
            state_update_predicate,
            coder,
            hasher,
        }
    }

    fn token_store(&self, deposit_contract: &Address) -> RangeStore {
        self.state_updates.bucket(&Schema::address_key(deposit_contract))
    }

    fn exit_store(&self, deposit_contract: &Address) -> RangeStore {
        self.exits.bucket(&Schema::address_key(deposit_contract))
    }

    /// Decode a stored StateUpdate; a record may be a slice of the update it was written as
    fn decode_record(&self, record: &RangeRecord) -> Result<StateUpdate, StateManagerError> {
        let state_update: StateUpdate = decode(self.coder.as_ref(), &record.value)?;
        Ok(state_update.with_range(record.range()))
    }

    fn decode_records(&self, records: &[RangeRecord]) -> Result<Vec<StateUpdate>, StateManagerError> {
        records.iter().map(|record| self.decode_record(record)).collect()
    }

    fn write_state_update(&self, state_update: &StateUpdate) -> Result<(), StateManagerError> {
        let token = state_update.deposit_contract_address;
        self.deposit_contracts.put(&Schema::address_key(&token), &[])?;
        self.token_store(&token).put(
            state_update.range.start,
            state_update.range.end,
            &encode(self.coder.as_ref(), state_update),
        )?;
        Ok(())
    }

    /// Apply `tx` as of `next_block_number`, returning the StateUpdate it produces
    pub async fn execute_state_transition(
        &self,
        tx: &SignedTransaction,
        next_block_number: U256,
        deciders: &DeciderManager,
    ) -> Result<StateUpdate, StateManagerError> {
        let transaction = &tx.transaction;
        let range = transaction.range;
        let coder = self.coder.as_ref();

        if transaction.max_block_number < next_block_number {
            return Err(StateManagerError::InvalidTransaction(format!(
                "transaction expired at block {}, next block is {}",
                transaction.max_block_number, next_block_number
            )));
        }

        let records = self.token_store(&transaction.deposit_contract_address).get(range.start, range.end)?;
        let prev_states = self.decode_records(&records)?;

        let (first, last) = match (prev_states.first(), prev_states.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(StateManagerError::InvalidTransaction(format!("no state for range {}", range))),
        };
        if prev_states.windows(2).any(|pair| pair[0].range.end != pair[1].range.start) {
            return Err(StateManagerError::InvalidTransaction(format!("state for range {} is not contiguous", range)));
        }
        if first.range.start > range.start || last.range.end < range.end {
            return Err(StateManagerError::InvalidTransaction("range not covered".to_string()));
        }

        // only the requested part of the first and last prior state moves
        let prev_states: Vec<StateUpdate> = prev_states
            .iter()
            .filter_map(|prev| prev.range.intersection(&range).map(|part| prev.with_range(part)))
            .collect();

        let encoded_tx = encode(coder, transaction);
        let tx_hash = transaction.hash(coder, self.hasher.as_ref());
        let prev_block_numbers: Vec<U256> = prev_states.iter().map(|prev| prev.block_number).collect();
        self.witness_db.put_witness(&SignedByDecider::signature_hint(&encoded_tx), &tx.signature)?;
        self.witness_db.put_witness(&tx_hint(&tx_hash), &encode(coder, tx))?;
        self.witness_db.put_witness(
            &prev_block_numbers_hint(&tx_hash),
            &encode(coder, &prev_block_numbers),
        )?;

        let properties: Vec<Property> =
            prev_states.iter().map(|prev| prev.state_object.with_input(encoded_tx.clone())).collect();
        let decisions = try_join_all(properties.iter().map(|property| deciders.decide(property))).await?;
        if let Some((prev, _)) = prev_states.iter().zip(&decisions).find(|(_, decision)| !decision.outcome) {
            warn!("Transaction {:?} rejected: state object of {} decided false", tx_hash, prev.range);
            return Err(StateManagerError::InvalidTransaction(format!(
                "state object of range {} decided false",
                prev.range
            )));
        }

        let next_state = StateUpdate::new(
            self.state_update_predicate,
            transaction.deposit_contract_address,
            range,
            next_block_number,
            transaction.state_object.clone(),
        );
        self.write_state_update(&next_state)?;
        debug!("Transaction {:?} moved {} to block {}", tx_hash, range, next_block_number);
        Ok(next_state)
    }

    /// Create a StateUpdate for freshly deposited coins without any prior state check
    pub fn insert_deposit_range(
        &self,
        deposit_contract_address: Address,
        range: Range,
        state_object: Property,
        block_number: U256,
    ) -> Result<StateUpdate, StateManagerError> {
        let state_update =
            StateUpdate::new(self.state_update_predicate, deposit_contract_address, range, block_number, state_object);
        self.write_state_update(&state_update)?;
        info!("Deposited {} on {:?} at block {}", range, deposit_contract_address, block_number);
        Ok(state_update)
    }

    /// StateUpdates of `deposit_contract` intersecting `[start, end)`
    pub fn resolve_state_updates(
        &self,
        deposit_contract: &Address,
        start: U256,
        end: U256,
    ) -> Result<Vec<StateUpdate>, StateManagerError> {
        let records = self.token_store(deposit_contract).get(start, end)?;
        self.decode_records(&records)
    }

    /// Every deposit contract that has received a StateUpdate
    pub fn deposit_contracts(&self) -> Result<Vec<Address>, StateManagerError> {
        Ok(self
            .deposit_contracts
            .entries()?
            .into_iter()
            .filter(|(key, _)| key.len() == 20)
            .map(|(key, _)| Address::from_slice(&key))
            .collect())
    }

    /// Live StateUpdates owned by `owner` through `ownership_predicate`,
    /// optionally only those of one block
    pub fn query_ownership_state_updates(
        &self,
        ownership_predicate: &Address,
        owner: &Address,
        block_number: Option<U256>,
    ) -> Result<Vec<StateUpdate>, StateManagerError> {
        let mut owned = Vec::new();
        for deposit_contract in self.deposit_contracts()? {
            let records = self.token_store(&deposit_contract).all()?;
            for state_update in self.decode_records(&records)? {
                let owner_matches = state_update.owner(ownership_predicate, self.coder.as_ref()).as_ref() == Some(owner);
                let block_matches = block_number.map(|number| number == state_update.block_number).unwrap_or(true);
                if owner_matches && block_matches {
                    owned.push(state_update);
                }
            }
        }
        Ok(owned)
    }

    /// Record `checkpoint`, returning its id
    pub fn put_checkpoint(&self, checkpoint: &Checkpoint) -> Result<H256, StateManagerError> {
        let id = checkpoint.id(self.coder.as_ref(), self.hasher.as_ref());
        self.checkpoints.put(id.as_bytes(), &encode(self.coder.as_ref(), checkpoint))?;
        debug!("Stored checkpoint {:?} for {}", id, checkpoint.state_update.range);
        Ok(id)
    }

    pub fn get_checkpoint(&self, id: &H256) -> Result<Option<Checkpoint>, StateManagerError> {
        match self.checkpoints.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(self.coder.as_ref(), &bytes)?)),
            None => Ok(None),
        }
    }

    /// Move the StateUpdates of `range` out of the live set into the exit set
    pub fn start_exit(&self, deposit_contract: &Address, range: Range) -> Result<Vec<StateUpdate>, StateManagerError> {
        let moved = self
            .token_store(deposit_contract)
            .move_range(&self.exit_store(deposit_contract), range.start, range.end)?;
        info!("Exiting {} on {:?}: {} state updates", range, deposit_contract, moved.len());
        self.decode_records(&moved)
    }

    /// StateUpdates being exited from `deposit_contract`
    pub fn get_exits(&self, deposit_contract: &Address) -> Result<Vec<StateUpdate>, StateManagerError> {
        let records = self.exit_store(deposit_contract).all()?;
        self.decode_records(&records)
    }

    /// Block numbers of the StateUpdates spent by the transaction with `tx_hash`
    pub fn get_prev_block_numbers(&self, tx_hash: &H256) -> Result<Option<Vec<U256>>, StateManagerError> {
        let hint = prev_block_numbers_hint(tx_hash);
        match self.witness_db.get_witnesses(&hint)?.first() {
            Some(bytes) => Ok(Some(decode(self.coder.as_ref(), bytes)?)),
            None => Ok(None),
        }
    }

    /// The signed transaction stored for `tx_hash`
    pub fn get_transaction(&self, tx_hash: &H256) -> Result<Option<SignedTransaction>, StateManagerError> {
        let hint = tx_hint(tx_hash);
        match self.witness_db.get_witnesses(&hint)?.first() {
            Some(bytes) => Ok(Some(decode(self.coder.as_ref(), bytes)?)),
            None => Ok(None),
        }
    }
}
