//! Aggregator orchestration: applies transactions, seals blocks on a timer
//! and submits their roots to the commitment contract

pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::codec::{decode, encode, CodecError, Coder};
use crate::config::{AggregatorConfig, ConfigError};
use crate::contract::{AdjudicationEvent, CommitmentContract, ContractError, DepositedEvent};
use crate::crypto::{hasher_by_name, Ed25519Verifier, Hasher};
use crate::merkle::MerkleError;
use crate::ovm::{DeciderManager, OwnershipDecider, Property, SignedByDecider, WitnessDb};
use crate::plasma::{Block, Checkpoint, ReceiptStatus, SignedTransaction, StateUpdate, TransactionReceipt};
use crate::state::{BlockManager, BlockManagerError, StateManager, StateManagerError};
use crate::storage::{KVStore, RangeStore};
use crate::types::{Address, U256};

/// Aggregator error type
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("State manager error: {0}")]
    StateManager(#[from] StateManagerError),

    #[error("Block manager error: {0}")]
    BlockManager(#[from] BlockManagerError),

    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Merkle error: {0}")]
    Merkle(#[from] MerkleError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A request parameter could not be parsed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// The Plasma aggregator
pub struct Aggregator {
    state_manager: StateManager,
    block_manager: BlockManager,
    deciders: DeciderManager,
    commitment: Arc<dyn CommitmentContract>,

    ownership_predicate: Address,
    exit_predicate: Address,
    block_interval: Duration,
    submit_retry_max_elapsed: Duration,

    /// Serialises transaction ingestion against block generation
    ingest_lock: Mutex<()>,

    coder: Arc<dyn Coder>,
    hasher: Arc<dyn Hasher>,
}

impl Aggregator {
    /// Create an aggregator over `store`, registering the configured deposit contracts as tokens
    pub fn new(
        store: Arc<dyn KVStore>,
        commitment: Arc<dyn CommitmentContract>,
        config: &AggregatorConfig,
        coder: Arc<dyn Coder>,
    ) -> Result<Self, AggregatorError> {
        config.validate()?;
        let hasher = hasher_by_name(&config.hash_algorithm).ok_or_else(|| ConfigError::Invalid {
            field: "hash_algorithm",
            reason: format!("unknown hash algorithm {}", config.hash_algorithm),
        })?;
        let ownership_predicate = config.ownership_predicate_address()?;
        let signed_by_predicate = config.signed_by_predicate_address()?;

        let db = RangeStore::new(store);
        let state_manager =
            StateManager::new(&db, coder.clone(), hasher.clone(), config.state_update_predicate_address()?);
        let block_manager = BlockManager::new(&db, coder.clone(), hasher.clone());

        let mut deciders = DeciderManager::new(WitnessDb::new(db, coder.clone()), coder.clone());
        deciders.register(
            signed_by_predicate,
            Arc::new(SignedByDecider::new(Arc::new(Ed25519Verifier::new(hasher.clone())))),
        );
        deciders.register(ownership_predicate, Arc::new(OwnershipDecider::new(signed_by_predicate)));

        for token in config.deposit_contract_addresses()? {
            block_manager.register_token(&token)?;
        }

        info!("Aggregator ready, hashing with {}", hasher.name());
        Ok(Self {
            state_manager,
            block_manager,
            deciders,
            commitment,
            ownership_predicate,
            exit_predicate: config.exit_predicate_address()?,
            block_interval: Duration::from_millis(config.block_interval_ms),
            submit_retry_max_elapsed: Duration::from_millis(config.submit_retry_max_elapsed_ms),
            ingest_lock: Mutex::new(()),
            coder,
            hasher,
        })
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state_manager
    }

    pub fn block_manager(&self) -> &BlockManager {
        &self.block_manager
    }

    pub fn deciders(&self) -> &DeciderManager {
        &self.deciders
    }

    pub fn coder(&self) -> &dyn Coder {
        self.coder.as_ref()
    }

    pub fn hasher(&self) -> Arc<dyn Hasher> {
        self.hasher.clone()
    }

    /// Apply `tx` and queue the resulting StateUpdate for the next block.
    ///
    /// A rejected transaction yields a receipt with status `False`.
    pub async fn ingest_transaction(&self, tx: &SignedTransaction) -> Result<TransactionReceipt, AggregatorError> {
        let _guard = self.ingest_lock.lock().await;

        let next_block_number = self.block_manager.get_current_block_number()? + U256::one();
        let transaction_hash = tx.hash(self.coder.as_ref(), self.hasher.as_ref());
        let status = match self.state_manager.execute_state_transition(tx, next_block_number, &self.deciders).await {
            Ok(state_update) => {
                self.block_manager.enqueue_pending_state_update(&state_update)?;
                ReceiptStatus::True
            }
            Err(StateManagerError::InvalidTransaction(reason)) => {
                warn!("Rejected transaction {:?}: {}", transaction_hash, reason);
                ReceiptStatus::False
            }
            Err(e) => return Err(e.into()),
        };

        let transaction = &tx.transaction;
        Ok(TransactionReceipt {
            status,
            block_number: next_block_number,
            prev_block_numbers: self.state_manager.get_prev_block_numbers(&transaction_hash)?.unwrap_or_default(),
            range: transaction.range,
            deposit_contract_address: transaction.deposit_contract_address,
            from: transaction.from,
            transaction_hash,
        })
    }

    /// Record a deposit as a StateUpdate and a checkpoint
    pub async fn handle_deposit(&self, event: &DepositedEvent) -> Result<StateUpdate, AggregatorError> {
        let _guard = self.ingest_lock.lock().await;

        self.block_manager.register_token(&event.deposit_contract_address)?;
        let state_update = self.state_manager.insert_deposit_range(
            event.deposit_contract_address,
            event.range,
            event.state_object.clone(),
            event.block_number,
        )?;
        let checkpoint_id = self.state_manager.put_checkpoint(&Checkpoint::new(state_update.clone()))?;
        if checkpoint_id != event.checkpoint_id {
            warn!("Deposit checkpoint {:?} differs from reported {:?}", checkpoint_id, event.checkpoint_id);
        }
        Ok(state_update)
    }

    /// The property claimed on the adjudication contract to exit `state_update`
    pub fn exit_claim(&self, state_update: &StateUpdate) -> Property {
        let claimed = encode(self.coder.as_ref(), &state_update.property(self.coder.as_ref()));
        Property::new(self.exit_predicate, vec![claimed])
    }

    /// Start exits claimed on the adjudication contract
    pub async fn handle_adjudication_event(&self, event: &AdjudicationEvent) -> Result<(), AggregatorError> {
        match event {
            AdjudicationEvent::NewPropertyClaimed { game_id, property, .. } if property.decider_address == self.exit_predicate => {
                let claimed = property
                    .inputs
                    .first()
                    .ok_or_else(|| AggregatorError::InvalidRequest("exit claim without a state update".to_string()))?;
                let state_update = StateUpdate::from_property(&decode::<Property>(self.coder.as_ref(), claimed)?, self.coder.as_ref())?;

                let _guard = self.ingest_lock.lock().await;
                let exited = self.state_manager.start_exit(&state_update.deposit_contract_address, state_update.range)?;
                info!("Exit game {:?} moved {} state updates out of {}", game_id, exited.len(), state_update.range);
            }
            other => debug!("Ignoring adjudication event {:?}", other),
        }
        Ok(())
    }

    /// Resubmit roots of sealed blocks the commitment contract has not seen
    async fn submit_missing_roots(&self) -> Result<(), AggregatorError> {
        let sealed = self.block_manager.get_current_block_number()?;
        let mut committed = self.commitment.get_current_block().await?;
        while committed < sealed {
            committed += U256::one();
            let block = self.block_manager.get_block(&committed)?.ok_or_else(|| {
                AggregatorError::InvalidRequest(format!("sealed block {} is missing", committed))
            })?;
            self.submit_root(&block).await?;
        }
        Ok(())
    }

    async fn submit_root(&self, block: &Block) -> Result<(), AggregatorError> {
        let root = block.get_root(self.coder.as_ref(), self.hasher.clone())?;
        let block_number = block.block_number;
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_elapsed_time(Some(self.submit_retry_max_elapsed))
            .build();

        let commitment = self.commitment.clone();
        backoff::future::retry(backoff, || {
            let commitment = commitment.clone();
            async move {
                commitment.submit_root(block_number, root).await.map_err(|e| {
                    if e.is_transient() {
                        warn!("Submitting block {} failed, retrying: {}", block_number, e);
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await?;
        Ok(())
    }

    /// Seal pending StateUpdates into a block and submit its root.
    ///
    /// Returns `None` when there was nothing to seal.
    pub async fn submit_next_block(&self) -> Result<Option<Block>, AggregatorError> {
        let _guard = self.ingest_lock.lock().await;

        self.submit_missing_roots().await?;
        let block = match self.block_manager.generate_next_block()? {
            Some(block) => block,
            None => return Ok(None),
        };
        self.submit_root(&block).await?;
        Ok(Some(block))
    }

    /// Serve deposits and adjudication events and seal a block every interval
    /// until `shutdown` changes or its sender is dropped
    pub async fn run(
        &self,
        mut deposits: mpsc::UnboundedReceiver<DepositedEvent>,
        mut adjudication: mpsc::UnboundedReceiver<AdjudicationEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut block_timer = time::interval_at(Instant::now() + self.block_interval, self.block_interval);
        block_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Aggregator loop started, sealing every {:?}", self.block_interval);

        loop {
            tokio::select! {
                // Seal and submit
                _ = block_timer.tick() => {
                    if let Err(e) = self.submit_next_block().await {
                        error!("Block submission failed: {}", e);
                    }
                }

                // Deposits
                Some(event) = deposits.recv() => {
                    if let Err(e) = self.handle_deposit(&event).await {
                        error!("Failed to record deposit {}: {}", event.range, e);
                    }
                }

                // Exit claims
                Some(event) = adjudication.recv() => {
                    if let Err(e) = self.handle_adjudication_event(&event).await {
                        error!("Failed to handle adjudication event: {}", e);
                    }
                }

                _ = shutdown.changed() => {
                    info!("Aggregator loop stopped");
                    break;
                }
            }
        }
    }
}
