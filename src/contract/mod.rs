//! Interfaces of the on-chain contracts the aggregator talks to, and
//! in-process implementations of them

pub mod adjudication;
pub mod commitment;
pub mod deposit;
pub mod events;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::codec::CodecError;
use crate::ovm::Property;
use crate::storage::KVStoreError;
use crate::types::{Address, Range, H256, U256};

pub use adjudication::LocalAdjudicationContract;
pub use commitment::LocalCommitmentContract;
pub use deposit::LocalDepositContract;
pub use events::{AdjudicationEvent, BlockSubmittedEvent, DepositedEvent};

/// Contract error type
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// The contract refused the call; retrying will not help
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The contract could not be reached; the call may be retried
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// KVStore error
    #[error("KVStore error: {0}")]
    KVStoreError(#[from] KVStoreError),

    /// Codec error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

impl ContractError {
    /// Whether retrying the call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ContractError::Unavailable(_))
    }
}

/// Commitment contract: stores the root of every Plasma block
#[async_trait]
pub trait CommitmentContract: Send + Sync {
    /// Submit the root of block `block_number`, which must follow the current block
    async fn submit_root(&self, block_number: U256, root: H256) -> Result<(), ContractError>;

    /// Number of the last block with a submitted root
    async fn get_current_block(&self) -> Result<U256, ContractError>;

    async fn get_root(&self, block_number: U256) -> Result<Option<H256>, ContractError>;

    fn subscribe_block_submitted(&self) -> mpsc::UnboundedReceiver<BlockSubmittedEvent>;
}

/// Deposit contract of one token
#[async_trait]
pub trait DepositContract: Send + Sync {
    fn address(&self) -> Address;

    /// Lock `amount` coins under `state_object`, returning the range they occupy
    async fn deposit(&self, amount: U256, state_object: Property) -> Result<Range, ContractError>;

    fn subscribe_deposited(&self) -> mpsc::UnboundedReceiver<DepositedEvent>;
}

/// Adjudication contract running the dispute games
#[async_trait]
pub trait AdjudicationContract: Send + Sync {
    /// Open a game for `property`, returning its id
    async fn claim_property(&self, property: Property) -> Result<H256, ContractError>;

    /// Outcome of a game, `None` while undecided
    async fn get_decision(&self, game_id: H256) -> Result<Option<bool>, ContractError>;

    fn subscribe_events(&self) -> mpsc::UnboundedReceiver<AdjudicationEvent>;
}

/// Fan-out of events to every live subscriber
pub(crate) struct Subscribers<T> {
    senders: std::sync::Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T: Clone> Subscribers<T> {
    pub(crate) fn new() -> Self {
        Self { senders: std::sync::Mutex::new(Vec::new()) }
    }

    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if let Ok(mut senders) = self.senders.lock() {
            senders.push(sender);
        }
        receiver
    }

    /// Send `event` to every subscriber, dropping those that went away
    pub(crate) fn notify(&self, event: T) {
        if let Ok(mut senders) = self.senders.lock() {
            senders.retain(|sender| sender.send(event.clone()).is_ok());
        }
    }
}
