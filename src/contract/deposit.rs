use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio::sync::{mpsc, Mutex};

use super::{CommitmentContract, ContractError, DepositContract, DepositedEvent, Subscribers};
use crate::codec::Coder;
use crate::crypto::Hasher;
use crate::ovm::Property;
use crate::plasma::{Checkpoint, StateUpdate};
use crate::types::{Address, Range, U256};

/// In-process deposit contract handing out consecutive coin ranges
pub struct LocalDepositContract {
    address: Address,
    state_update_predicate: Address,
    commitment: Arc<dyn CommitmentContract>,
    /// Total coins deposited so far; the next range starts here
    total_deposited: Mutex<U256>,
    subscribers: Subscribers<DepositedEvent>,
    coder: Arc<dyn Coder>,
    hasher: Arc<dyn Hasher>,
}

impl LocalDepositContract {
    pub fn new(
        address: Address,
        state_update_predicate: Address,
        commitment: Arc<dyn CommitmentContract>,
        coder: Arc<dyn Coder>,
        hasher: Arc<dyn Hasher>,
    ) -> Self {
        Self {
            address,
            state_update_predicate,
            commitment,
            total_deposited: Mutex::new(U256::zero()),
            subscribers: Subscribers::new(),
            coder,
            hasher,
        }
    }
}

#[async_trait]
impl DepositContract for LocalDepositContract {
    fn address(&self) -> Address {
        self.address
    }

    async fn deposit(&self, amount: U256, state_object: Property) -> Result<Range, ContractError> {
        let mut total = self.total_deposited.lock().await;
        let range = Range::with_amount(*total, amount).map_err(|e| ContractError::Rejected(e.to_string()))?;
        let block_number = self.commitment.get_current_block().await?;

        let state_update =
            StateUpdate::new(self.state_update_predicate, self.address, range, block_number, state_object.clone());
        let checkpoint_id = Checkpoint::new(state_update).id(self.coder.as_ref(), self.hasher.as_ref());
        *total = range.end;

        info!("Deposit of {} into {:?} at block {}", range, self.address, block_number);
        self.subscribers.notify(DepositedEvent {
            deposit_contract_address: self.address,
            checkpoint_id,
            range,
            state_object,
            block_number,
        });
        Ok(range)
    }

    fn subscribe_deposited(&self) -> mpsc::UnboundedReceiver<DepositedEvent> {
        self.subscribers.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCoder;
    use crate::contract::LocalCommitmentContract;
    use crate::crypto::Keccak256Hasher;
    use crate::storage::{Bucket, MemoryStore};

    #[tokio::test]
    async fn test_deposits_take_consecutive_ranges() {
        let commitment = Arc::new(LocalCommitmentContract::new(Bucket::root(Arc::new(MemoryStore::new()))));
        let contract = LocalDepositContract::new(
            Address::from_low_u64_be(100),
            Address::from_low_u64_be(3),
            commitment,
            Arc::new(JsonCoder),
            Arc::new(Keccak256Hasher),
        );
        let mut events = contract.subscribe_deposited();
        let owner = Property::new(Address::from_low_u64_be(1), vec![vec![1]]);

        let first = contract.deposit(U256::from(10), owner.clone()).await.unwrap();
        let second = contract.deposit(U256::from(5), owner.clone()).await.unwrap();
        assert_eq!(first, Range::from_u64(0, 10).unwrap());
        assert_eq!(second, Range::from_u64(10, 15).unwrap());

        let event = events.recv().await.unwrap();
        assert_eq!(event.range, first);
        assert_eq!(event.block_number, U256::zero());
        assert_eq!(event.state_object, owner);

        assert!(contract.deposit(U256::zero(), owner).await.unwrap_err().to_string().contains("Rejected"));
    }
}
