use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::{mpsc, Mutex};

use super::{BlockSubmittedEvent, CommitmentContract, ContractError, Subscribers};
use crate::storage::Bucket;
use crate::types::{u256_from_be_bytes, u256_to_be_bytes, H256, U256};

const CURRENT_BLOCK_KEY: &[u8] = b"current_block";
const ROOT_TAG: u8 = b'r';

/// Commitment contract kept in a local bucket
pub struct LocalCommitmentContract {
    roots: Bucket,
    subscribers: Subscribers<BlockSubmittedEvent>,
    /// Serialises submissions
    submit_lock: Mutex<()>,
    /// Submissions still to fail as unavailable
    outages: AtomicUsize,
}

impl LocalCommitmentContract {
    pub fn new(roots: Bucket) -> Self {
        Self { roots, subscribers: Subscribers::new(), submit_lock: Mutex::new(()), outages: AtomicUsize::new(0) }
    }

    /// Make the next `count` submissions fail as if the chain were unreachable
    pub fn simulate_outage(&self, count: usize) {
        self.outages.store(count, Ordering::SeqCst);
    }

    fn root_key(block_number: &U256) -> Vec<u8> {
        let mut key = vec![ROOT_TAG];
        key.extend_from_slice(&u256_to_be_bytes(block_number));
        key
    }

    fn current_block(&self) -> Result<U256, ContractError> {
        match self.roots.get(CURRENT_BLOCK_KEY)? {
            Some(bytes) => u256_from_be_bytes(&bytes)
                .ok_or_else(|| ContractError::Rejected("stored block number is corrupt".to_string())),
            None => Ok(U256::zero()),
        }
    }
}

#[async_trait]
impl CommitmentContract for LocalCommitmentContract {
    async fn submit_root(&self, block_number: U256, root: H256) -> Result<(), ContractError> {
        let _guard = self.submit_lock.lock().await;

        let outages = self.outages.load(Ordering::SeqCst);
        if outages > 0 {
            self.outages.store(outages - 1, Ordering::SeqCst);
            return Err(ContractError::Unavailable("commitment contract unreachable".to_string()));
        }

        let expected = self.current_block()? + U256::one();
        if block_number != expected {
            return Err(ContractError::Rejected(format!("expected block {}, got {}", expected, block_number)));
        }

        let mut batch = Vec::new();
        self.roots.batch_put(&mut batch, &Self::root_key(&block_number), root.as_bytes().to_vec());
        self.roots.batch_put(&mut batch, CURRENT_BLOCK_KEY, u256_to_be_bytes(&block_number).to_vec());
        self.roots.write_batch(batch)?;

        info!("Block {} submitted with root {:?}", block_number, root);
        self.subscribers.notify(BlockSubmittedEvent { block_number, root });
        Ok(())
    }

    async fn get_current_block(&self) -> Result<U256, ContractError> {
        self.current_block()
    }

    async fn get_root(&self, block_number: U256) -> Result<Option<H256>, ContractError> {
        let root = self.roots.get(&Self::root_key(&block_number))?;
        debug!("Root of block {} requested: {}", block_number, root.is_some());
        Ok(root.filter(|bytes| bytes.len() == 32).map(|bytes| H256::from_slice(&bytes)))
    }

    fn subscribe_block_submitted(&self) -> mpsc::UnboundedReceiver<BlockSubmittedEvent> {
        self.subscribers.subscribe()
    }
}
