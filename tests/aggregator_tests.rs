use std::sync::Arc;
use std::time::Duration;

use ovm_plasma::aggregator::Aggregator;
use ovm_plasma::codec::{decode, encode, Coder, JsonCoder};
use ovm_plasma::config::AggregatorConfig;
use ovm_plasma::contract::{
    AdjudicationContract, AdjudicationEvent, CommitmentContract, DepositContract, LocalAdjudicationContract,
    LocalCommitmentContract, LocalDepositContract,
};
use ovm_plasma::crypto::{Ed25519Keypair, Ed25519Signer, Hasher, Keccak256Hasher, Signer};
use ovm_plasma::merkle::DoubleLayerInclusionProof;
use ovm_plasma::ovm::{OwnershipDecider, Property};
use ovm_plasma::plasma::{Block, ReceiptStatus, SignedTransaction, StateUpdate, Transaction, TransactionReceipt};
use ovm_plasma::storage::{Bucket, KVStore, MemoryStore, Schema};
use ovm_plasma::types::{from_hex, to_hex, Address, Range, U256};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

const TOKEN: u64 = 100;

fn token() -> Address {
    Address::from_low_u64_be(TOKEN)
}

fn signer(seed: u8) -> Ed25519Signer {
    Ed25519Signer::new(Ed25519Keypair::from_bytes(&[seed; 32]).unwrap(), &Keccak256Hasher)
}

struct Fixture {
    aggregator: Arc<Aggregator>,
    commitment: Arc<LocalCommitmentContract>,
    deposit: LocalDepositContract,
    config: AggregatorConfig,
}

impl Fixture {
    fn new() -> Self {
        let config = AggregatorConfig {
            block_interval_ms: 50,
            submit_retry_max_elapsed_ms: 5_000,
            deposit_contracts: vec![to_hex(token().as_bytes())],
            ..Default::default()
        };
        let store: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let coder: Arc<dyn Coder> = Arc::new(JsonCoder);
        let commitment = Arc::new(LocalCommitmentContract::new(Bucket::root(store.clone()).bucket(Schema::COMMITMENTS)));
        let aggregator = Aggregator::new(store, commitment.clone(), &config, coder.clone()).unwrap();
        let deposit = LocalDepositContract::new(
            token(),
            config.state_update_predicate_address().unwrap(),
            commitment.clone(),
            coder,
            Arc::new(Keccak256Hasher),
        );
        Self { aggregator: Arc::new(aggregator), commitment, deposit, config }
    }

    fn owned_by(&self, owner: &Address) -> Property {
        OwnershipDecider::property(self.config.ownership_predicate_address().unwrap(), owner, &JsonCoder)
    }

    /// Deposit `amount` coins to `owner` and feed the event to the aggregator
    async fn deposit(&self, amount: u64, owner: &Address) -> StateUpdate {
        let mut events = self.deposit.subscribe_deposited();
        self.deposit.deposit(U256::from(amount), self.owned_by(owner)).await.unwrap();
        let event = events.recv().await.unwrap();
        let state_update = self.aggregator.handle_deposit(&event).await.unwrap();
        assert!(self.aggregator.state_manager().get_checkpoint(&event.checkpoint_id).unwrap().is_some());
        state_update
    }

    fn transfer(&self, from: &Ed25519Signer, start: u64, end: u64, to: &Address) -> SignedTransaction {
        Transaction::new(token(), Range::from_u64(start, end).unwrap(), U256::from(100), self.owned_by(to), from.address())
            .sign(from, &JsonCoder)
            .unwrap()
    }

    async fn send(&self, tx: &SignedTransaction) -> TransactionReceipt {
        let receipts = self.aggregator.handle_send_tx(&[to_hex(&encode(&JsonCoder, tx))]).await.unwrap();
        assert_eq!(receipts.len(), 1);
        decode(&JsonCoder, &from_hex(&receipts[0]).unwrap()).unwrap()
    }
}

#[tokio::test]
async fn test_deposit_transfer_and_submit() {
    let fixture = Fixture::new();
    let alice = signer(1);
    let bob = signer(2);
    fixture.deposit(10, &alice.address()).await;

    let receipt = fixture.send(&fixture.transfer(&alice, 0, 3, &bob.address())).await;
    assert_eq!(receipt.status, ReceiptStatus::True);
    assert_eq!(receipt.block_number, U256::one());
    assert_eq!(receipt.prev_block_numbers, vec![U256::zero()]);
    assert_eq!(receipt.from, alice.address());

    let block = fixture.aggregator.submit_next_block().await.unwrap().unwrap();
    assert_eq!(block.block_number, U256::one());
    let root = block.get_root(&JsonCoder, Arc::new(Keccak256Hasher)).unwrap();
    assert_eq!(fixture.commitment.get_current_block().await.unwrap(), U256::one());
    assert_eq!(fixture.commitment.get_root(U256::one()).await.unwrap(), Some(root));

    // nothing pending: no block, no submission
    assert!(fixture.aggregator.submit_next_block().await.unwrap().is_none());
    assert_eq!(fixture.commitment.get_current_block().await.unwrap(), U256::one());

    let encoded = fixture.aggregator.handle_get_block("1").unwrap().unwrap();
    let fetched: Block = decode(&JsonCoder, &from_hex(&encoded).unwrap()).unwrap();
    assert_eq!(fetched, block);
    assert!(fixture.aggregator.handle_get_block("2").unwrap().is_none());
}

#[tokio::test]
async fn test_sync_state_and_inclusion_proof() {
    let fixture = Fixture::new();
    let alice = signer(1);
    let bob = signer(2);
    fixture.deposit(10, &alice.address()).await;
    fixture.send(&fixture.transfer(&alice, 0, 3, &bob.address())).await;
    let block = fixture.aggregator.submit_next_block().await.unwrap().unwrap();

    let synced = fixture.aggregator.handle_sync_state(&to_hex(bob.address().as_bytes()), None).unwrap();
    assert_eq!(synced.len(), 1);
    let property: Property = decode(&JsonCoder, &from_hex(&synced[0]).unwrap()).unwrap();
    let state_update = StateUpdate::from_property(&property, &JsonCoder).unwrap();
    assert_eq!(state_update.range, Range::from_u64(0, 3).unwrap());
    assert_eq!(state_update.block_number, U256::one());

    // alice keeps the deposit remainder, which was never part of a block
    let alice_hex = to_hex(alice.address().as_bytes());
    assert_eq!(fixture.aggregator.handle_sync_state(&alice_hex, None).unwrap().len(), 1);
    assert!(fixture.aggregator.handle_sync_state(&alice_hex, Some("1")).unwrap().is_empty());

    let encoded = fixture.aggregator.handle_inclusion_proof("1", &synced[0]).unwrap().unwrap();
    let proof: DoubleLayerInclusionProof = decode(&JsonCoder, &from_hex(&encoded).unwrap()).unwrap();
    let hasher: Arc<dyn Hasher> = Arc::new(Keccak256Hasher);
    assert!(block.verify_inclusion(&state_update, &proof, &JsonCoder, hasher).unwrap());
    assert!(fixture.aggregator.handle_inclusion_proof("2", &synced[0]).unwrap().is_none());
}

#[tokio::test]
async fn test_replayed_transaction_is_rejected() {
    let fixture = Fixture::new();
    let alice = signer(1);
    let bob = signer(2);
    fixture.deposit(10, &alice.address()).await;

    let tx = fixture.transfer(&alice, 0, 3, &bob.address());
    assert_eq!(fixture.send(&tx).await.status, ReceiptStatus::True);
    fixture.aggregator.submit_next_block().await.unwrap();

    // bob now owns the range, alice's signature no longer spends it
    assert_eq!(fixture.send(&tx).await.status, ReceiptStatus::False);
    assert!(fixture.aggregator.submit_next_block().await.unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_requests() {
    let fixture = Fixture::new();
    assert!(fixture.aggregator.handle_send_tx(&["0xzz".to_string()]).await.is_err());
    assert!(fixture.aggregator.handle_get_block("one").is_err());
    assert!(fixture.aggregator.handle_sync_state("0x1234", None).is_err());
}

#[tokio::test]
async fn test_submission_survives_outage() {
    let fixture = Fixture::new();
    let alice = signer(1);
    fixture.deposit(10, &alice.address()).await;
    fixture.send(&fixture.transfer(&alice, 0, 10, &signer(2).address())).await;

    fixture.commitment.simulate_outage(2);
    let block = fixture.aggregator.submit_next_block().await.unwrap().unwrap();
    assert_eq!(fixture.commitment.get_current_block().await.unwrap(), block.block_number);
}

#[tokio::test]
async fn test_exit_claim_moves_state_out() {
    let fixture = Fixture::new();
    let alice = signer(1);
    let deposited = fixture.deposit(10, &alice.address()).await;

    let adjudication = LocalAdjudicationContract::new(
        fixture.commitment.clone(),
        Arc::new(JsonCoder),
        Arc::new(Keccak256Hasher),
    );
    let mut events = adjudication.subscribe_events();
    adjudication.claim_property(fixture.aggregator.exit_claim(&deposited)).await.unwrap();
    let event = events.recv().await.unwrap();
    assert!(matches!(event, AdjudicationEvent::NewPropertyClaimed { .. }));
    fixture.aggregator.handle_adjudication_event(&event).await.unwrap();

    let state_manager = fixture.aggregator.state_manager();
    assert_eq!(state_manager.get_exits(&token()).unwrap(), vec![deposited]);
    assert!(state_manager.resolve_state_updates(&token(), U256::zero(), U256::MAX).unwrap().is_empty());

    // the exited coins can no longer be spent
    let receipt = fixture.send(&fixture.transfer(&alice, 0, 10, &signer(2).address())).await;
    assert_eq!(receipt.status, ReceiptStatus::False);
}

#[tokio::test]
async fn test_run_loop_seals_blocks() {
    let fixture = Fixture::new();
    let alice = signer(1);
    let (shutdown_sender, shutdown) = watch::channel(false);
    let deposits = fixture.deposit.subscribe_deposited();
    let adjudication = LocalAdjudicationContract::new(
        fixture.commitment.clone(),
        Arc::new(JsonCoder),
        Arc::new(Keccak256Hasher),
    );
    let claims = adjudication.subscribe_events();

    let aggregator = fixture.aggregator.clone();
    let handle = tokio::spawn(async move { aggregator.run(deposits, claims, shutdown).await });

    fixture.deposit.deposit(U256::from(10), fixture.owned_by(&alice.address())).await.unwrap();
    let state_manager = fixture.aggregator.state_manager();
    timeout(Duration::from_secs(5), async {
        while state_manager.resolve_state_updates(&token(), U256::zero(), U256::MAX).unwrap().is_empty() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let receipt = fixture.send(&fixture.transfer(&alice, 0, 10, &signer(2).address())).await;
    assert_eq!(receipt.status, ReceiptStatus::True);
    timeout(Duration::from_secs(5), async {
        while fixture.commitment.get_current_block().await.unwrap() < U256::one() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    shutdown_sender.send(true).unwrap();
    timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(fixture.aggregator.block_manager().get_block(&U256::one()).unwrap().is_some());
}
