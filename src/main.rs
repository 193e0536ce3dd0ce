use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;
use tokio::sync::{mpsc, watch};
use log::{info, error};

use ovm_plasma::aggregator::Aggregator;
use ovm_plasma::codec::{Coder, JsonCoder};
use ovm_plasma::config::Config;
use ovm_plasma::contract::{
    AdjudicationContract, CommitmentContract, DepositContract, DepositedEvent, LocalAdjudicationContract,
    LocalCommitmentContract, LocalDepositContract,
};
use ovm_plasma::init_logger;
use ovm_plasma::storage::{open_store, Bucket, Schema};

#[derive(Debug, StructOpt)]
#[structopt(name = "ovm-plasma", about = "OVM Plasma aggregator node")]
struct Opt {
    /// Configuration file
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Data directory, overriding the configured one
    #[structopt(long)]
    data_dir: Option<String>,
}

/// Forward every deposit subscription into one channel
fn merge_deposits(receivers: Vec<mpsc::UnboundedReceiver<DepositedEvent>>) -> mpsc::UnboundedReceiver<DepositedEvent> {
    let (sender, merged) = mpsc::unbounded_channel();
    for mut receiver in receivers {
        let sender = sender.clone();
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if sender.send(event).is_err() {
                    break;
                }
            }
        });
    }
    merged
}

fn exit_with(message: &str, e: impl std::fmt::Display) -> ! {
    error!("{}: {}", message, e);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();

    let mut config = match &opt.config {
        Some(path) => Config::load(path).unwrap_or_else(|e| {
            eprintln!("Failed to load configuration from {:?}: {}", path, e);
            std::process::exit(1);
        }),
        None => Config::default(),
    };
    if let Some(data_dir) = &opt.data_dir {
        config = config.with_data_dir(data_dir);
    }

    // Initialize logger
    init_logger(&config.node.log_level);
    info!("Starting OVM Plasma aggregator...");

    // Create data directory if it doesn't exist
    if !config.storage.in_memory {
        if let Err(e) = std::fs::create_dir_all(&config.node.data_dir) {
            exit_with("Failed to create data directory", e);
        }
    }

    // Initialize storage
    let store = open_store(&config.storage).unwrap_or_else(|e| exit_with("Failed to open storage", e));
    let coder: Arc<dyn Coder> = Arc::new(JsonCoder);

    // Local contracts
    let commitment: Arc<dyn CommitmentContract> =
        Arc::new(LocalCommitmentContract::new(Bucket::root(store.clone()).bucket(Schema::COMMITMENTS)));
    let aggregator = Aggregator::new(store, commitment.clone(), &config.aggregator, coder.clone())
        .unwrap_or_else(|e| exit_with("Failed to start aggregator", e));

    let state_update_predicate = config
        .aggregator
        .state_update_predicate_address()
        .unwrap_or_else(|e| exit_with("Invalid configuration", e));
    let deposit_contracts = config
        .aggregator
        .deposit_contract_addresses()
        .unwrap_or_else(|e| exit_with("Invalid configuration", e))
        .into_iter()
        .map(|address| {
            LocalDepositContract::new(address, state_update_predicate, commitment.clone(), coder.clone(), aggregator.hasher())
        })
        .collect::<Vec<_>>();
    let deposits = merge_deposits(deposit_contracts.iter().map(|contract| contract.subscribe_deposited()).collect());
    let adjudication = LocalAdjudicationContract::new(commitment.clone(), coder.clone(), aggregator.hasher());

    // Stop on ctrl-c
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
        }
        info!("Shutting down OVM Plasma aggregator...");
        let _ = shutdown_tx.send(true);
    });

    info!("OVM Plasma aggregator started with {} deposit contracts", deposit_contracts.len());
    aggregator.run(deposits, adjudication.subscribe_events(), shutdown_rx).await;
}
