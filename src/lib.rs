// OVM Plasma - an aggregator for an OVM-based Plasma chain: double-layer Merkle
// block commitments, a range-indexed state store and a state transition engine

pub mod aggregator;
pub mod codec;
pub mod config;
pub mod contract;
pub mod crypto;
pub mod merkle;
pub mod ovm;
pub mod plasma;
pub mod state;
pub mod storage;
pub mod types;

// Initialize logging; RUST_LOG takes precedence over `default_level`
pub fn init_logger(default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("Logger already initialised");
    }
}
