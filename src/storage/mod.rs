// Storage module for the Plasma aggregator
// Provides an ordered key-value store, bucket namespacing and the
// range-indexed store that holds every piece of Plasma state

pub mod bucket;
pub mod kv_store;
pub mod range_store;
pub mod schema;

// Re-export main components
pub use bucket::{Bucket, BucketIter, MAX_BUCKET_NAME_LEN};
pub use kv_store::{KVStore, KVStoreError, MemoryStore, RocksDBStore, WriteBatchOperation};
pub use range_store::{RangeIter, RangeRecord, RangeStore, RangeStoreError};
pub use schema::Schema;

use std::sync::Arc;

use crate::config::StorageConfig;

/// Open the store selected by `config`
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn KVStore>, KVStoreError> {
    if config.in_memory {
        log::info!("Using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    log::info!("Opening RocksDB at {}", config.db_path);
    Ok(Arc::new(RocksDBStore::from_config(config)?))
}
