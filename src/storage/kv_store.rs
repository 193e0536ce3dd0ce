use rocksdb::{DBCompressionType, Direction, IteratorMode, Options, WriteBatch, DB};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Error;
use std::ops::Bound;
use std::path::Path;
use std::sync::RwLock;

use crate::config::StorageConfig;

/// Custom error type for KVStore operations
#[derive(Debug)]
pub enum KVStoreError {
    /// IO error
    IoError(Error),
    /// RocksDB error
    RocksDBError(String),
    /// Serialization error
    SerializationError(String),
    /// Batch operation failed
    BatchOperationFailed(String),
    /// A lock guarding in-memory state was poisoned
    LockPoisoned(String),
}

impl fmt::Display for KVStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KVStoreError::IoError(err) => write!(f, "IO error: {}", err),
            KVStoreError::RocksDBError(err) => write!(f, "RocksDB error: {}", err),
            KVStoreError::SerializationError(err) => write!(f, "Serialization error: {}", err),
            KVStoreError::BatchOperationFailed(msg) => write!(f, "Batch operation failed: {}", msg),
            KVStoreError::LockPoisoned(what) => write!(f, "Lock poisoned: {}", what),
        }
    }
}

impl std::error::Error for KVStoreError {}

impl From<Error> for KVStoreError {
    fn from(err: Error) -> Self {
        KVStoreError::IoError(err)
    }
}

impl From<rocksdb::Error> for KVStoreError {
    fn from(err: rocksdb::Error) -> Self {
        KVStoreError::RocksDBError(err.to_string())
    }
}

impl From<bincode::Error> for KVStoreError {
    fn from(err: bincode::Error) -> Self {
        KVStoreError::SerializationError(err.to_string())
    }
}

/// Write batch operation for atomic updates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteBatchOperation {
    /// Put operation
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete operation
    Delete { key: Vec<u8> },
}

/// Ordered key-value store trait
pub trait KVStore: Send + Sync {
    /// Put a key-value pair
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Delete a key-value pair
    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Check if a key exists
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Write a batch of operations atomically
    fn write_batch(&self, operations: Vec<WriteBatchOperation>) -> Result<(), KVStoreError>;

    /// First entry with `key >= from` that still starts with `prefix`
    fn seek(&self, from: &[u8], prefix: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>, KVStoreError>;

    /// Iterate over key-value pairs with a prefix
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;

    /// Flush any pending writes to disk
    fn flush(&self) -> Result<(), KVStoreError>;
}

/// RocksDB implementation of KVStore
pub struct RocksDBStore {
    /// RocksDB instance
    db: DB,
}

impl RocksDBStore {
    /// Create a new RocksDBStore
    pub fn new(path: &Path) -> Result<Self, KVStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        Self::with_options(path, opts)
    }

    /// Create a new RocksDBStore with custom options
    pub fn with_options(path: &Path, options: Options) -> Result<Self, KVStoreError> {
        let db = DB::open(&options, path)
            .map_err(|e| KVStoreError::RocksDBError(format!("Failed to open RocksDB: {}", e)))?;
        Ok(Self { db })
    }

    /// Open the database described by a storage configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self, KVStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(config.create_if_missing);
        opts.set_max_open_files(config.max_open_files);
        if config.enable_compression {
            opts.set_compression_type(DBCompressionType::Lz4);
        } else {
            opts.set_compression_type(DBCompressionType::None);
        }
        Self::with_options(Path::new(&config.db_path), opts)
    }
}

impl KVStore for RocksDBStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.db.put(key, value)
            .map_err(|e| KVStoreError::RocksDBError(format!("Failed to put key: {}", e)))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.db.get(key)
            .map_err(|e| KVStoreError::RocksDBError(format!("Failed to get key: {}", e)))
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.db.delete(key)
            .map_err(|e| KVStoreError::RocksDBError(format!("Failed to delete key: {}", e)))
    }

    fn write_batch(&self, operations: Vec<WriteBatchOperation>) -> Result<(), KVStoreError> {
        let mut batch = WriteBatch::default();

        for op in operations {
            match op {
                WriteBatchOperation::Put { key, value } => {
                    batch.put(&key, &value);
                },
                WriteBatchOperation::Delete { key } => {
                    batch.delete(&key);
                },
            }
        }

        self.db.write(batch)
            .map_err(|e| KVStoreError::BatchOperationFailed(format!("Failed to write batch: {}", e)))
    }

    fn seek(&self, from: &[u8], prefix: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let mut iterator = self.db.iterator(IteratorMode::From(from, Direction::Forward));
        match iterator.next() {
            Some(item) => {
                let (key, value) = item
                    .map_err(|e| KVStoreError::RocksDBError(format!("Failed to iterate: {}", e)))?;
                if key.starts_with(prefix) {
                    Ok(Some((key.to_vec(), value.to_vec())))
                } else {
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let mut results = Vec::new();
        let iterator = self.db.iterator(IteratorMode::From(prefix, Direction::Forward));

        for item in iterator {
            let (key, value) = item
                .map_err(|e| KVStoreError::RocksDBError(format!("Failed to iterate: {}", e)))?;

            if key.starts_with(prefix) {
                results.push((key.to_vec(), value.to_vec()));
            } else {
                // We've moved past the prefix
                break;
            }
        }

        Ok(results)
    }

    fn flush(&self) -> Result<(), KVStoreError> {
        self.db.flush()
            .map_err(|e| KVStoreError::RocksDBError(format!("Failed to flush: {}", e)))
    }
}

/// In-memory KVStore used for development nodes and tests
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, KVStoreError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, KVStoreError> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>, KVStoreError> {
        self.entries.read().map_err(|_| KVStoreError::LockPoisoned("memory store".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>, KVStoreError> {
        self.entries.write().map_err(|_| KVStoreError::LockPoisoned("memory store".to_string()))
    }
}

impl KVStore for MemoryStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.write()?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.read()?.get(key).cloned())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.write()?.remove(key);
        Ok(())
    }

    fn write_batch(&self, operations: Vec<WriteBatchOperation>) -> Result<(), KVStoreError> {
        let mut entries = self.write()?;
        for op in operations {
            match op {
                WriteBatchOperation::Put { key, value } => {
                    entries.insert(key, value);
                },
                WriteBatchOperation::Delete { key } => {
                    entries.remove(&key);
                },
            }
        }
        Ok(())
    }

    fn seek(&self, from: &[u8], prefix: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let entries = self.read()?;
        Ok(entries
            .range::<[u8], _>((Bound::Included(from), Bound::Unbounded))
            .next()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone())))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let entries = self.read()?;
        Ok(entries
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn flush(&self) -> Result<(), KVStoreError> {
        Ok(())
    }
}
