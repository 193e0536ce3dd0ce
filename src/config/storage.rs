use serde::{Serialize, Deserialize};

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database path
    pub db_path: String,

    /// Create the database if it does not exist
    pub create_if_missing: bool,

    /// Maximum open files
    pub max_open_files: i32,

    /// Enable compression
    pub enable_compression: bool,

    /// Keep everything in memory instead of opening RocksDB
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/ovm-plasma/db".to_string(),
            create_if_missing: true,
            max_open_files: 1000,
            enable_compression: true,
            in_memory: false,
        }
    }
}
