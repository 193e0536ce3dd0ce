use serde::{Serialize, Deserialize};

/// Node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory
    pub data_dir: String,

    /// Log level, used when RUST_LOG is not set
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data/ovm-plasma".to_string(),
            log_level: "info".to_string(),
        }
    }
}
