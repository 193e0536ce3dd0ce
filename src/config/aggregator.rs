use serde::{Serialize, Deserialize};

use super::ConfigError;
use crate::crypto::hasher_by_name;
use crate::types::{address_from_hex, Address};

/// Aggregator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Delay between block generation attempts in milliseconds
    pub block_interval_ms: u64,

    /// Total time spent retrying a root submission in milliseconds
    pub submit_retry_max_elapsed_ms: u64,

    /// Hash function of the block trees: "keccak256" or "sha256"
    pub hash_algorithm: String,

    /// Deposit contracts registered as tokens at start-up
    pub deposit_contracts: Vec<String>,

    /// Address of the ownership decider
    pub ownership_predicate: String,

    /// Address of the signed-by decider
    pub signed_by_predicate: String,

    /// Decider address recorded in produced StateUpdates
    pub state_update_predicate: String,

    /// Address of the exit predicate whose claims start exits
    pub exit_predicate: String,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            block_interval_ms: 10_000,
            submit_retry_max_elapsed_ms: 60_000,
            hash_algorithm: "keccak256".to_string(),
            deposit_contracts: Vec::new(),
            ownership_predicate: format!("0x{}", "00".repeat(19) + "01"),
            signed_by_predicate: format!("0x{}", "00".repeat(19) + "02"),
            state_update_predicate: format!("0x{}", "00".repeat(19) + "03"),
            exit_predicate: format!("0x{}", "00".repeat(19) + "04"),
        }
    }
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, ConfigError> {
    address_from_hex(value).map_err(|e| ConfigError::Invalid { field, reason: e.to_string() })
}

impl AggregatorConfig {
    /// Check every field that is parsed lazily by the node
    pub fn validate(&self) -> Result<(), ConfigError> {
        if hasher_by_name(&self.hash_algorithm).is_none() {
            return Err(ConfigError::Invalid {
                field: "hash_algorithm",
                reason: format!("unknown hash algorithm {}", self.hash_algorithm),
            });
        }
        if self.block_interval_ms == 0 {
            return Err(ConfigError::Invalid { field: "block_interval_ms", reason: "must be positive".to_string() });
        }
        self.deposit_contract_addresses()?;
        self.ownership_predicate_address()?;
        self.signed_by_predicate_address()?;
        self.state_update_predicate_address()?;
        self.exit_predicate_address()?;
        Ok(())
    }

    pub fn deposit_contract_addresses(&self) -> Result<Vec<Address>, ConfigError> {
        self.deposit_contracts.iter().map(|value| parse_address("deposit_contracts", value)).collect()
    }

    pub fn ownership_predicate_address(&self) -> Result<Address, ConfigError> {
        parse_address("ownership_predicate", &self.ownership_predicate)
    }

    pub fn signed_by_predicate_address(&self) -> Result<Address, ConfigError> {
        parse_address("signed_by_predicate", &self.signed_by_predicate)
    }

    pub fn state_update_predicate_address(&self) -> Result<Address, ConfigError> {
        parse_address("state_update_predicate", &self.state_update_predicate)
    }

    pub fn exit_predicate_address(&self) -> Result<Address, ConfigError> {
        parse_address("exit_predicate", &self.exit_predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = AggregatorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.ownership_predicate_address().unwrap(), Address::from_low_u64_be(1));
    }

    #[test]
    fn test_bad_address_is_rejected() {
        let config = AggregatorConfig { deposit_contracts: vec!["0x1234".to_string()], ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "deposit_contracts", .. })));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: AggregatorConfig = toml::from_str("block_interval_ms = 500").unwrap();
        assert_eq!(config.block_interval_ms, 500);
        assert_eq!(config.exit_predicate_address().unwrap(), Address::from_low_u64_be(4));
    }
}
