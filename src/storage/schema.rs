use crate::types::{u256_to_be_bytes, Address, U256};

/// Namespace and key layout of the aggregator database.
///
/// Every component receives the root [`RangeStore`](super::RangeStore) and
/// derives its own namespaces from the names below, so two components never
/// share a namespace by accident.
pub struct Schema;

impl Schema {
    // State manager namespaces

    /// Live StateUpdates, one child namespace per deposit contract
    pub const STATE_UPDATES: &'static [u8] = b"state_updates";

    /// StateUpdates being exited, one child namespace per deposit contract
    pub const EXITS: &'static [u8] = b"exit";

    /// Finalised StateUpdates by checkpoint id
    pub const CHECKPOINTS: &'static [u8] = b"checkpoints";

    /// Deposit contracts that hold at least one StateUpdate
    pub const DEPOSIT_CONTRACTS: &'static [u8] = b"deposit_contracts";

    // Witness namespaces, addressed by hint strings

    pub const SIGNATURES: &'static str = "signatures";
    pub const TRANSACTIONS: &'static str = "tx";
    pub const PREV_BLOCK_NUMBERS: &'static str = "prevBlockNumbers";

    // Block manager namespaces

    pub const BLOCKS: &'static [u8] = b"blocks";
    pub const PENDING: &'static [u8] = b"pending";
    pub const TOKENS: &'static [u8] = b"tokens";
    pub const META: &'static [u8] = b"meta";

    /// Key of the committed block counter inside [`Schema::META`]
    pub const BLOCK_NUMBER_KEY: &'static [u8] = b"block_number";

    // Commitment contract namespace

    pub const COMMITMENTS: &'static [u8] = b"commitments";

    /// Key of a block, or of a block number used as a bucket name
    pub fn block_key(block_number: &U256) -> [u8; 32] {
        u256_to_be_bytes(block_number)
    }

    /// Bucket name of a deposit contract or token
    pub fn address_key(address: &Address) -> [u8; 20] {
        address.to_fixed_bytes()
    }

    /// Split a dotted hint bucket path into bucket names
    pub fn bucket_path(path: &str) -> Vec<&str> {
        path.split('.').filter(|name| !name.is_empty()).collect()
    }
}
