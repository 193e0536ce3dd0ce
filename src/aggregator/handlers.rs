//! Request handlers behind the aggregator's client interface.
//!
//! Requests and responses carry coder-encoded structs as `0x` hex strings;
//! block numbers are decimal strings.

use log::debug;

use super::{Aggregator, AggregatorError};
use crate::codec::{decode, encode};
use crate::ovm::Property;
use crate::plasma::{SignedTransaction, StateUpdate};
use crate::types::{address_from_hex, from_hex, to_hex, U256};

fn parse_block_number(value: &str) -> Result<U256, AggregatorError> {
    U256::from_dec_str(value).map_err(|e| AggregatorError::InvalidRequest(format!("invalid block number {}: {:?}", value, e)))
}

fn parse_hex(value: &str) -> Result<Vec<u8>, AggregatorError> {
    from_hex(value).map_err(|e| AggregatorError::InvalidRequest(format!("invalid hex {}: {}", value, e)))
}

impl Aggregator {
    /// `send_tx`: ingest hex-encoded signed transactions, answering one
    /// hex-encoded receipt per transaction
    pub async fn handle_send_tx(&self, data: &[String]) -> Result<Vec<String>, AggregatorError> {
        let mut receipts = Vec::with_capacity(data.len());
        for encoded in data {
            let tx: SignedTransaction = decode(self.coder(), &parse_hex(encoded)?)?;
            let receipt = self.ingest_transaction(&tx).await?;
            receipts.push(to_hex(&encode(self.coder(), &receipt)));
        }
        Ok(receipts)
    }

    /// `sync_state`: hex-encoded properties of the StateUpdates owned by `address`
    pub fn handle_sync_state(&self, address: &str, block_number: Option<&str>) -> Result<Vec<String>, AggregatorError> {
        let owner = address_from_hex(address)
            .map_err(|e| AggregatorError::InvalidRequest(format!("invalid address {}: {}", address, e)))?;
        let block_number = block_number.map(parse_block_number).transpose()?;
        let owned = self.state_manager().query_ownership_state_updates(&self.ownership_predicate, &owner, block_number)?;
        debug!("sync_state for {:?}: {} state updates", owner, owned.len());
        Ok(owned
            .iter()
            .map(|state_update| to_hex(&encode(self.coder(), &state_update.property(self.coder()))))
            .collect())
    }

    /// `block`: the hex-encoded block, or `None` when it does not exist
    pub fn handle_get_block(&self, block_number: &str) -> Result<Option<String>, AggregatorError> {
        let block_number = parse_block_number(block_number)?;
        Ok(self.block_manager().get_block(&block_number)?.map(|block| to_hex(&encode(self.coder(), &block))))
    }

    /// `inclusion_proof`: the hex-encoded proof of a hex-encoded StateUpdate
    /// property, or `None` when the block or the StateUpdate is unknown
    pub fn handle_inclusion_proof(&self, block_number: &str, state_update: &str) -> Result<Option<String>, AggregatorError> {
        let block_number = parse_block_number(block_number)?;
        let property: Property = decode(self.coder(), &parse_hex(state_update)?)?;
        let state_update = StateUpdate::from_property(&property, self.coder())?;
        Ok(self
            .block_manager()
            .get_inclusion_proof(&block_number, &state_update)?
            .map(|proof| to_hex(&encode(self.coder(), &proof))))
    }
}
