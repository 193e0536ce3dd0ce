use crate::ovm::Property;
use crate::types::{Address, Range, H256, U256};

/// A block root was accepted by the commitment contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSubmittedEvent {
    pub block_number: U256,
    pub root: H256,
}

/// Coins were locked in a deposit contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositedEvent {
    pub deposit_contract_address: Address,
    pub checkpoint_id: H256,
    pub range: Range,
    pub state_object: Property,
    /// Block the deposit was made at
    pub block_number: U256,
}

/// Dispute game activity on the adjudication contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdjudicationEvent {
    /// A property was claimed and a game opened for it
    NewPropertyClaimed { game_id: H256, property: Property, created_block: U256 },

    /// A game was challenged by another game
    ChallengeAdded { game_id: H256, challenge_game_id: H256 },

    /// A game was decided
    ClaimDecided { game_id: H256, decision: bool },
}
