use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use super::hint::HintError;
use super::property::Property;
use super::witness::WitnessDb;
use crate::codec::{Coder, CodecError};
use crate::crypto::SignatureError;
use crate::types::Address;

/// Decider error type
#[derive(Debug, thiserror::Error)]
pub enum DeciderError {
    /// No decider is registered at the property's address
    #[error("No decider registered at {0:?}")]
    UnknownDecider(Address),

    /// The property inputs do not fit the decider
    #[error("Invalid inputs: {0}")]
    InvalidInputs(String),

    /// Codec error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Witness lookup failed
    #[error("Hint error: {0}")]
    Hint(#[from] HintError),

    /// Signature error
    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),
}

/// A sub-property that would refute the decided property if it were true
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub property: Property,
    pub challenge_inputs: Vec<Vec<u8>>,
}

/// Outcome of deciding a property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: bool,
    pub witnesses: Vec<Vec<u8>>,
    pub challenges: Vec<Challenge>,
}

impl Decision {
    pub fn new(outcome: bool) -> Self {
        Self { outcome, witnesses: Vec::new(), challenges: Vec::new() }
    }

    pub fn with_witnesses(mut self, witnesses: Vec<Vec<u8>>) -> Self {
        self.witnesses = witnesses;
        self
    }

    pub fn with_challenge(mut self, challenge: Challenge) -> Self {
        self.challenges.push(challenge);
        self
    }
}

/// A predicate implementation
#[async_trait]
pub trait Decider: Send + Sync {
    /// Decide the property made of this decider's address and `inputs`
    async fn decide(&self, manager: &DeciderManager, inputs: &[Vec<u8>]) -> Result<Decision, DeciderError>;

    /// Get the decider name
    fn name(&self) -> &'static str;
}

/// Registry dispatching properties to deciders by address
pub struct DeciderManager {
    /// Deciders by address
    deciders: HashMap<Address, Arc<dyn Decider>>,

    /// Witness store consulted by deciders
    witness_db: WitnessDb,

    /// Coder for property inputs
    coder: Arc<dyn Coder>,
}

impl DeciderManager {
    /// Create a new decider manager
    pub fn new(witness_db: WitnessDb, coder: Arc<dyn Coder>) -> Self {
        Self { deciders: HashMap::new(), witness_db, coder }
    }

    /// Register a decider
    pub fn register(&mut self, address: Address, decider: Arc<dyn Decider>) {
        debug!("Registered decider {} at {:?}", decider.name(), address);
        self.deciders.insert(address, decider);
    }

    /// Get a decider by address
    pub fn get(&self, address: &Address) -> Option<Arc<dyn Decider>> {
        self.deciders.get(address).cloned()
    }

    pub fn witness_db(&self) -> &WitnessDb {
        &self.witness_db
    }

    pub fn coder(&self) -> &dyn Coder {
        self.coder.as_ref()
    }

    /// Decide `property` with the decider registered at its address
    pub async fn decide(&self, property: &Property) -> Result<Decision, DeciderError> {
        let decider = self
            .get(&property.decider_address)
            .ok_or(DeciderError::UnknownDecider(property.decider_address))?;
        let decision = decider.decide(self, &property.inputs).await?;
        debug!("{} decided {:?}: {}", decider.name(), property, decision.outcome);
        Ok(decision)
    }
}
