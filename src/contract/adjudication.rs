use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio::sync::{mpsc, Mutex};

use super::{AdjudicationContract, AdjudicationEvent, CommitmentContract, ContractError, Subscribers};
use crate::codec::{encode, Coder};
use crate::crypto::Hasher;
use crate::ovm::Property;
use crate::types::H256;

struct Game {
    challenges: Vec<H256>,
    decision: Option<bool>,
}

/// In-process adjudication contract; games are decided by calling [`LocalAdjudicationContract::decide_claim`]
pub struct LocalAdjudicationContract {
    games: Mutex<HashMap<H256, Game>>,
    commitment: Arc<dyn CommitmentContract>,
    subscribers: Subscribers<AdjudicationEvent>,
    coder: Arc<dyn Coder>,
    hasher: Arc<dyn Hasher>,
}

impl LocalAdjudicationContract {
    pub fn new(commitment: Arc<dyn CommitmentContract>, coder: Arc<dyn Coder>, hasher: Arc<dyn Hasher>) -> Self {
        Self { games: Mutex::new(HashMap::new()), commitment, subscribers: Subscribers::new(), coder, hasher }
    }

    /// Game id of a claimed property
    pub fn game_id(&self, property: &Property) -> H256 {
        self.hasher.hash(&encode(self.coder.as_ref(), property))
    }

    pub async fn add_challenge(&self, game_id: H256, challenge_game_id: H256) -> Result<(), ContractError> {
        let mut games = self.games.lock().await;
        if !games.contains_key(&challenge_game_id) {
            return Err(ContractError::Rejected(format!("unknown challenge game {:?}", challenge_game_id)));
        }
        let game = games.get_mut(&game_id).ok_or_else(|| ContractError::Rejected(format!("unknown game {:?}", game_id)))?;
        game.challenges.push(challenge_game_id);
        self.subscribers.notify(AdjudicationEvent::ChallengeAdded { game_id, challenge_game_id });
        Ok(())
    }

    pub async fn decide_claim(&self, game_id: H256, decision: bool) -> Result<(), ContractError> {
        let mut games = self.games.lock().await;
        let game = games.get_mut(&game_id).ok_or_else(|| ContractError::Rejected(format!("unknown game {:?}", game_id)))?;
        if game.decision.is_some() {
            return Err(ContractError::Rejected(format!("game {:?} already decided", game_id)));
        }
        game.decision = Some(decision);
        info!("Game {:?} decided {} with {} challenges", game_id, decision, game.challenges.len());
        self.subscribers.notify(AdjudicationEvent::ClaimDecided { game_id, decision });
        Ok(())
    }
}

#[async_trait]
impl AdjudicationContract for LocalAdjudicationContract {
    async fn claim_property(&self, property: Property) -> Result<H256, ContractError> {
        let game_id = self.game_id(&property);
        let created_block = self.commitment.get_current_block().await?;
        let mut games = self.games.lock().await;
        if games.contains_key(&game_id) {
            return Err(ContractError::Rejected(format!("property already claimed as {:?}", game_id)));
        }
        games.insert(game_id, Game { challenges: Vec::new(), decision: None });
        info!("Property {:?} claimed as game {:?}", property, game_id);
        self.subscribers.notify(AdjudicationEvent::NewPropertyClaimed { game_id, property, created_block });
        Ok(game_id)
    }

    async fn get_decision(&self, game_id: H256) -> Result<Option<bool>, ContractError> {
        Ok(self.games.lock().await.get(&game_id).and_then(|game| game.decision))
    }

    fn subscribe_events(&self) -> mpsc::UnboundedReceiver<AdjudicationEvent> {
        self.subscribers.subscribe()
    }
}
