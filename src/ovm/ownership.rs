use async_trait::async_trait;

use super::decider::{Challenge, Decider, DeciderError, DeciderManager, Decision};
use super::property::Property;
use super::signed_by::SignedByDecider;
use crate::codec::{decode, encode, Coder};
use crate::types::Address;

/// Decides `Ownership(owner, tx)`: the owner signed the transaction spending
/// the state object
pub struct OwnershipDecider {
    signed_by_address: Address,
}

impl OwnershipDecider {
    pub fn new(signed_by_address: Address) -> Self {
        Self { signed_by_address }
    }

    /// The state object granting `owner` a range
    pub fn property(decider_address: Address, owner: &Address, coder: &dyn Coder) -> Property {
        Property::new(decider_address, vec![encode(coder, owner)])
    }

    /// Owner named by an ownership state object, if `property` is one
    pub fn owner_of(property: &Property, decider_address: &Address, coder: &dyn Coder) -> Option<Address> {
        if property.decider_address != *decider_address {
            return None;
        }
        property.inputs.first().and_then(|input| decode(coder, input).ok())
    }
}

#[async_trait]
impl Decider for OwnershipDecider {
    async fn decide(&self, manager: &DeciderManager, inputs: &[Vec<u8>]) -> Result<Decision, DeciderError> {
        let (owner, tx) = match inputs {
            [owner, tx] => (owner, tx),
            _ => return Err(DeciderError::InvalidInputs(format!("Ownership takes 2 inputs, got {}", inputs.len()))),
        };
        let owner: Address = decode(manager.coder(), owner)?;
        let signed_by = SignedByDecider::property(self.signed_by_address, tx.clone(), &owner, manager.coder());
        let decision = manager.decide(&signed_by).await?;
        if decision.outcome {
            return Ok(decision);
        }
        // refuted by the missing signature
        Ok(Decision::new(false).with_challenge(Challenge { property: signed_by, challenge_inputs: Vec::new() }))
    }

    fn name(&self) -> &'static str {
        "Ownership"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::codec::JsonCoder;
    use crate::crypto::{Ed25519Keypair, Ed25519Signer, Ed25519Verifier, Hasher, Keccak256Hasher, Signer};
    use crate::ovm::witness::WitnessDb;
    use crate::storage::{MemoryStore, RangeStore};

    fn ownership() -> Address {
        Address::from_low_u64_be(1)
    }

    fn signed_by() -> Address {
        Address::from_low_u64_be(2)
    }

    fn manager() -> DeciderManager {
        let hasher: Arc<dyn Hasher> = Arc::new(Keccak256Hasher);
        let coder: Arc<dyn Coder> = Arc::new(JsonCoder);
        let witness_db = WitnessDb::new(RangeStore::new(Arc::new(MemoryStore::new())), coder.clone());
        let mut manager = DeciderManager::new(witness_db, coder);
        manager.register(signed_by(), Arc::new(SignedByDecider::new(Arc::new(Ed25519Verifier::new(hasher)))));
        manager.register(ownership(), Arc::new(OwnershipDecider::new(signed_by())));
        manager
    }

    #[test]
    fn test_owner_of() {
        let owner = Address::from_low_u64_be(0xa11ce);
        let property = OwnershipDecider::property(ownership(), &owner, &JsonCoder);
        assert_eq!(OwnershipDecider::owner_of(&property, &ownership(), &JsonCoder), Some(owner));
        assert_eq!(OwnershipDecider::owner_of(&property, &signed_by(), &JsonCoder), None);
    }

    #[tokio::test]
    async fn test_owner_signature_decides_ownership() {
        let manager = manager();
        let alice = Ed25519Signer::new(Ed25519Keypair::from_bytes(&[1u8; 32]).unwrap(), &Keccak256Hasher);
        let tx = b"encoded transaction".to_vec();

        let state_object = OwnershipDecider::property(ownership(), &alice.address(), manager.coder());
        let claim = state_object.with_input(tx.clone());
        let refuted = manager.decide(&claim).await.unwrap();
        assert!(!refuted.outcome);
        assert_eq!(refuted.challenges.len(), 1);
        assert_eq!(refuted.challenges[0].property.decider_address, signed_by());

        let signature = alice.sign(&tx).unwrap();
        manager.witness_db().put_witness(&SignedByDecider::signature_hint(&tx), &signature).unwrap();
        assert!(manager.decide(&claim).await.unwrap().outcome);
    }
}
