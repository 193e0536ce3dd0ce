use std::sync::Arc;

use async_trait::async_trait;

use super::decider::{Decider, DeciderError, DeciderManager, Decision};
use super::hint::replace_hint;
use super::property::Property;
use crate::codec::{decode, encode, Coder};
use crate::crypto::SignatureVerifier;
use crate::types::Address;
use crate::storage::Schema;

/// Decides `SignedBy(message, signer)`: true when a stored signature over
/// `message` verifies for `signer`
pub struct SignedByDecider {
    verifier: Arc<dyn SignatureVerifier>,
}

impl SignedByDecider {
    pub fn new(verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self { verifier }
    }

    /// Build the property asking whether `signer` signed `message`
    pub fn property(decider_address: Address, message: Vec<u8>, signer: &Address, coder: &dyn Coder) -> Property {
        Property::new(decider_address, vec![message, encode(coder, signer)])
    }

    /// Hint under which signatures over `message` are stored
    pub fn signature_hint(message: &[u8]) -> String {
        replace_hint(&format!("{},KEY,${{message}}", Schema::SIGNATURES), &[("message", message)])
    }
}

#[async_trait]
impl Decider for SignedByDecider {
    async fn decide(&self, manager: &DeciderManager, inputs: &[Vec<u8>]) -> Result<Decision, DeciderError> {
        let (message, signer) = match inputs {
            [message, signer] => (message, signer),
            _ => return Err(DeciderError::InvalidInputs(format!("SignedBy takes 2 inputs, got {}", inputs.len()))),
        };
        let signer: Address = decode(manager.coder(), signer)?;

        for signature in manager.witness_db().get_witnesses(&Self::signature_hint(message))? {
            if self.verifier.verify(message, &signature, &signer)? {
                return Ok(Decision::new(true).with_witnesses(vec![signature]));
            }
        }
        Ok(Decision::new(false))
    }

    fn name(&self) -> &'static str {
        "SignedBy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCoder;
    use crate::crypto::{Ed25519Keypair, Ed25519Signer, Ed25519Verifier, Hasher, Keccak256Hasher, Signer};
    use crate::ovm::witness::WitnessDb;
    use crate::storage::{MemoryStore, RangeStore};

    const SIGNED_BY: u64 = 2;

    fn setup() -> (DeciderManager, Ed25519Signer) {
        let hasher: Arc<dyn Hasher> = Arc::new(Keccak256Hasher);
        let coder: Arc<dyn Coder> = Arc::new(JsonCoder);
        let witness_db = WitnessDb::new(RangeStore::new(Arc::new(MemoryStore::new())), coder.clone());
        let mut manager = DeciderManager::new(witness_db, coder);
        manager.register(
            Address::from_low_u64_be(SIGNED_BY),
            Arc::new(SignedByDecider::new(Arc::new(Ed25519Verifier::new(hasher.clone())))),
        );
        let signer = Ed25519Signer::new(Ed25519Keypair::from_bytes(&[7u8; 32]).unwrap(), hasher.as_ref());
        (manager, signer)
    }

    #[tokio::test]
    async fn test_signed_message_decides_true() {
        let (manager, signer) = setup();
        let message = b"message".to_vec();
        let signature = signer.sign(&message).unwrap();
        manager.witness_db().put_witness(&SignedByDecider::signature_hint(&message), &signature).unwrap();

        let property = SignedByDecider::property(
            Address::from_low_u64_be(SIGNED_BY),
            message,
            &signer.address(),
            manager.coder(),
        );
        let decision = manager.decide(&property).await.unwrap();
        assert!(decision.outcome);
        assert_eq!(decision.witnesses, vec![signature]);
    }

    #[tokio::test]
    async fn test_missing_or_foreign_signature_decides_false() {
        let (manager, signer) = setup();
        let message = b"message".to_vec();
        let property = SignedByDecider::property(
            Address::from_low_u64_be(SIGNED_BY),
            message.clone(),
            &signer.address(),
            manager.coder(),
        );
        assert!(!manager.decide(&property).await.unwrap().outcome);

        // a valid signature, but by somebody else
        let other = Ed25519Signer::new(Ed25519Keypair::from_bytes(&[8u8; 32]).unwrap(), &Keccak256Hasher);
        let signature = other.sign(&message).unwrap();
        manager.witness_db().put_witness(&SignedByDecider::signature_hint(&message), &signature).unwrap();
        assert!(!manager.decide(&property).await.unwrap().outcome);
    }

    #[tokio::test]
    async fn test_wrong_arity_is_an_error() {
        let (manager, _) = setup();
        let property = Property::new(Address::from_low_u64_be(SIGNED_BY), vec![vec![1]]);
        assert!(matches!(manager.decide(&property).await, Err(DeciderError::InvalidInputs(_))));
    }
}
