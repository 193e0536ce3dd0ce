use ed25519_dalek::{PublicKey, Signature, Signer as _, Verifier as _};
use std::convert::TryFrom;
use std::sync::Arc;

use crate::crypto::hash::Hasher;
use crate::crypto::keys::{address_from_pubkey, Ed25519Keypair};
use crate::types::Address;

/// Length of an Ed25519 witness: public key followed by the signature
pub const ED25519_WITNESS_LENGTH: usize = 32 + 64;

/// Errors from signing or parsing signatures
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// Malformed key or signature bytes
    #[error("Malformed signature: {0}")]
    Malformed(String),

    /// Error reported by the underlying signature scheme
    #[error("Signature scheme error: {0}")]
    Scheme(#[from] ed25519_dalek::SignatureError),
}

/// Produces signatures over messages for one address
pub trait Signer: Send + Sync {
    /// Address whose ownership this signer proves
    fn address(&self) -> Address;

    /// Sign a message, returning the witness bytes a verifier accepts
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignatureError>;
}

/// Checks that a message was signed by the holder of an address
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, message: &[u8], signature: &[u8], address: &Address) -> Result<bool, SignatureError>;
}

/// Ed25519 signer; its witness embeds the public key so addresses can be checked
pub struct Ed25519Signer {
    keypair: Ed25519Keypair,
    address: Address,
}

impl Ed25519Signer {
    pub fn new(keypair: Ed25519Keypair, hasher: &dyn Hasher) -> Self {
        let address = keypair.address(hasher);
        Self { keypair, address }
    }
}

impl Signer for Ed25519Signer {
    fn address(&self) -> Address {
        self.address
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let signature = self.keypair.as_dalek_keypair()?.sign(message);

        let mut witness = Vec::with_capacity(ED25519_WITNESS_LENGTH);
        witness.extend_from_slice(&self.keypair.public_bytes());
        witness.extend_from_slice(&signature.to_bytes());
        Ok(witness)
    }
}

/// Verifies `public_key(32) || signature(64)` witnesses
pub struct Ed25519Verifier {
    hasher: Arc<dyn Hasher>,
}

impl Ed25519Verifier {
    pub fn new(hasher: Arc<dyn Hasher>) -> Self {
        Self { hasher }
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, message: &[u8], signature: &[u8], address: &Address) -> Result<bool, SignatureError> {
        if signature.len() != ED25519_WITNESS_LENGTH {
            return Err(SignatureError::Malformed(format!(
                "expected {} bytes, got {}",
                ED25519_WITNESS_LENGTH,
                signature.len()
            )));
        }
        let (public_bytes, signature_bytes) = signature.split_at(32);

        if address_from_pubkey(self.hasher.as_ref(), public_bytes) != *address {
            return Ok(false);
        }

        let public_key = PublicKey::from_bytes(public_bytes)?;
        let signature = Signature::try_from(signature_bytes)?;
        Ok(public_key.verify(message, &signature).is_ok())
    }
}
