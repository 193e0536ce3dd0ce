use ed25519_dalek::{Keypair, PublicKey, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

use crate::crypto::hash::Hasher;
use crate::types::Address;

/// Ed25519 keypair owning coins on the Plasma chain
pub struct Ed25519Keypair {
    /// Public key for verification
    pub public: PublicKey,

    /// Secret key for signing
    pub secret: SecretKey,
}

impl Ed25519Keypair {
    /// Generate a new random keypair
    pub fn generate() -> Result<Self, ed25519_dalek::SignatureError> {
        // Seeding through RngCore sidesteps the rand_core version dalek 1.x expects
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::from_bytes(&seed)
    }

    /// Create a keypair from secret key bytes
    pub fn from_bytes(secret_bytes: &[u8]) -> Result<Self, ed25519_dalek::SignatureError> {
        let secret = SecretKey::from_bytes(secret_bytes)?;
        let public = PublicKey::from(&secret);

        Ok(Self { public, secret })
    }

    /// Get the keypair as a dalek Keypair for signing
    pub fn as_dalek_keypair(&self) -> Result<Keypair, ed25519_dalek::SignatureError> {
        let mut keypair_bytes = [0u8; 64];
        keypair_bytes[..32].copy_from_slice(self.secret.as_bytes());
        keypair_bytes[32..].copy_from_slice(self.public.as_bytes());
        Keypair::from_bytes(&keypair_bytes)
    }

    /// Export the public key as bytes
    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Address derived from this keypair's public key
    pub fn address(&self, hasher: &dyn Hasher) -> Address {
        address_from_pubkey(hasher, &self.public_bytes())
    }
}

impl fmt::Debug for Ed25519Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Keypair({})", hex::encode(self.public.as_bytes()))
    }
}

/// Derive an address from a public key: the last 20 bytes of its hash
pub fn address_from_pubkey(hasher: &dyn Hasher, pubkey: &[u8]) -> Address {
    let hash = hasher.hash(pubkey);
    Address::from_slice(&hash.as_bytes()[12..])
}
