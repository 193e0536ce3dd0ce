use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

use crate::types::H256;

/// Pluggable 32-byte hash function used by trees, blocks and witness keys
pub trait Hasher: Send + Sync {
    /// Hash arbitrary bytes into 32 bytes
    fn hash(&self, data: &[u8]) -> H256;

    /// Short algorithm name, used in configuration
    fn name(&self) -> &'static str;
}

/// Keccak-256, the default and the one on-chain verifiers use
#[derive(Clone, Copy, Default)]
pub struct Keccak256Hasher;

impl Hasher for Keccak256Hasher {
    fn hash(&self, data: &[u8]) -> H256 {
        keccak_hash::keccak(data)
    }

    fn name(&self) -> &'static str {
        "keccak256"
    }
}

/// SHA-256
#[derive(Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn hash(&self, data: &[u8]) -> H256 {
        H256::from(sha256(data))
    }

    fn name(&self) -> &'static str {
        "sha256"
    }
}

impl fmt::Debug for dyn Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hasher({})", self.name())
    }
}

/// Look up a hasher by its configuration name
pub fn hasher_by_name(name: &str) -> Option<Arc<dyn Hasher>> {
    match name {
        "keccak256" => Some(Arc::new(Keccak256Hasher)),
        "sha256" => Some(Arc::new(Sha256Hasher)),
        _ => None,
    }
}

/// Compute Keccak-256 of data
pub fn keccak256(data: &[u8]) -> H256 {
    Keccak256Hasher.hash(data)
}

/// Compute SHA-256 hash of data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();

    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}
