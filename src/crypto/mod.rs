// Cryptographic primitives for the Plasma core:
// - pluggable hashing for Merkle trees and witness keys
// - Ed25519 keys and address derivation
// - signing and signature verification capabilities

pub mod hash;
pub mod keys;
pub mod signer;

pub use hash::{hasher_by_name, keccak256, sha256, Hasher, Keccak256Hasher, Sha256Hasher};
pub use keys::{address_from_pubkey, Ed25519Keypair};
pub use signer::{Ed25519Signer, Ed25519Verifier, SignatureError, SignatureVerifier, Signer};
