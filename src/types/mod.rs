//! Primitive types shared across the Plasma core.
//!
//! Coin amounts and block numbers are 256-bit unsigned integers, addresses are
//! 20 bytes and hashes are 32 bytes, matching the on-chain representation.

pub mod range;

pub use ethereum_types::{H160, H256, U256};
pub use range::{Range, RangeError};

/// 20-byte account or contract address
pub type Address = H160;

/// The largest representable number, used as the right-most interval sentinel
pub const MAX_NUMBER: U256 = U256::MAX;

/// The largest representable address, used as the right-most address sentinel
pub fn max_address() -> Address {
    Address::repeat_byte(0xff)
}

/// Encode a number as 32 big-endian bytes
pub fn u256_to_be_bytes(value: &U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    bytes
}

/// Decode a number from at most 32 big-endian bytes
pub fn u256_from_be_bytes(bytes: &[u8]) -> Option<U256> {
    if bytes.len() > 32 {
        return None;
    }
    Some(U256::from_big_endian(bytes))
}

/// Hex-encode bytes with a `0x` prefix
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode hex with or without a `0x` prefix
pub fn from_hex(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(stripped)
}

/// Parse a 20-byte address from hex
pub fn address_from_hex(value: &str) -> Result<Address, hex::FromHexError> {
    let bytes = from_hex(value)?;
    if bytes.len() != 20 {
        return Err(hex::FromHexError::InvalidStringLength);
    }
    Ok(Address::from_slice(&bytes))
}
