use std::fmt;

use super::MerkleError;
use crate::codec::{Codable, CodecError, Encodable, Kind};
use crate::crypto::hash::Hasher;
use crate::types::{max_address, u256_to_be_bytes, Address, H256, MAX_NUMBER, U256};

/// A node of a Merkle tree whose leaves are ordered by an interval key.
///
/// `key` is the lower bound of the interval the node covers; the upper bound is
/// implied by the key of the next node in order.
pub trait MerkleNode: Clone + PartialEq + fmt::Debug + Send + Sync {
    type Key: Ord + Copy + fmt::Debug + Send + Sync;

    fn new(key: Self::Key, data: H256) -> Self;

    fn key(&self) -> Self::Key;

    fn data(&self) -> H256;

    /// Fixed byte layout hashed into parents: `data || key`
    fn encode(&self) -> Vec<u8>;

    /// Sentinel key right of every real key
    fn max_key() -> Self::Key;

    /// Node paired with the last node of an odd-length level
    fn empty(hasher: &dyn Hasher) -> Self {
        Self::new(Self::max_key(), hasher.hash(&[0u8; 32]))
    }
}

pub(crate) fn hash_from_slice(data: &[u8]) -> Result<H256, MerkleError> {
    if data.len() != 32 {
        return Err(MerkleError::InvalidDataLength(data.len()));
    }
    Ok(H256::from_slice(data))
}

/// Node of a tree keyed by range start
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IntervalTreeNode {
    pub start: U256,
    pub data: H256,
}

impl IntervalTreeNode {
    pub fn from_slice(start: U256, data: &[u8]) -> Result<Self, MerkleError> {
        Ok(Self { start, data: hash_from_slice(data)? })
    }
}

impl MerkleNode for IntervalTreeNode {
    type Key = U256;

    fn new(key: U256, data: H256) -> Self {
        Self { start: key, data }
    }

    fn key(&self) -> U256 {
        self.start
    }

    fn data(&self) -> H256 {
        self.data
    }

    fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(self.data.as_bytes());
        bytes.extend_from_slice(&u256_to_be_bytes(&self.start));
        bytes
    }

    fn max_key() -> U256 {
        MAX_NUMBER
    }
}

impl fmt::Debug for IntervalTreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntervalTreeNode({}, 0x{})", self.start, hex::encode(self.data.as_bytes()))
    }
}

impl Encodable for IntervalTreeNode {
    fn kind() -> Kind {
        Kind::structure(&[("start", Kind::BigNumber), ("data", Kind::FixedBytes(32))])
    }

    fn to_codable(&self) -> Codable {
        Codable::structure(vec![("start", Codable::BigNumber(self.start)), ("data", Codable::hash(&self.data))])
    }

    fn from_codable(value: Codable) -> Result<Self, CodecError> {
        let mut fields = value.into_fields(2)?;
        Ok(Self { start: fields.next_big_number()?, data: fields.next_h256()? })
    }
}

/// Node of a tree keyed by address
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AddressTreeNode {
    pub address: Address,
    pub data: H256,
}

impl AddressTreeNode {
    pub fn from_slice(address: Address, data: &[u8]) -> Result<Self, MerkleError> {
        Ok(Self { address, data: hash_from_slice(data)? })
    }
}

impl MerkleNode for AddressTreeNode {
    type Key = Address;

    fn new(key: Address, data: H256) -> Self {
        Self { address: key, data }
    }

    fn key(&self) -> Address {
        self.address
    }

    fn data(&self) -> H256 {
        self.data
    }

    fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(52);
        bytes.extend_from_slice(self.data.as_bytes());
        bytes.extend_from_slice(self.address.as_bytes());
        bytes
    }

    fn max_key() -> Address {
        max_address()
    }
}

impl fmt::Debug for AddressTreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AddressTreeNode({:?}, 0x{})", self.address, hex::encode(self.data.as_bytes()))
    }
}

impl Encodable for AddressTreeNode {
    fn kind() -> Kind {
        Kind::structure(&[("address", Kind::Address), ("data", Kind::FixedBytes(32))])
    }

    fn to_codable(&self) -> Codable {
        Codable::structure(vec![("address", Codable::Address(self.address)), ("data", Codable::hash(&self.data))])
    }

    fn from_codable(value: Codable) -> Result<Self, CodecError> {
        let mut fields = value.into_fields(2)?;
        Ok(Self { address: fields.next_address()?, data: fields.next_h256()? })
    }
}
