//! Structured value encoding.
//!
//! Domain types map themselves onto the closed [`Codable`] sum type through
//! [`Encodable`]; a [`Coder`] turns `Codable` values into bytes and back. The
//! coder is injected into every component that persists or hashes values, so
//! swapping the wire format never touches domain code.

pub mod json;

use std::fmt;

use crate::types::{Address, Range, H256, U256};

pub use json::JsonCoder;

/// Errors raised while encoding or decoding structured values
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The bytes are not valid for the wire format
    #[error("Malformed input: {0}")]
    Malformed(String),

    /// A value did not have the shape its descriptor requires
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A fixed-size value had the wrong length
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// A decoded value violates a domain invariant
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Malformed(err.to_string())
    }
}

impl From<hex::FromHexError> for CodecError {
    fn from(err: hex::FromHexError) -> Self {
        CodecError::Malformed(err.to_string())
    }
}

/// Every value shape a coder knows how to serialise
#[derive(Clone, PartialEq, Eq)]
pub enum Codable {
    Integer(i64),
    BigNumber(U256),
    Address(Address),
    Bytes(Vec<u8>),
    FixedBytes(Vec<u8>),
    List(Vec<Codable>),
    Tuple(Vec<Codable>),
    Struct(Vec<(String, Codable)>),
}

/// Shape descriptor used to decode self-describing-less formats
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Integer,
    BigNumber,
    Address,
    Bytes,
    FixedBytes(usize),
    List(Box<Kind>),
    Tuple(Vec<Kind>),
    Struct(Vec<(String, Kind)>),
}

impl Kind {
    /// Build a struct descriptor from field names and kinds
    pub fn structure(fields: &[(&str, Kind)]) -> Kind {
        Kind::Struct(fields.iter().map(|(name, kind)| (name.to_string(), kind.clone())).collect())
    }

    pub fn list(element: Kind) -> Kind {
        Kind::List(Box::new(element))
    }
}

impl Codable {
    fn variant_name(&self) -> &'static str {
        match self {
            Codable::Integer(_) => "Integer",
            Codable::BigNumber(_) => "BigNumber",
            Codable::Address(_) => "Address",
            Codable::Bytes(_) => "Bytes",
            Codable::FixedBytes(_) => "FixedBytes",
            Codable::List(_) => "List",
            Codable::Tuple(_) => "Tuple",
            Codable::Struct(_) => "Struct",
        }
    }

    fn mismatch(&self, expected: &str) -> CodecError {
        CodecError::TypeMismatch { expected: expected.to_string(), found: self.variant_name().to_string() }
    }

    /// Build a struct value from field names and values
    pub fn structure(fields: Vec<(&str, Codable)>) -> Codable {
        Codable::Struct(fields.into_iter().map(|(name, value)| (name.to_string(), value)).collect())
    }

    pub fn hash(value: &H256) -> Codable {
        Codable::FixedBytes(value.as_bytes().to_vec())
    }

    pub fn into_integer(self) -> Result<i64, CodecError> {
        match self {
            Codable::Integer(value) => Ok(value),
            other => Err(other.mismatch("Integer")),
        }
    }

    pub fn into_big_number(self) -> Result<U256, CodecError> {
        match self {
            Codable::BigNumber(value) => Ok(value),
            other => Err(other.mismatch("BigNumber")),
        }
    }

    pub fn into_address(self) -> Result<Address, CodecError> {
        match self {
            Codable::Address(value) => Ok(value),
            other => Err(other.mismatch("Address")),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, CodecError> {
        match self {
            Codable::Bytes(value) => Ok(value),
            other => Err(other.mismatch("Bytes")),
        }
    }

    pub fn into_h256(self) -> Result<H256, CodecError> {
        match self {
            Codable::FixedBytes(value) if value.len() == 32 => Ok(H256::from_slice(&value)),
            Codable::FixedBytes(value) => Err(CodecError::InvalidLength { expected: 32, actual: value.len() }),
            other => Err(other.mismatch("FixedBytes")),
        }
    }

    pub fn into_list(self) -> Result<Vec<Codable>, CodecError> {
        match self {
            Codable::List(items) => Ok(items),
            other => Err(other.mismatch("List")),
        }
    }

    pub fn into_tuple(self) -> Result<Vec<Codable>, CodecError> {
        match self {
            Codable::Tuple(items) => Ok(items),
            other => Err(other.mismatch("Tuple")),
        }
    }

    /// Consume a struct, yielding its field values in declaration order
    pub fn into_fields(self, expected: usize) -> Result<Fields, CodecError> {
        match self {
            Codable::Struct(fields) if fields.len() == expected => {
                Ok(Fields { inner: fields.into_iter().map(|(_, value)| value).collect::<Vec<_>>().into_iter() })
            }
            Codable::Struct(fields) => Err(CodecError::InvalidValue(format!(
                "expected {} struct fields, got {}",
                expected,
                fields.len()
            ))),
            other => Err(other.mismatch("Struct")),
        }
    }
}

impl fmt::Debug for Codable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codable::Integer(value) => write!(f, "{}", value),
            Codable::BigNumber(value) => write!(f, "{}", value),
            Codable::Address(value) => write!(f, "{:?}", value),
            Codable::Bytes(value) | Codable::FixedBytes(value) => write!(f, "0x{}", hex::encode(value)),
            Codable::List(items) | Codable::Tuple(items) => f.debug_list().entries(items).finish(),
            Codable::Struct(fields) => {
                let mut debug = f.debug_map();
                for (name, value) in fields {
                    debug.entry(name, value);
                }
                debug.finish()
            }
        }
    }
}

/// Ordered reader over struct fields
pub struct Fields {
    inner: std::vec::IntoIter<Codable>,
}

impl Fields {
    pub fn next_value(&mut self) -> Result<Codable, CodecError> {
        self.inner.next().ok_or_else(|| CodecError::InvalidValue("missing struct field".to_string()))
    }

    pub fn next_integer(&mut self) -> Result<i64, CodecError> {
        self.next_value()?.into_integer()
    }

    pub fn next_big_number(&mut self) -> Result<U256, CodecError> {
        self.next_value()?.into_big_number()
    }

    pub fn next_address(&mut self) -> Result<Address, CodecError> {
        self.next_value()?.into_address()
    }

    pub fn next_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        self.next_value()?.into_bytes()
    }

    pub fn next_h256(&mut self) -> Result<H256, CodecError> {
        self.next_value()?.into_h256()
    }

    pub fn next_list(&mut self) -> Result<Vec<Codable>, CodecError> {
        self.next_value()?.into_list()
    }

    pub fn next_decoded<T: Encodable>(&mut self) -> Result<T, CodecError> {
        T::from_codable(self.next_value()?)
    }
}

/// Byte-level encoding capability injected into components
pub trait Coder: Send + Sync {
    fn encode(&self, value: &Codable) -> Vec<u8>;

    fn decode(&self, kind: &Kind, bytes: &[u8]) -> Result<Codable, CodecError>;
}

/// Mapping between a domain type and its structured representation
pub trait Encodable: Sized {
    fn kind() -> Kind;

    fn to_codable(&self) -> Codable;

    fn from_codable(value: Codable) -> Result<Self, CodecError>;
}

/// Encode a domain value with the given coder
pub fn encode<T: Encodable>(coder: &dyn Coder, value: &T) -> Vec<u8> {
    coder.encode(&value.to_codable())
}

/// Decode a domain value with the given coder
pub fn decode<T: Encodable>(coder: &dyn Coder, bytes: &[u8]) -> Result<T, CodecError> {
    T::from_codable(coder.decode(&T::kind(), bytes)?)
}

impl Encodable for Range {
    fn kind() -> Kind {
        Kind::structure(&[("start", Kind::BigNumber), ("end", Kind::BigNumber)])
    }

    fn to_codable(&self) -> Codable {
        Codable::structure(vec![("start", Codable::BigNumber(self.start)), ("end", Codable::BigNumber(self.end))])
    }

    fn from_codable(value: Codable) -> Result<Self, CodecError> {
        let mut fields = value.into_fields(2)?;
        let start = fields.next_big_number()?;
        let end = fields.next_big_number()?;
        Range::new(start, end).map_err(|e| CodecError::InvalidValue(e.to_string()))
    }
}

impl Encodable for U256 {
    fn kind() -> Kind {
        Kind::BigNumber
    }

    fn to_codable(&self) -> Codable {
        Codable::BigNumber(*self)
    }

    fn from_codable(value: Codable) -> Result<Self, CodecError> {
        value.into_big_number()
    }
}

impl Encodable for Address {
    fn kind() -> Kind {
        Kind::Address
    }

    fn to_codable(&self) -> Codable {
        Codable::Address(*self)
    }

    fn from_codable(value: Codable) -> Result<Self, CodecError> {
        value.into_address()
    }
}

impl<T: Encodable> Encodable for Vec<T> {
    fn kind() -> Kind {
        Kind::list(T::kind())
    }

    fn to_codable(&self) -> Codable {
        Codable::List(self.iter().map(Encodable::to_codable).collect())
    }

    fn from_codable(value: Codable) -> Result<Self, CodecError> {
        value.into_list()?.into_iter().map(T::from_codable).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_reader() {
        let value = Codable::structure(vec![
            ("a", Codable::Integer(3)),
            ("b", Codable::BigNumber(U256::from(9))),
        ]);
        let mut fields = value.clone().into_fields(2).unwrap();
        assert_eq!(fields.next_integer().unwrap(), 3);
        assert_eq!(fields.next_big_number().unwrap(), U256::from(9));
        assert!(fields.next_value().is_err());

        assert!(value.into_fields(3).is_err());
    }

    #[test]
    fn test_accessor_mismatch() {
        let err = Codable::Integer(1).into_address().unwrap_err();
        assert_eq!(err.to_string(), "Type mismatch: expected Address, found Integer");
        assert!(matches!(
            Codable::FixedBytes(vec![0; 20]).into_h256(),
            Err(CodecError::InvalidLength { expected: 32, actual: 20 })
        ));
    }

    #[test]
    fn test_range_rejects_empty_on_decode() {
        let value = Codable::structure(vec![
            ("start", Codable::BigNumber(U256::from(5))),
            ("end", Codable::BigNumber(U256::from(5))),
        ]);
        assert!(matches!(Range::from_codable(value), Err(CodecError::InvalidValue(_))));
    }
}
