use serde_json::Value;

use super::{Codable, CodecError, Coder, Kind};
use crate::types::{from_hex, to_hex, Address, U256};

/// JSON wire format.
///
/// Integers are JSON numbers, big numbers are decimal strings, byte values and
/// addresses are `0x` hex strings; lists, tuples and structs are arrays, with
/// struct fields in declaration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCoder;

impl JsonCoder {
    fn to_json(value: &Codable) -> Value {
        match value {
            Codable::Integer(n) => Value::from(*n),
            Codable::BigNumber(n) => Value::String(n.to_string()),
            Codable::Address(address) => Value::String(to_hex(address.as_bytes())),
            Codable::Bytes(bytes) | Codable::FixedBytes(bytes) => Value::String(to_hex(bytes)),
            Codable::List(items) | Codable::Tuple(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Codable::Struct(fields) => Value::Array(fields.iter().map(|(_, v)| Self::to_json(v)).collect()),
        }
    }

    fn from_json(kind: &Kind, value: Value) -> Result<Codable, CodecError> {
        match kind {
            Kind::Integer => value
                .as_i64()
                .map(Codable::Integer)
                .ok_or_else(|| mismatch("integer", &value)),
            Kind::BigNumber => {
                let text = expect_str(&value, "decimal string")?;
                U256::from_dec_str(text)
                    .map(Codable::BigNumber)
                    .map_err(|e| CodecError::Malformed(format!("invalid big number {}: {:?}", text, e)))
            }
            Kind::Address => {
                let bytes = from_hex(expect_str(&value, "address")?)?;
                if bytes.len() != 20 {
                    return Err(CodecError::InvalidLength { expected: 20, actual: bytes.len() });
                }
                Ok(Codable::Address(Address::from_slice(&bytes)))
            }
            Kind::Bytes => Ok(Codable::Bytes(from_hex(expect_str(&value, "hex string")?)?)),
            Kind::FixedBytes(size) => {
                let bytes = from_hex(expect_str(&value, "hex string")?)?;
                if bytes.len() != *size {
                    return Err(CodecError::InvalidLength { expected: *size, actual: bytes.len() });
                }
                Ok(Codable::FixedBytes(bytes))
            }
            Kind::List(element) => {
                let items = expect_array(value)?;
                let decoded = items
                    .into_iter()
                    .map(|item| Self::from_json(element, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Codable::List(decoded))
            }
            Kind::Tuple(kinds) => {
                let items = expect_array_of(value, kinds.len())?;
                let decoded = kinds
                    .iter()
                    .zip(items)
                    .map(|(kind, item)| Self::from_json(kind, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Codable::Tuple(decoded))
            }
            Kind::Struct(fields) => {
                let items = expect_array_of(value, fields.len())?;
                let decoded = fields
                    .iter()
                    .zip(items)
                    .map(|((name, kind), item)| Ok((name.clone(), Self::from_json(kind, item)?)))
                    .collect::<Result<Vec<_>, CodecError>>()?;
                Ok(Codable::Struct(decoded))
            }
        }
    }
}

impl Coder for JsonCoder {
    fn encode(&self, value: &Codable) -> Vec<u8> {
        Self::to_json(value).to_string().into_bytes()
    }

    fn decode(&self, kind: &Kind, bytes: &[u8]) -> Result<Codable, CodecError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_json(kind, value)
    }
}

fn mismatch(expected: &str, found: &Value) -> CodecError {
    CodecError::TypeMismatch { expected: expected.to_string(), found: found.to_string() }
}

fn expect_str<'a>(value: &'a Value, expected: &str) -> Result<&'a str, CodecError> {
    value.as_str().ok_or_else(|| mismatch(expected, value))
}

fn expect_array(value: Value) -> Result<Vec<Value>, CodecError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(mismatch("array", &other)),
    }
}

fn expect_array_of(value: Value, len: usize) -> Result<Vec<Value>, CodecError> {
    let items = expect_array(value)?;
    if items.len() != len {
        return Err(CodecError::InvalidLength { expected: len, actual: items.len() });
    }
    Ok(items)
}
