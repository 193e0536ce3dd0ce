use std::fmt;
use std::str::FromStr;

use crate::codec::CodecError;
use crate::storage::{KVStoreError, RangeStoreError, Schema, MAX_BUCKET_NAME_LEN};
use crate::types::{from_hex, to_hex, u256_from_be_bytes, u256_to_be_bytes, U256};

/// Widest span a NUMBER hint may enumerate
pub const MAX_NUMBER_HINT_SPAN: u64 = 65_536;

#[derive(Debug, thiserror::Error)]
pub enum HintError {
    #[error("{0} is unknown type of hint.")]
    UnknownType(String),

    #[error("Malformed hint {hint}: {reason}")]
    Malformed { hint: String, reason: String },

    #[error("NUMBER hint spans {0} integers, more than {max}", max = MAX_NUMBER_HINT_SPAN)]
    SpanTooLarge(U256),

    #[error("Cannot store a witness under a {0} hint")]
    NotWritable(&'static str),

    #[error("Range store error: {0}")]
    RangeStore(#[from] RangeStoreError),

    #[error("KVStore error: {0}")]
    KVStore(#[from] KVStoreError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// What a hint asks of its bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintQuery {
    /// A single value by raw key
    Key(Vec<u8>),
    /// Values of records intersecting a coder-encoded range
    Range(Vec<u8>),
    /// Every value from a raw lower-bound key onwards
    Iter(Vec<u8>),
    /// Every integer in `[start, end)`
    Number { start: U256, end: U256 },
}

impl HintQuery {
    pub fn type_name(&self) -> &'static str {
        match self {
            HintQuery::Key(_) => "KEY",
            HintQuery::Range(_) => "RANGE",
            HintQuery::Iter(_) => "ITER",
            HintQuery::Number { .. } => "NUMBER",
        }
    }
}

/// A parsed hint string: `<bucket[.bucket...]>,<TYPE>,<param>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    pub bucket_path: Vec<String>,
    pub query: HintQuery,
}

fn malformed(hint: &str, reason: impl Into<String>) -> HintError {
    HintError::Malformed { hint: hint.to_string(), reason: reason.into() }
}

fn parse_hex(hint: &str, value: &str) -> Result<Vec<u8>, HintError> {
    from_hex(value).map_err(|e| malformed(hint, format!("invalid hex {}: {}", value, e)))
}

fn parse_number(hint: &str, value: &str) -> Result<U256, HintError> {
    let bytes = parse_hex(hint, value)?;
    u256_from_be_bytes(&bytes).ok_or_else(|| malformed(hint, format!("number {} wider than 32 bytes", value)))
}

impl FromStr for Hint {
    type Err = HintError;

    fn from_str(hint: &str) -> Result<Self, Self::Err> {
        let mut parts = hint.splitn(3, ',');
        let (path, kind, param) = match (parts.next(), parts.next(), parts.next()) {
            (Some(path), Some(kind), Some(param)) => (path, kind, param),
            _ => return Err(malformed(hint, "expected <bucket>,<TYPE>,<param>")),
        };
        let bucket_path: Vec<String> = Schema::bucket_path(path).into_iter().map(str::to_string).collect();
        if let Some(name) = bucket_path.iter().find(|name| name.len() > MAX_BUCKET_NAME_LEN) {
            return Err(malformed(hint, format!("bucket name of {} bytes is too long", name.len())));
        }

        let query = match kind {
            "KEY" => HintQuery::Key(parse_hex(hint, param)?),
            "RANGE" => HintQuery::Range(parse_hex(hint, param)?),
            "ITER" => HintQuery::Iter(parse_hex(hint, param)?),
            "NUMBER" => {
                let (start, end) = param
                    .split_once('-')
                    .ok_or_else(|| malformed(hint, "NUMBER expects <start>-<end>"))?;
                let start = parse_number(hint, start)?;
                let end = parse_number(hint, end)?;
                if end < start {
                    return Err(malformed(hint, "NUMBER end is below start"));
                }
                if end - start > U256::from(MAX_NUMBER_HINT_SPAN) {
                    return Err(HintError::SpanTooLarge(end - start));
                }
                HintQuery::Number { start, end }
            }
            other => return Err(HintError::UnknownType(other.to_string())),
        };

        Ok(Hint { bucket_path, query })
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let param = match &self.query {
            HintQuery::Key(bytes) | HintQuery::Range(bytes) | HintQuery::Iter(bytes) => to_hex(bytes),
            HintQuery::Number { start, end } => {
                format!("{}-{}", to_hex(&u256_to_be_bytes(start)), to_hex(&u256_to_be_bytes(end)))
            }
        };
        write!(f, "{},{},{}", self.bucket_path.join("."), self.query.type_name(), param)
    }
}

/// Substitute every `${name}` in `template` with the hex encoding of its value.
///
/// Placeholders without a value are left in place.
pub fn replace_hint(template: &str, vars: &[(&str, &[u8])]) -> String {
    vars.iter().fold(template.to_string(), |hint, (name, value)| {
        hint.replace(&format!("${{{}}}", name), &to_hex(value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_hint() {
        let hint: Hint = "signatures,KEY,0xdead".parse().unwrap();
        assert_eq!(hint.bucket_path, vec!["signatures".to_string()]);
        assert_eq!(hint.query, HintQuery::Key(vec![0xde, 0xad]));
        assert_eq!(hint.to_string(), "signatures,KEY,0xdead");
    }

    #[test]
    fn test_parse_nested_bucket_path() {
        let hint: Hint = "a.b.c,ITER,00".parse().unwrap();
        assert_eq!(hint.bucket_path, vec!["a", "b", "c"]);
        assert_eq!(hint.query, HintQuery::Iter(vec![0]));
    }

    #[test]
    fn test_parse_number_hint() {
        let hint: Hint = "numbers,NUMBER,0x05-0x0a".parse().unwrap();
        assert_eq!(hint.query, HintQuery::Number { start: U256::from(5), end: U256::from(10) });
        assert_eq!(hint.to_string().parse::<Hint>().unwrap(), hint);

        let too_wide: Result<Hint, _> = "numbers,NUMBER,0x00-0x010001".parse();
        assert!(matches!(too_wide, Err(HintError::SpanTooLarge(_))));

        let inverted: Result<Hint, _> = "numbers,NUMBER,0x0a-0x05".parse();
        assert!(matches!(inverted, Err(HintError::Malformed { .. })));
    }

    #[test]
    fn test_unknown_type_message() {
        let err = "bucket,SCAN,0x00".parse::<Hint>().unwrap_err();
        assert_eq!(err.to_string(), "SCAN is unknown type of hint.");
    }

    #[test]
    fn test_malformed_hints() {
        assert!(matches!("bucket,KEY".parse::<Hint>(), Err(HintError::Malformed { .. })));
        assert!(matches!("bucket,KEY,0xzz".parse::<Hint>(), Err(HintError::Malformed { .. })));

        let oversized = format!("{},KEY,0x00", "b".repeat(MAX_BUCKET_NAME_LEN + 1));
        assert!(matches!(oversized.parse::<Hint>(), Err(HintError::Malformed { .. })));
    }

    #[test]
    fn test_replace_hint() {
        let hint = replace_hint("signatures,KEY,${message}", &[("message", &[0xbe, 0xef][..])]);
        assert_eq!(hint, "signatures,KEY,0xbeef");

        let untouched = replace_hint("tx,KEY,${hash}", &[("message", &[1u8][..])]);
        assert_eq!(untouched, "tx,KEY,${hash}");
    }
}
