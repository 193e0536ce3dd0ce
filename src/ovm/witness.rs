use std::sync::Arc;

use log::debug;

use super::hint::{Hint, HintError, HintQuery};
use crate::codec::{decode, Coder};
use crate::storage::RangeStore;
use crate::types::{u256_to_be_bytes, Range, U256};

/// Resolves hint strings against the aggregator database
#[derive(Clone)]
pub struct WitnessDb {
    root: RangeStore,
    coder: Arc<dyn Coder>,
}

impl WitnessDb {
    pub fn new(root: RangeStore, coder: Arc<dyn Coder>) -> Self {
        Self { root, coder }
    }

    fn locate(&self, hint: &Hint) -> RangeStore {
        hint.bucket_path.iter().fold(self.root.clone(), |store, name| store.bucket(name.as_bytes()))
    }

    /// Every value the hint points at; an absent KEY yields no values
    pub fn get_witnesses(&self, hint: &str) -> Result<Vec<Vec<u8>>, HintError> {
        let parsed: Hint = hint.parse()?;
        let store = self.locate(&parsed);

        let witnesses = match &parsed.query {
            HintQuery::Key(key) => store.kv().get(key)?.into_iter().collect(),
            HintQuery::Range(encoded) => {
                let range: Range = decode(self.coder.as_ref(), encoded)?;
                store.get(range.start, range.end)?.into_iter().map(|record| record.value).collect()
            }
            HintQuery::Iter(lower_bound) => store
                .kv()
                .iter_from(lower_bound)
                .map(|entry| entry.map(|(_, value)| value))
                .collect::<Result<Vec<_>, _>>()?,
            HintQuery::Number { start, end } => {
                let mut numbers = Vec::new();
                let mut current = *start;
                while current < *end {
                    numbers.push(u256_to_be_bytes(&current).to_vec());
                    current += U256::one();
                }
                numbers
            }
        };

        debug!("Hint {} resolved to {} witnesses", hint, witnesses.len());
        Ok(witnesses)
    }

    /// Store `value` where a KEY or RANGE hint will find it
    pub fn put_witness(&self, hint: &str, value: &[u8]) -> Result<(), HintError> {
        let parsed: Hint = hint.parse()?;
        let store = self.locate(&parsed);
        match &parsed.query {
            HintQuery::Key(key) => store.kv().put(key, value)?,
            HintQuery::Range(encoded) => {
                let range: Range = decode(self.coder.as_ref(), encoded)?;
                store.put(range.start, range.end, value)?;
            }
            other => return Err(HintError::NotWritable(other.type_name())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode, JsonCoder};
    use crate::ovm::hint::replace_hint;
    use crate::storage::MemoryStore;
    use crate::types::to_hex;

    fn witness_db() -> WitnessDb {
        WitnessDb::new(RangeStore::new(Arc::new(MemoryStore::new())), Arc::new(JsonCoder))
    }

    #[test]
    fn test_key_hint() {
        let db = witness_db();
        let hint = replace_hint("signatures,KEY,${message}", &[("message", &b"hello"[..])]);
        assert!(db.get_witnesses(&hint).unwrap().is_empty());

        db.put_witness(&hint, b"signature").unwrap();
        assert_eq!(db.get_witnesses(&hint).unwrap(), vec![b"signature".to_vec()]);

        // same key in a different bucket is not visible
        let other = replace_hint("tx,KEY,${message}", &[("message", &b"hello"[..])]);
        assert!(db.get_witnesses(&other).unwrap().is_empty());
    }

    #[test]
    fn test_range_hint() {
        let store = RangeStore::new(Arc::new(MemoryStore::new()));
        let db = WitnessDb::new(store.clone(), Arc::new(JsonCoder));
        let bucket = store.bucket(b"proofs").bucket(b"token");
        bucket.put(U256::from(0), U256::from(10), b"a").unwrap();
        bucket.put(U256::from(10), U256::from(20), b"b").unwrap();
        bucket.put(U256::from(30), U256::from(40), b"c").unwrap();

        let range = Range::from_u64(5, 15).unwrap();
        let hint = format!("proofs.token,RANGE,{}", to_hex(&encode(&JsonCoder, &range)));
        assert_eq!(db.get_witnesses(&hint).unwrap(), vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn test_iter_hint() {
        let db = witness_db();
        for key in [1u8, 2, 3] {
            db.put_witness(&format!("items,KEY,{}", to_hex(&[key])), &[key * 10]).unwrap();
        }
        let values = db.get_witnesses("items,ITER,0x02").unwrap();
        assert_eq!(values, vec![vec![20], vec![30]]);
    }

    #[test]
    fn test_number_hint() {
        let db = witness_db();
        let values = db.get_witnesses("numbers,NUMBER,0x03-0x06").unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(U256::from_big_endian(&values[0]), U256::from(3));
        assert_eq!(U256::from_big_endian(&values[2]), U256::from(5));
        assert!(values.iter().all(|value| value.len() == 32));
    }

    #[test]
    fn test_number_hint_is_not_writable() {
        let db = witness_db();
        assert!(matches!(db.put_witness("numbers,NUMBER,0x00-0x01", b"x"), Err(HintError::NotWritable("NUMBER"))));
    }
}
