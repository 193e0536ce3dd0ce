use std::fmt;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::storage::bucket::{Bucket, BucketIter};
use crate::storage::kv_store::{KVStore, KVStoreError, WriteBatchOperation};
use crate::types::{u256_from_be_bytes, u256_to_be_bytes, Range, RangeError, U256};

/// Error type for RangeStore operations
#[derive(Debug, thiserror::Error)]
pub enum RangeStoreError {
    /// KVStore error
    #[error("KVStore error: {0}")]
    KVStoreError(#[from] KVStoreError),

    /// The requested interval is empty or inverted
    #[error("Invalid range: {0}")]
    InvalidRange(#[from] RangeError),

    /// A stored record could not be decoded
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// The namespace mutex was poisoned by a panicking writer
    #[error("Namespace lock poisoned")]
    LockPoisoned,
}

/// A value stored for the half-open interval `[start, end)`
#[derive(Clone, PartialEq, Eq)]
pub struct RangeRecord {
    pub start: U256,
    pub end: U256,
    pub value: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    start: [u8; 32],
    end: [u8; 32],
    value: Vec<u8>,
}

impl RangeRecord {
    pub fn new(start: U256, end: U256, value: Vec<u8>) -> Self {
        Self { start, end, value }
    }

    pub fn range(&self) -> Range {
        Range { start: self.start, end: self.end }
    }

    pub fn intersects(&self, start: U256, end: U256) -> bool {
        self.start.max(start) < self.end.min(end)
    }

    /// Parts of this record outside every record of `covering`, which must be
    /// sorted and non-overlapping
    fn uncovered_by(&self, covering: &[RangeRecord]) -> Vec<RangeRecord> {
        let mut pieces = Vec::new();
        let mut cursor = self.start;
        for covered in covering.iter().filter(|covered| self.intersects(covered.start, covered.end)) {
            if covered.start > cursor {
                pieces.push(RangeRecord::new(cursor, covered.start, self.value.clone()));
            }
            cursor = cursor.max(covered.end);
        }
        if cursor < self.end {
            pieces.push(RangeRecord::new(cursor, self.end, self.value.clone()));
        }
        pieces
    }

    fn to_bytes(&self) -> Result<Vec<u8>, RangeStoreError> {
        let stored = StoredRecord {
            start: u256_to_be_bytes(&self.start),
            end: u256_to_be_bytes(&self.end),
            value: self.value.clone(),
        };
        bincode::serialize(&stored).map_err(|e| RangeStoreError::KVStoreError(e.into()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, RangeStoreError> {
        let stored: StoredRecord =
            bincode::deserialize(bytes).map_err(|e| RangeStoreError::CorruptRecord(e.to_string()))?;
        Ok(Self {
            start: U256::from_big_endian(&stored.start),
            end: U256::from_big_endian(&stored.end),
            value: stored.value,
        })
    }
}

impl fmt::Debug for RangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RangeRecord([{}, {}) => 0x{})", self.start, self.end, hex::encode(&self.value))
    }
}

type LockRegistry = Arc<DashMap<Vec<u8>, Arc<Mutex<()>>>>;

/// Sorted, non-overlapping interval store.
///
/// Records are keyed by their `end` as 32 big-endian bytes, so the first
/// record intersecting `[start, ..)` is the first key at or after
/// `start + 1`. Writers to one namespace are serialised by a mutex shared
/// by every handle onto that namespace.
#[derive(Clone)]
pub struct RangeStore {
    bucket: Bucket,
    locks: LockRegistry,
}

impl RangeStore {
    /// Root range store over `store`
    pub fn new(store: Arc<dyn KVStore>) -> Self {
        Self { bucket: Bucket::root(store), locks: Arc::new(DashMap::new()) }
    }

    /// Range store scoped to the child namespace `name`
    pub fn bucket(&self, name: &[u8]) -> RangeStore {
        RangeStore { bucket: self.bucket.bucket(name), locks: self.locks.clone() }
    }

    /// Raw key-value view of this namespace
    pub fn kv(&self) -> &Bucket {
        &self.bucket
    }

    /// All records intersecting `[start, end)`, ascending
    pub fn get(&self, start: U256, end: U256) -> Result<Vec<RangeRecord>, RangeStoreError> {
        Range::new(start, end)?;
        self.iter(start, Some(end)).collect()
    }

    /// Store `value` for `[start, end)`, splicing every overlapping record
    pub fn put(&self, start: U256, end: U256, value: &[u8]) -> Result<(), RangeStoreError> {
        Range::new(start, end)?;
        let lock = self.namespace_lock();
        let _guard = lock.lock().map_err(|_| RangeStoreError::LockPoisoned)?;

        let (_, mut batch) = self.plan_removal(start, end, true)?;
        let record = RangeRecord::new(start, end, value.to_vec());
        self.bucket.batch_put(&mut batch, &u256_to_be_bytes(&end), record.to_bytes()?);
        self.bucket.write_batch(batch)?;
        debug!("{:?}: put [{}, {})", self.bucket, start, end);
        Ok(())
    }

    /// Remove every record intersecting `[start, end)`.
    ///
    /// Whole records are removed, including any part outside the requested
    /// interval. Returns the removed records.
    pub fn del(&self, start: U256, end: U256) -> Result<Vec<RangeRecord>, RangeStoreError> {
        Range::new(start, end)?;
        let lock = self.namespace_lock();
        let _guard = lock.lock().map_err(|_| RangeStoreError::LockPoisoned)?;

        let (removed, batch) = self.plan_removal(start, end, false)?;
        if !batch.is_empty() {
            self.bucket.write_batch(batch)?;
        }
        debug!("{:?}: deleted {} records intersecting [{}, {})", self.bucket, removed.len(), start, end);
        Ok(removed)
    }

    /// Move the part of every record inside `[start, end)` into `target`.
    ///
    /// Both namespaces must live in the same underlying store; the move is a
    /// single batch. Parts outside the interval stay where they are.
    pub fn move_range(&self, target: &RangeStore, start: U256, end: U256) -> Result<Vec<RangeRecord>, RangeStoreError> {
        Range::new(start, end)?;
        let source_lock = self.namespace_lock();
        let target_lock = target.namespace_lock();
        let (first, second) = if self.bucket.prefix() <= target.bucket.prefix() {
            (&source_lock, &target_lock)
        } else {
            (&target_lock, &source_lock)
        };
        let _first = first.lock().map_err(|_| RangeStoreError::LockPoisoned)?;
        let _second = if Arc::ptr_eq(first, second) {
            None
        } else {
            Some(second.lock().map_err(|_| RangeStoreError::LockPoisoned)?)
        };

        let (removed, mut batch) = self.plan_removal(start, end, true)?;
        let moved: Vec<RangeRecord> = removed
            .into_iter()
            .map(|record| RangeRecord::new(record.start.max(start), record.end.min(end), record.value))
            .collect();
        if let (Some(first), Some(last)) = (moved.first(), moved.last()) {
            // evict only the moved spans from the target
            for record in target.iter(first.start, Some(last.end)) {
                let record = record?;
                if !moved.iter().any(|covering| record.intersects(covering.start, covering.end)) {
                    continue;
                }
                target.bucket.batch_delete(&mut batch, &u256_to_be_bytes(&record.end));
                for piece in record.uncovered_by(&moved) {
                    target.bucket.batch_put(&mut batch, &u256_to_be_bytes(&piece.end), piece.to_bytes()?);
                }
            }
            for record in &moved {
                target.bucket.batch_put(&mut batch, &u256_to_be_bytes(&record.end), record.to_bytes()?);
            }
            self.bucket.write_batch(batch)?;
        }
        debug!("{:?}: moved {} records to {:?}", self.bucket, moved.len(), target.bucket);
        Ok(moved)
    }

    /// Lazily walk records whose end is above `lower`, stopping before the
    /// first record starting at or after `upper`
    pub fn iter(&self, lower: U256, upper: Option<U256>) -> RangeIter {
        let inner = lower.checked_add(U256::one()).map(|from| self.bucket.iter_from(&u256_to_be_bytes(&from)));
        RangeIter { inner, upper, lower }
    }

    /// Every record of this namespace
    pub fn all(&self) -> Result<Vec<RangeRecord>, RangeStoreError> {
        self.iter(U256::zero(), None).collect()
    }

    pub fn is_empty(&self) -> Result<bool, RangeStoreError> {
        Ok(self.bucket.seek(&[])?.is_none())
    }

    /// Remove every record of this namespace and its children
    pub fn clear(&self) -> Result<usize, RangeStoreError> {
        let lock = self.namespace_lock();
        let _guard = lock.lock().map_err(|_| RangeStoreError::LockPoisoned)?;
        Ok(self.bucket.clear()?)
    }

    fn namespace_lock(&self) -> Arc<Mutex<()>> {
        self.locks
            .entry(self.bucket.prefix().to_vec())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Deletes for every record intersecting `[start, end)`, plus re-inserts
    /// of the parts outside the interval when `keep_outside` is set
    fn plan_removal(
        &self,
        start: U256,
        end: U256,
        keep_outside: bool,
    ) -> Result<(Vec<RangeRecord>, Vec<WriteBatchOperation>), RangeStoreError> {
        let records: Vec<RangeRecord> = self.iter(start, Some(end)).collect::<Result<_, _>>()?;
        let mut batch = Vec::with_capacity(records.len() + 2);
        for record in &records {
            self.bucket.batch_delete(&mut batch, &u256_to_be_bytes(&record.end));
        }
        if keep_outside {
            if let Some(first) = records.first().filter(|first| first.start < start) {
                let head = RangeRecord::new(first.start, start, first.value.clone());
                self.bucket.batch_put(&mut batch, &u256_to_be_bytes(&start), head.to_bytes()?);
            }
            if let Some(last) = records.last().filter(|last| last.end > end) {
                let tail = RangeRecord::new(end, last.end, last.value.clone());
                self.bucket.batch_put(&mut batch, &u256_to_be_bytes(&last.end), tail.to_bytes()?);
            }
        }
        Ok((records, batch))
    }
}

impl fmt::Debug for RangeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RangeStore({:?})", self.bucket)
    }
}

/// Forward iterator over a [`RangeStore`]
pub struct RangeIter {
    inner: Option<BucketIter>,
    upper: Option<U256>,
    lower: U256,
}

impl Iterator for RangeIter {
    type Item = Result<RangeRecord, RangeStoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = match self.inner.as_mut()?.next()? {
            Ok(entry) => entry,
            Err(e) => {
                self.inner = None;
                return Some(Err(e.into()));
            },
        };
        let record = match RangeRecord::from_bytes(&value) {
            Ok(record) => record,
            Err(e) => {
                self.inner = None;
                return Some(Err(e));
            },
        };
        if u256_from_be_bytes(&key) != Some(record.end) || record.end <= self.lower {
            self.inner = None;
            return Some(Err(RangeStoreError::CorruptRecord(format!("key 0x{} does not match {:?}", hex::encode(&key), record))));
        }
        if self.upper.map(|upper| record.start >= upper).unwrap_or(false) {
            self.inner = None;
            return None;
        }
        Some(Ok(record))
    }
}
