use std::fmt;
use std::sync::Arc;

use crate::storage::kv_store::{KVStore, KVStoreError, WriteBatchOperation};

const RECORD_TAG: u8 = 0x01;
const CHILD_TAG: u8 = 0x02;

/// Longest child bucket name; the length prefix is a big-endian u16
pub const MAX_BUCKET_NAME_LEN: usize = u16::MAX as usize;

/// A namespaced view over a shared [`KVStore`].
///
/// Records of a bucket with prefix `P` live under `P || 0x01 || key`; a child
/// bucket named `N` gets the prefix `P || 0x02 || len(N) as u16 || N`. No key
/// of one bucket can therefore collide with a key of a sibling or parent.
#[derive(Clone)]
pub struct Bucket {
    store: Arc<dyn KVStore>,
    prefix: Vec<u8>,
}

impl Bucket {
    /// The unscoped root namespace of `store`
    pub fn root(store: Arc<dyn KVStore>) -> Self {
        Self { store, prefix: Vec::new() }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn store(&self) -> &Arc<dyn KVStore> {
        &self.store
    }

    /// Child namespace named `name`
    ///
    /// # Panics
    ///
    /// Panics if `name` is longer than [`MAX_BUCKET_NAME_LEN`].
    pub fn bucket(&self, name: &[u8]) -> Bucket {
        assert!(
            name.len() <= MAX_BUCKET_NAME_LEN,
            "bucket name of {} bytes exceeds {}",
            name.len(),
            MAX_BUCKET_NAME_LEN
        );
        let mut prefix = Vec::with_capacity(self.prefix.len() + 3 + name.len());
        prefix.extend_from_slice(&self.prefix);
        prefix.push(CHILD_TAG);
        prefix.extend_from_slice(&(name.len() as u16).to_be_bytes());
        prefix.extend_from_slice(name);
        Bucket { store: self.store.clone(), prefix }
    }

    /// Full store key of `key` inside this bucket
    pub fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = self.record_prefix();
        full.extend_from_slice(key);
        full
    }

    fn record_prefix(&self) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(self.prefix.len() + 1);
        prefix.extend_from_slice(&self.prefix);
        prefix.push(RECORD_TAG);
        prefix
    }

    fn strip<'a>(&self, full: &'a [u8]) -> &'a [u8] {
        &full[self.prefix.len() + 1..]
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.store.get(&self.full_key(key))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.store.put(&self.full_key(key), value)
    }

    pub fn del(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.store.delete(&self.full_key(key))
    }

    /// Queue a put of `key` in this bucket onto `batch`
    pub fn batch_put(&self, batch: &mut Vec<WriteBatchOperation>, key: &[u8], value: Vec<u8>) {
        batch.push(WriteBatchOperation::Put { key: self.full_key(key), value });
    }

    /// Queue a delete of `key` in this bucket onto `batch`
    pub fn batch_delete(&self, batch: &mut Vec<WriteBatchOperation>, key: &[u8]) {
        batch.push(WriteBatchOperation::Delete { key: self.full_key(key) });
    }

    pub fn write_batch(&self, batch: Vec<WriteBatchOperation>) -> Result<(), KVStoreError> {
        self.store.write_batch(batch)
    }

    /// First record of this bucket with `key >= from`, with the key unprefixed
    pub fn seek(&self, from: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let record_prefix = self.record_prefix();
        Ok(self
            .store
            .seek(&self.full_key(from), &record_prefix)?
            .map(|(key, value)| (self.strip(&key).to_vec(), value)))
    }

    /// Lazily walk the records of this bucket from `from` onwards
    pub fn iter_from(&self, from: &[u8]) -> BucketIter {
        BucketIter { bucket: self.clone(), next: Some(from.to_vec()) }
    }

    /// All records of this bucket; child buckets are not included
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        Ok(self
            .store
            .scan_prefix(&self.record_prefix())?
            .into_iter()
            .map(|(key, value)| (self.strip(&key).to_vec(), value))
            .collect())
    }

    /// Remove every record of this bucket and of all its children
    pub fn clear(&self) -> Result<usize, KVStoreError> {
        let keys: Vec<WriteBatchOperation> = self
            .store
            .scan_prefix(&self.prefix)?
            .into_iter()
            .map(|(key, _)| WriteBatchOperation::Delete { key })
            .collect();
        let count = keys.len();
        if count > 0 {
            self.store.write_batch(keys)?;
        }
        Ok(count)
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bucket(0x{})", hex::encode(&self.prefix))
    }
}

/// Forward iterator over a bucket that re-seeks after every record, so it
/// never pins a snapshot of the underlying store
pub struct BucketIter {
    bucket: Bucket,
    next: Option<Vec<u8>>,
}

impl Iterator for BucketIter {
    type Item = Result<(Vec<u8>, Vec<u8>), KVStoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let from = self.next.take()?;
        match self.bucket.seek(&from) {
            Ok(Some((key, value))) => {
                let mut successor = key.clone();
                successor.push(0);
                self.next = Some(successor);
                Some(Ok((key, value)))
            },
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv_store::MemoryStore;

    fn root() -> Bucket {
        Bucket::root(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_buckets_are_isolated() {
        let root = root();
        let a = root.bucket(b"a");
        let b = root.bucket(b"b");

        a.put(b"key", b"from a").unwrap();
        assert_eq!(a.get(b"key").unwrap(), Some(b"from a".to_vec()));
        assert_eq!(b.get(b"key").unwrap(), None);
        assert_eq!(root.get(b"key").unwrap(), None);

        // a name that is a prefix of another does not leak
        let ab = root.bucket(b"ab");
        assert_eq!(ab.get(b"key").unwrap(), None);
        assert!(ab.entries().unwrap().is_empty());
    }

    #[test]
    fn test_entries_skip_children() {
        let root = root();
        let parent = root.bucket(b"parent");
        parent.put(b"own", b"1").unwrap();
        parent.bucket(b"child").put(b"nested", b"2").unwrap();

        let entries = parent.entries().unwrap();
        assert_eq!(entries, vec![(b"own".to_vec(), b"1".to_vec())]);
    }

    #[test]
    fn test_iter_from_is_ordered_and_bounded() {
        let root = root();
        let bucket = root.bucket(b"items");
        for key in [b"c", b"a", b"d", b"b"] {
            bucket.put(key, key).unwrap();
        }
        root.put(b"z", b"outside").unwrap();
        root.bucket(b"items2").put(b"e", b"sibling").unwrap();

        let keys: Vec<Vec<u8>> = bucket.iter_from(b"b").map(|item| item.unwrap().0).collect();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);
    }

    #[test]
    fn test_clear_removes_children() {
        let root = root();
        let parent = root.bucket(b"parent");
        parent.put(b"own", b"1").unwrap();
        parent.bucket(b"child").put(b"nested", b"2").unwrap();
        root.bucket(b"other").put(b"keep", b"3").unwrap();

        assert_eq!(parent.clear().unwrap(), 2);
        assert!(parent.entries().unwrap().is_empty());
        assert!(parent.bucket(b"child").entries().unwrap().is_empty());
        assert_eq!(root.bucket(b"other").get(b"keep").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn test_longest_names_stay_distinct() {
        let root = root();
        let longest = vec![b'n'; MAX_BUCKET_NAME_LEN];
        let shorter = &longest[..MAX_BUCKET_NAME_LEN - 1];
        root.bucket(&longest).put(b"key", b"long").unwrap();
        assert_eq!(root.bucket(shorter).get(b"key").unwrap(), None);
        assert_ne!(root.bucket(&longest).prefix(), root.bucket(shorter).prefix());
    }

    #[test]
    #[should_panic(expected = "exceeds")]
    fn test_oversized_name_is_refused() {
        root().bucket(&vec![b'n'; MAX_BUCKET_NAME_LEN + 1]);
    }
}
