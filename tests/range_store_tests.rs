use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

use ovm_plasma::storage::{KVStore, MemoryStore, RangeRecord, RangeStore, RocksDBStore};
use ovm_plasma::types::U256;

fn n(value: u64) -> U256 {
    U256::from(value)
}

fn spans(records: &[RangeRecord]) -> Vec<(u64, u64, Vec<u8>)> {
    records.iter().map(|r| (r.start.as_u64(), r.end.as_u64(), r.value.clone())).collect()
}

fn splice_example(store: &RangeStore) {
    store.put(n(0), n(1000), b"A").unwrap();
    store.put(n(1000), n(2000), b"B").unwrap();
    store.put(n(500), n(1500), b"C").unwrap();

    assert_eq!(
        spans(&store.get(n(0), n(2000)).unwrap()),
        vec![(0, 500, b"A".to_vec()), (500, 1500, b"C".to_vec()), (1500, 2000, b"B".to_vec())]
    );
}

#[test]
fn test_splice_example_in_memory() {
    splice_example(&RangeStore::new(Arc::new(MemoryStore::new())));
}

#[test]
fn test_splice_example_on_rocksdb_survives_reopen() {
    let temp_dir = tempdir().unwrap();
    {
        let store: Arc<dyn KVStore> = Arc::new(RocksDBStore::new(temp_dir.path()).unwrap());
        splice_example(&RangeStore::new(store).bucket(b"token"));
    }

    let store: Arc<dyn KVStore> = Arc::new(RocksDBStore::new(temp_dir.path()).unwrap());
    let reopened = RangeStore::new(store).bucket(b"token");
    assert_eq!(reopened.all().unwrap().len(), 3);
}

#[test]
fn test_random_puts_keep_records_disjoint() {
    const COINS: usize = 200;
    let mut rng = StdRng::seed_from_u64(7);
    let store = RangeStore::new(Arc::new(MemoryStore::new()));
    let mut model: Vec<Option<u8>> = vec![None; COINS];

    for round in 0..300u32 {
        let start = rng.gen_range(0..COINS - 1);
        let end = rng.gen_range(start + 1..=COINS);
        let value = (round % 251) as u8;
        store.put(n(start as u64), n(end as u64), &[value]).unwrap();
        for coin in model.iter_mut().take(end).skip(start) {
            *coin = Some(value);
        }

        let records = store.all().unwrap();
        for pair in records.windows(2) {
            assert!(pair[0].end <= pair[1].start, "records overlap after round {}", round);
        }
        let mut seen: Vec<Option<u8>> = vec![None; COINS];
        for record in &records {
            assert!(record.start < record.end);
            for coin in record.start.as_usize()..record.end.as_usize() {
                seen[coin] = Some(record.value[0]);
            }
        }
        assert_eq!(seen, model, "store diverged from model after round {}", round);
    }
}

#[test]
fn test_sibling_buckets_and_root_are_isolated() {
    let root = RangeStore::new(Arc::new(MemoryStore::new()));
    let a = root.bucket(b"a");
    let b = root.bucket(b"b");
    a.put(n(0), n(100), b"in a").unwrap();

    assert!(b.get(n(0), n(100)).unwrap().is_empty());
    assert!(root.get(n(0), n(100)).unwrap().is_empty());
    assert_eq!(a.get(n(50), n(60)).unwrap().len(), 1);
}

#[test]
fn test_del_removes_whole_overlapping_records() {
    let store = RangeStore::new(Arc::new(MemoryStore::new()));
    store.put(n(0), n(10), b"x").unwrap();
    store.put(n(10), n(20), b"y").unwrap();
    store.put(n(20), n(30), b"z").unwrap();

    // [5, 15) touches the first two records; both go entirely
    let removed = store.del(n(5), n(15)).unwrap();
    assert_eq!(spans(&removed), vec![(0, 10, b"x".to_vec()), (10, 20, b"y".to_vec())]);
    assert_eq!(spans(&store.all().unwrap()), vec![(20, 30, b"z".to_vec())]);
}

#[test]
fn test_iter_is_lazy_and_bounded() {
    let store = RangeStore::new(Arc::new(MemoryStore::new()));
    for i in 0..10u64 {
        store.put(n(i * 10), n(i * 10 + 5), &[i as u8]).unwrap();
    }
    let first_two: Vec<RangeRecord> = store.iter(n(0), None).take(2).collect::<Result<_, _>>().unwrap();
    assert_eq!(spans(&first_two), vec![(0, 5, vec![0]), (10, 15, vec![1])]);

    let bounded: Vec<RangeRecord> = store.iter(n(25), Some(n(50))).collect::<Result<_, _>>().unwrap();
    assert_eq!(spans(&bounded), vec![(30, 35, vec![3]), (40, 45, vec![4])]);
}
