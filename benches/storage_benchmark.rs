use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::tempdir;

use ovm_plasma::crypto::{Hasher, Keccak256Hasher};
use ovm_plasma::merkle::{DoubleLayerTree, DoubleLayerTreeLeaf};
use ovm_plasma::storage::{MemoryStore, RangeStore, RocksDBStore};
use ovm_plasma::types::{Address, H256, U256};

fn filled_store(store: RangeStore, count: u64) -> RangeStore {
    for i in 0..count {
        store.put(U256::from(i * 10), U256::from(i * 10 + 10), &i.to_be_bytes()).unwrap();
    }
    store
}

fn bench_range_store_put(c: &mut Criterion) {
    c.bench_function("range_store_put_memory", |b| {
        b.iter_batched(
            || RangeStore::new(Arc::new(MemoryStore::new())),
            |store| filled_store(store, 100),
            BatchSize::SmallInput,
        )
    });

    let temp_dir = tempdir().unwrap();
    let store = RangeStore::new(Arc::new(RocksDBStore::new(temp_dir.path()).unwrap()));
    let mut round = 0u64;
    c.bench_function("range_store_put_rocksdb", |b| {
        b.iter(|| {
            round += 1;
            // every put splices the previous record of the same slot
            let start = U256::from(round % 1000 * 10 + 5);
            store.put(start, start + U256::from(10), black_box(&round.to_be_bytes())).unwrap();
        })
    });
}

fn bench_range_store_get(c: &mut Criterion) {
    let store = filled_store(RangeStore::new(Arc::new(MemoryStore::new())), 1000);
    c.bench_function("range_store_get_memory", |b| {
        b.iter(|| store.get(black_box(U256::from(4995)), black_box(U256::from(5105))).unwrap())
    });

    let temp_dir = tempdir().unwrap();
    let store = filled_store(RangeStore::new(Arc::new(RocksDBStore::new(temp_dir.path()).unwrap())), 1000);
    c.bench_function("range_store_get_rocksdb", |b| {
        b.iter(|| store.get(black_box(U256::from(4995)), black_box(U256::from(5105))).unwrap())
    });
}

fn bench_double_layer_tree(c: &mut Criterion) {
    let hasher: Arc<dyn Hasher> = Arc::new(Keccak256Hasher);
    let leaves: Vec<DoubleLayerTreeLeaf> = (1..=4u64)
        .flat_map(|token| {
            (0..256u64).map(move |i| {
                DoubleLayerTreeLeaf::new(Address::from_low_u64_be(token), U256::from(i * 100), H256::from_low_u64_be(i))
            })
        })
        .collect();

    c.bench_function("double_layer_tree_1024_leaves", |b| {
        b.iter(|| DoubleLayerTree::new(black_box(leaves.clone()), hasher.clone()).unwrap().get_root())
    });

    let tree = DoubleLayerTree::new(leaves, hasher).unwrap();
    c.bench_function("double_layer_tree_proof", |b| {
        b.iter(|| tree.get_inclusion_proof_by_address_and_index(&Address::from_low_u64_be(3), black_box(128)).unwrap())
    });
}

criterion_group!(benches, bench_range_store_put, bench_range_store_get, bench_double_layer_tree);
criterion_main!(benches);
