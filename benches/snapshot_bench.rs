//! Benchmarks for snapshot reads over the in-memory engine

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use snapkv::engine::MemoryEngine;
use snapkv::{Config, Key, KvIterator, MvccSnapshot, Snapshot, SnapshotStorage, Version};

const ROWS: usize = 10_000;

fn seeded_storage() -> SnapshotStorage<MemoryEngine> {
    let config = Config::default();
    let engine = MemoryEngine::new();
    for i in 0..ROWS {
        let key = format!("key{i:06}");
        engine.put(&config.store_name, key.as_bytes(), &config.column, format!("value{i}")).unwrap();
    }
    SnapshotStorage::new(engine, config).unwrap()
}

fn snapshot_benchmarks(c: &mut Criterion) {
    let storage = seeded_storage();
    let snapshot = storage.get_snapshot().unwrap();

    c.bench_function("get", |b| {
        b.iter(|| snapshot.get(black_box(b"key004242".as_slice())).unwrap())
    });

    c.bench_function("mvcc_get", |b| {
        b.iter(|| {
            snapshot
                .mvcc_get(black_box(b"key004242".as_slice()), Version::new(5000))
                .unwrap()
        })
    });

    let keys: Vec<Key> = (0..100).map(|i| Key::from(format!("key{:06}", i * 97))).collect();
    c.bench_function("batch_get_100", |b| {
        b.iter(|| snapshot.batch_get(black_box(&keys[..])).unwrap())
    });

    c.bench_function("range_get_1000", |b| {
        b.iter(|| snapshot.range_get(b"key001000", b"key001999", 1000).unwrap())
    });

    c.bench_function("iterate_all", |b| {
        b.iter(|| {
            let mut iter = snapshot.new_iterator(b"").unwrap();
            let mut count = 0;
            while iter.valid() {
                count += 1;
                iter.advance().unwrap();
            }
            count
        })
    });
}

criterion_group!(benches, snapshot_benchmarks);
criterion_main!(benches);
