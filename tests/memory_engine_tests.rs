//! Tests for the in-memory engine
//!
//! These tests verify:
//! - Column and time-range helpers of the engine model
//! - Visibility by read version and time range
//! - Column selection
//! - Scanner bounds, batching and close
//! - Transaction release accounting
//! - Dump / load round trip

use snapkv::config::Config;
use snapkv::engine::{
    Column, EngineError, Get, MemoryEngine, ScanOptions, Scanner, TimeRange, Transaction,
    TxnEngine, MAX_WRITE_VERSION,
};
use snapkv::{MvccSnapshot, SnapError, Snapshot, SnapshotStorage, Version};
use tempfile::TempDir;

const TABLE: &str = "t";

// =============================================================================
// Helper Functions
// =============================================================================

fn col() -> Column {
    Column::new("f", "q")
}

fn scan_keys<S: Scanner>(scanner: &mut S) -> Vec<Vec<u8>> {
    let mut keys = Vec::new();
    while let Some(row) = scanner.next().unwrap() {
        keys.push(row.row);
    }
    keys
}

// =============================================================================
// Engine Model Tests
// =============================================================================

#[test]
fn test_column_parse() {
    assert_eq!(Column::parse("f:q"), Some(Column::new("f", "q")));
    assert_eq!(Column::parse("f:a:b"), Some(Column::new("f", "a:b")));
    assert_eq!(Column::parse("noqualifier"), None);
    assert_eq!(Column::new("cf", "v").to_string(), "cf:v");
}

#[test]
fn test_time_range_up_to() {
    let range = TimeRange::up_to(Version::new(5));

    assert!(range.contains(0));
    assert!(range.contains(5));
    assert!(!range.contains(6));
    assert_eq!(TimeRange::up_to(Version::MAX).to, u64::MAX);
    assert!(TimeRange::up_to(Version::MAX).contains(MAX_WRITE_VERSION.ver));
}

// =============================================================================
// Visibility Tests
// =============================================================================

#[test]
fn test_put_assigns_increasing_versions() {
    let engine = MemoryEngine::new();

    let v1 = engine.put(TABLE, b"a", &col(), "1").unwrap();
    let v2 = engine.put(TABLE, b"b", &col(), "2").unwrap();

    assert!(v2 > v1);
    assert_eq!(engine.current_version().unwrap(), v2);
}

#[test]
fn test_put_at_rejects_version_zero() {
    let engine = MemoryEngine::new();

    assert!(engine.put_at(TABLE, b"a", &col(), Version::MIN, "x").is_err());
}

#[test]
fn test_put_at_rejects_unreadable_max_version() {
    let engine = MemoryEngine::new();

    let err = engine.put_at(TABLE, b"a", &col(), Version::MAX, "x").unwrap_err();

    assert!(matches!(err, SnapError::InvalidArgument(_)));
    assert_eq!(engine.current_version().unwrap(), Version::MIN);
}

#[test]
fn test_highest_writable_version_is_readable() {
    let engine = MemoryEngine::new();
    engine.put_at(TABLE, b"k", &col(), MAX_WRITE_VERSION, "top").unwrap();

    let storage = SnapshotStorage::new(engine.clone(), Config::default()).unwrap();
    let snapshot = storage.get_snapshot().unwrap();

    assert_eq!(&snapshot.get(b"k").unwrap()[..], b"top");
    assert_eq!(&snapshot.mvcc_get(b"k", Version::MAX).unwrap()[..], b"top");
    assert_eq!(&snapshot.mvcc_get(b"k", MAX_WRITE_VERSION).unwrap()[..], b"top");
}

#[test]
fn test_put_after_version_space_exhausted_fails() {
    let engine = MemoryEngine::new();
    engine.put_at(TABLE, b"k", &col(), MAX_WRITE_VERSION, "top").unwrap();

    let put_err = engine.put(TABLE, b"k", &col(), "next").unwrap_err();
    let delete_err = engine.delete(TABLE, b"k", &col()).unwrap_err();

    assert!(matches!(put_err, SnapError::Engine { op: "put", .. }));
    assert!(matches!(delete_err, SnapError::Engine { op: "delete", .. }));
    assert_eq!(engine.current_version().unwrap(), MAX_WRITE_VERSION);

    // Nothing was written at a wrapped-around version
    let txn = engine.begin().unwrap();
    let row = txn.get(TABLE, &Get::new("k")).unwrap().unwrap();
    assert_eq!(&row.value(&col()).unwrap()[..], b"top");
    assert!(engine.begin_at(Version::MIN).get(TABLE, &Get::new("k")).unwrap().is_none());
}

#[test]
fn test_put_at_advances_current_version() {
    let engine = MemoryEngine::new();
    engine.put_at(TABLE, b"a", &col(), Version::new(10), "x").unwrap();
    engine.put_at(TABLE, b"a", &col(), Version::new(4), "old").unwrap();

    assert_eq!(engine.current_version().unwrap(), Version::new(10));
    // Next automatic version continues after the highest one
    assert_eq!(engine.put(TABLE, b"b", &col(), "y").unwrap(), Version::new(11));
}

#[test]
fn test_transaction_reads_at_begin_version() {
    let engine = MemoryEngine::new();
    engine.put(TABLE, b"a", &col(), "old").unwrap();

    let txn = engine.begin().unwrap();
    engine.put(TABLE, b"a", &col(), "new").unwrap();

    let row = txn.get(TABLE, &Get::new("a").add_column(col())).unwrap().unwrap();
    assert_eq!(&row.value(&col()).unwrap()[..], b"old");
    assert_eq!(txn.read_version(), Version::new(1));
}

#[test]
fn test_begin_at_older_version() {
    let engine = MemoryEngine::new();
    engine.put(TABLE, b"a", &col(), "v1").unwrap();
    engine.put(TABLE, b"a", &col(), "v2").unwrap();

    let txn = engine.begin_at(Version::new(1));
    let row = txn.get(TABLE, &Get::new("a")).unwrap().unwrap();

    assert_eq!(&row.value(&col()).unwrap()[..], b"v1");
    assert_eq!(row.columns[&col()].ts, 1);
}

#[test]
fn test_time_range_restricts_versions() {
    let engine = MemoryEngine::new();
    engine.put(TABLE, b"a", &col(), "v1").unwrap();
    engine.put(TABLE, b"a", &col(), "v2").unwrap();
    engine.put(TABLE, b"a", &col(), "v3").unwrap();

    let txn = engine.begin().unwrap();
    let get = |range| {
        txn.get(TABLE, &Get::new("a").add_column(col()).time_range(range))
            .unwrap()
            .and_then(|row| row.value(&col()).cloned())
    };

    assert_eq!(get(TimeRange::up_to(Version::new(2))).unwrap(), "v2");
    assert_eq!(get(TimeRange { from: 3, to: 4 }).unwrap(), "v3");
    assert_eq!(get(TimeRange::up_to(Version::MIN)), None);
    assert_eq!(get(TimeRange { from: 5, to: 2 }), None);
}

#[test]
fn test_column_selection() {
    let engine = MemoryEngine::new();
    let other = Column::new("f", "other");
    engine.put(TABLE, b"a", &col(), "main").unwrap();
    engine.put(TABLE, b"a", &other, "side").unwrap();

    let txn = engine.begin().unwrap();

    let all = txn.get(TABLE, &Get::new("a")).unwrap().unwrap();
    assert_eq!(all.columns.len(), 2);

    let one = txn.get(TABLE, &Get::new("a").add_column(other.clone())).unwrap().unwrap();
    assert_eq!(one.columns.len(), 1);
    assert_eq!(&one.value(&other).unwrap()[..], b"side");
}

#[test]
fn test_batch_get_leaves_out_invisible_rows() {
    let engine = MemoryEngine::new();
    engine.put(TABLE, b"a", &col(), "1").unwrap();
    engine.put(TABLE, b"c", &col(), "3").unwrap();

    let txn = engine.begin().unwrap();
    let rows = txn
        .batch_get(TABLE, &[Get::new("a"), Get::new("b"), Get::new("c")])
        .unwrap();

    let keys: Vec<_> = rows.into_iter().map(|r| r.row).collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"c".to_vec()]);
}

#[test]
fn test_unknown_table_is_empty() {
    let engine = MemoryEngine::new();
    engine.put(TABLE, b"a", &col(), "1").unwrap();

    let txn = engine.begin().unwrap();

    assert!(txn.get("missing", &Get::new("a")).unwrap().is_none());
    assert!(txn.batch_get("missing", &[Get::new("a")]).unwrap().is_empty());
    let mut scanner = txn.scanner("missing", ScanOptions::new("")).unwrap();
    assert!(scanner.next().unwrap().is_none());
}

// =============================================================================
// Scanner Tests
// =============================================================================

#[test]
fn test_scanner_end_is_exclusive() {
    let engine = MemoryEngine::new();
    for k in ["a", "b", "c", "d"] {
        engine.put(TABLE, k.as_bytes(), &col(), "v").unwrap();
    }

    let txn = engine.begin().unwrap();
    let mut scanner = txn.scanner(TABLE, ScanOptions::new("b").end("d")).unwrap();

    assert_eq!(scan_keys(&mut scanner), vec![b"b".to_vec(), b"c".to_vec()]);
}

#[test]
fn test_scanner_batches_cover_whole_range() {
    let engine = MemoryEngine::new();
    for i in 0..25u32 {
        engine.put(TABLE, format!("k{i:03}").as_bytes(), &col(), "v").unwrap();
    }

    let txn = engine.begin().unwrap();
    for batch in [1, 2, 7, 25, 100] {
        let mut scanner = txn
            .scanner(TABLE, ScanOptions::new("").batch_size(batch))
            .unwrap();
        assert_eq!(scan_keys(&mut scanner).len(), 25, "batch size {batch}");
    }
}

#[test]
fn test_scanner_empty_and_inverted_ranges() {
    let engine = MemoryEngine::new();
    engine.put(TABLE, b"m", &col(), "v").unwrap();

    let txn = engine.begin().unwrap();

    let mut same = txn.scanner(TABLE, ScanOptions::new("m").end("m")).unwrap();
    assert!(same.next().unwrap().is_none());

    let mut inverted = txn.scanner(TABLE, ScanOptions::new("z").end("a")).unwrap();
    assert!(inverted.next().unwrap().is_none());
}

#[test]
fn test_scanner_close_accounting() {
    let engine = MemoryEngine::new();
    engine.put(TABLE, b"a", &col(), "v").unwrap();

    let txn = engine.begin().unwrap();
    let mut scanner = txn.scanner(TABLE, ScanOptions::new("")).unwrap();
    assert_eq!(engine.open_scanners(), 1);

    scanner.close();
    scanner.close();

    assert!(scanner.is_closed());
    assert_eq!(engine.open_scanners(), 0);
    assert_eq!(scanner.next().unwrap_err(), EngineError::ScannerClosed);
}

// =============================================================================
// Transaction Lifecycle Tests
// =============================================================================

#[test]
fn test_release_accounting() {
    let engine = MemoryEngine::new();

    let mut txn = engine.begin().unwrap();
    let _other = engine.begin().unwrap();
    assert_eq!(engine.open_transactions(), 2);

    txn.release();
    txn.release();

    assert!(txn.is_released());
    assert_eq!(engine.open_transactions(), 1);
    assert_eq!(txn.get(TABLE, &Get::new("a")).unwrap_err(), EngineError::Released);
}

#[test]
fn test_injected_read_failure() {
    let engine = MemoryEngine::new();
    engine.put(TABLE, b"a", &col(), "v").unwrap();
    let txn = engine.begin().unwrap();

    engine.set_fail_reads(true);
    assert!(matches!(
        txn.get(TABLE, &Get::new("a")).unwrap_err(),
        EngineError::Unavailable(_)
    ));

    engine.set_fail_reads(false);
    assert!(txn.get(TABLE, &Get::new("a")).unwrap().is_some());
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_save_and_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("engine.bin");

    let engine = MemoryEngine::new();
    engine.put(TABLE, b"a", &col(), "v1").unwrap();
    engine.put(TABLE, b"a", &col(), "v2").unwrap();
    engine.delete(TABLE, b"b", &col()).unwrap();
    engine.put("other", b"x", &Column::new("cf", "q2"), "y").unwrap();
    engine.save(&path).unwrap();

    let loaded = MemoryEngine::load(&path).unwrap();
    assert_eq!(loaded.current_version().unwrap(), Version::new(4));

    let txn = loaded.begin_at(Version::new(1));
    let row = txn.get(TABLE, &Get::new("a")).unwrap().unwrap();
    assert_eq!(&row.value(&col()).unwrap()[..], b"v1");

    let txn = loaded.begin().unwrap();
    let row = txn.get(TABLE, &Get::new("a")).unwrap().unwrap();
    assert_eq!(&row.value(&col()).unwrap()[..], b"v2");
    assert!(txn.get(TABLE, &Get::new("b")).unwrap().is_none());
    assert!(txn.get("other", &Get::new("x")).unwrap().is_some());
}

#[test]
fn test_load_missing_file_is_empty() {
    let temp_dir = TempDir::new().unwrap();

    let engine = MemoryEngine::load(&temp_dir.path().join("absent.bin")).unwrap();

    assert_eq!(engine.current_version().unwrap(), Version::MIN);
}

#[test]
fn test_load_garbage_fails() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("garbage.bin");
    std::fs::write(&path, [0xFFu8; 3]).unwrap();

    assert!(MemoryEngine::load(&path).is_err());
}
