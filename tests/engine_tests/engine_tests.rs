//! Tests for the LSM ordered map engine
//!
//! These tests verify:
//! - Point reads and writes across MemTable and SSTables
//! - Automatic flushes at the memtable size limit, and retries after a failed one
//! - Crash recovery from the WAL, batches included
//! - Range cursors merged across layers with tombstones
//! - Clearing on open

use std::ops::Bound;

use tempfile::TempDir;
use vbakv::config::WalSyncStrategy;
use vbakv::{BatchOp, Config, LsmEngine, MemoryEngine, OrderedMap, VbaError};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_engine() -> (TempDir, LsmEngine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = LsmEngine::open_path(temp_dir.path()).unwrap();
    (temp_dir, engine)
}

fn small_memtable_config(dir: &std::path::Path) -> Config {
    Config::builder()
        .data_dir(dir)
        .memtable_size_limit(64)
        .build()
}

fn range_keys(
    engine: &impl OrderedMap,
    lower: Bound<&[u8]>,
    upper: Bound<&[u8]>,
    reverse: bool,
) -> Vec<Vec<u8>> {
    engine
        .range(lower, upper, reverse)
        .unwrap()
        .map(|item| item.unwrap().0)
        .collect()
}

fn key(i: usize) -> Vec<u8> {
    format!("key{:04}", i).into_bytes()
}

// =============================================================================
// Point Operation Tests
// =============================================================================

#[test]
fn test_put_get_delete() {
    let (_temp, engine) = setup_engine();

    engine.put(b"k", b"v").unwrap();
    assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));

    engine.delete(b"k").unwrap();
    assert_eq!(engine.get(b"k").unwrap(), None);
    assert_eq!(engine.get(b"never").unwrap(), None);
}

#[test]
fn test_flush_moves_memtable_to_sstable() {
    let (_temp, engine) = setup_engine();
    engine.put(b"a", b"1").unwrap();
    engine.put(b"b", b"2").unwrap();

    engine.flush().unwrap();

    assert_eq!(engine.memtable_entry_count(), 0);
    assert_eq!(engine.sstable_count(), 1);
    assert_eq!(engine.get(b"a").unwrap(), Some(b"1".to_vec()));
}

#[test]
fn test_flush_of_empty_memtable_is_noop() {
    let (_temp, engine) = setup_engine();

    engine.flush().unwrap();

    assert_eq!(engine.sstable_count(), 0);
}

#[test]
fn test_tombstone_in_memtable_hides_sstable_value() {
    let (_temp, engine) = setup_engine();
    engine.put(b"k", b"old").unwrap();
    engine.flush().unwrap();

    engine.delete(b"k").unwrap();
    assert_eq!(engine.get(b"k").unwrap(), None);

    // Tombstone survives its own flush
    engine.flush().unwrap();
    assert_eq!(engine.get(b"k").unwrap(), None);
    assert_eq!(engine.sstable_count(), 2);
}

#[test]
fn test_newer_sstable_wins() {
    let (_temp, engine) = setup_engine();
    engine.put(b"k", b"v1").unwrap();
    engine.flush().unwrap();
    engine.put(b"k", b"v2").unwrap();
    engine.flush().unwrap();

    assert_eq!(engine.get(b"k").unwrap(), Some(b"v2".to_vec()));
}

#[test]
fn test_size_limit_triggers_flush() {
    let temp_dir = TempDir::new().unwrap();
    let engine = LsmEngine::open(small_memtable_config(temp_dir.path())).unwrap();

    for i in 0..20 {
        engine.put(&key(i), b"0123456789").unwrap();
    }

    assert!(engine.sstable_count() >= 2);
    assert!(engine.memtable_size() < 64);
    for i in 0..20 {
        assert_eq!(engine.get(&key(i)).unwrap(), Some(b"0123456789".to_vec()));
    }
}

#[test]
fn test_failed_flush_keeps_write_committed() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .memtable_size_limit(1)
        .build();
    let engine = LsmEngine::open(config).unwrap();
    std::fs::remove_dir_all(engine.storage_dir()).unwrap();

    engine
        .write_batch(vec![BatchOp::Put { key: b"k".to_vec(), value: b"v".to_vec() }], false)
        .unwrap();
    engine.delete(b"gone").unwrap();

    assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(engine.sstable_count(), 0);
    assert_eq!(engine.memtable_entry_count(), 2);

    // The next write retries the flush
    std::fs::create_dir_all(engine.storage_dir()).unwrap();
    engine.put(b"k2", b"v2").unwrap();

    assert_eq!(engine.sstable_count(), 1);
    assert_eq!(engine.memtable_entry_count(), 0);
    assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(engine.get(b"k2").unwrap(), Some(b"v2".to_vec()));
}

#[test]
fn test_unflushed_writes_recover_after_failed_flush() {
    let temp_dir = TempDir::new().unwrap();
    {
        let config = Config::builder()
            .data_dir(temp_dir.path())
            .memtable_size_limit(1)
            .build();
        let engine = LsmEngine::open(config).unwrap();
        std::fs::remove_dir_all(engine.storage_dir()).unwrap();
        engine.put(b"k", b"v").unwrap();
    }

    let engine = LsmEngine::open_path(temp_dir.path()).unwrap();
    assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = TempDir::new().unwrap();

    let zero_limit = Config::builder()
        .data_dir(temp_dir.path())
        .memtable_size_limit(0)
        .build();
    assert!(matches!(LsmEngine::open(zero_limit), Err(VbaError::Config(_))));

    let zero_sync = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryNEntries { count: 0 })
        .build();
    assert!(matches!(LsmEngine::open(zero_sync), Err(VbaError::Config(_))));
}

// =============================================================================
// Batch Tests
// =============================================================================

#[test]
fn test_write_batch_applies_in_order() {
    let (_temp, engine) = setup_engine();
    engine.put(b"gone", b"x").unwrap();

    engine
        .write_batch(
            vec![
                BatchOp::Put { key: b"a".to_vec(), value: b"1".to_vec() },
                BatchOp::Put { key: b"a".to_vec(), value: b"2".to_vec() },
                BatchOp::Delete { key: b"gone".to_vec() },
            ],
            true,
        )
        .unwrap();

    assert_eq!(engine.get(b"a").unwrap(), Some(b"2".to_vec()));
    assert_eq!(engine.get(b"gone").unwrap(), None);
}

#[test]
fn test_empty_batch_is_noop() {
    let (_temp, engine) = setup_engine();

    engine.write_batch(Vec::new(), true).unwrap();

    assert_eq!(engine.memtable_entry_count(), 0);
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recovery_after_drop() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = LsmEngine::open_path(temp_dir.path()).unwrap();
        engine.put(b"a", b"1").unwrap();
        engine.put(b"b", b"2").unwrap();
        engine.delete(b"a").unwrap();
    }

    let engine = LsmEngine::open_path(temp_dir.path()).unwrap();
    assert_eq!(engine.get(b"a").unwrap(), None);
    assert_eq!(engine.get(b"b").unwrap(), Some(b"2".to_vec()));
    // Replayed entries are flushed straight to an SSTable
    assert_eq!(engine.memtable_entry_count(), 0);
    assert_eq!(engine.sstable_count(), 1);
}

#[test]
fn test_batch_recovery() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = LsmEngine::open_path(temp_dir.path()).unwrap();
        engine
            .write_batch(
                vec![
                    BatchOp::Put { key: b"x".to_vec(), value: b"1".to_vec() },
                    BatchOp::Put { key: b"y".to_vec(), value: b"2".to_vec() },
                ],
                false,
            )
            .unwrap();
    }

    let engine = LsmEngine::open_path(temp_dir.path()).unwrap();
    assert_eq!(engine.get(b"x").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.get(b"y").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_torn_wal_tail_drops_only_last_write() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = LsmEngine::open_path(temp_dir.path()).unwrap();
        engine.put(b"kept", b"1").unwrap();
        engine
            .write_batch(
                vec![
                    BatchOp::Put { key: b"p".to_vec(), value: b"1".to_vec() },
                    BatchOp::Put { key: b"q".to_vec(), value: b"2".to_vec() },
                ],
                true,
            )
            .unwrap();
    }
    // Chop the batch record in half, as a crash mid-append would
    let wal_path = temp_dir.path().join("wal.log");
    let len = std::fs::metadata(&wal_path).unwrap().len();
    let file = std::fs::OpenOptions::new().write(true).open(&wal_path).unwrap();
    file.set_len(len - 5).unwrap();

    let engine = LsmEngine::open_path(temp_dir.path()).unwrap();
    assert_eq!(engine.get(b"kept").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.get(b"p").unwrap(), None);
    assert_eq!(engine.get(b"q").unwrap(), None);
}

#[test]
fn test_reopen_after_close() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = LsmEngine::open_path(temp_dir.path()).unwrap();
        engine.put(b"k", b"v").unwrap();
        engine.close().unwrap();
    }

    let engine = LsmEngine::open_path(temp_dir.path()).unwrap();
    assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_clear_on_open() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = LsmEngine::open_path(temp_dir.path()).unwrap();
        engine.put(b"flushed", b"1").unwrap();
        engine.flush().unwrap();
        engine.put(b"logged", b"2").unwrap();
    }

    let engine = LsmEngine::open(
        Config::builder()
            .data_dir(temp_dir.path())
            .clear(true)
            .build(),
    )
    .unwrap();

    assert_eq!(engine.sstable_count(), 0);
    assert_eq!(engine.get(b"flushed").unwrap(), None);
    assert_eq!(engine.get(b"logged").unwrap(), None);
}

// =============================================================================
// Range Tests
// =============================================================================

#[test]
fn test_range_merges_layers() {
    let (_temp, engine) = setup_engine();
    engine.put(b"a", b"old").unwrap();
    engine.put(b"b", b"1").unwrap();
    engine.put(b"c", b"1").unwrap();
    engine.flush().unwrap();

    engine.put(b"a", b"new").unwrap();
    engine.delete(b"b").unwrap();
    engine.put(b"d", b"1").unwrap();

    let entries: Vec<(Vec<u8>, Vec<u8>)> = engine
        .range(Bound::Unbounded, Bound::Unbounded, false)
        .unwrap()
        .map(|item| item.unwrap())
        .collect();

    assert_eq!(
        entries,
        vec![
            (b"a".to_vec(), b"new".to_vec()),
            (b"c".to_vec(), b"1".to_vec()),
            (b"d".to_vec(), b"1".to_vec()),
        ]
    );
}

#[test]
fn test_range_bounds_and_reverse() {
    let (_temp, engine) = setup_engine();
    for i in 0..10 {
        engine.put(&key(i), b"v").unwrap();
        if i == 4 {
            engine.flush().unwrap();
        }
    }
    let (lo, hi) = (key(2), key(6));
    let (lo, hi) = (lo.as_slice(), hi.as_slice());

    let forward = range_keys(&engine, Bound::Included(lo), Bound::Excluded(hi), false);
    assert_eq!(forward, (2..6).map(key).collect::<Vec<_>>());

    let backward = range_keys(&engine, Bound::Excluded(lo), Bound::Included(hi), true);
    assert_eq!(backward, (3..=6).rev().map(key).collect::<Vec<_>>());
}

#[test]
fn test_inverted_range_is_empty() {
    let (_temp, engine) = setup_engine();
    engine.put(b"m", b"v").unwrap();
    let (lo, hi): (&[u8], &[u8]) = (b"z", b"a");

    assert!(range_keys(&engine, Bound::Included(lo), Bound::Included(hi), false).is_empty());
}

#[test]
fn test_range_cursor_is_a_snapshot() {
    let (_temp, engine) = setup_engine();
    engine.put(b"a", b"1").unwrap();
    let cursor = engine.range(Bound::Unbounded, Bound::Unbounded, false).unwrap();

    engine.put(b"b", b"2").unwrap();
    engine.flush().unwrap();

    assert_eq!(cursor.count(), 1);
}

#[test]
fn test_lsm_matches_memory_engine() {
    let (_temp, lsm) = setup_engine();
    let memory = MemoryEngine::new();

    for i in 0..30 {
        let k = key(i * 7 % 30);
        if i % 4 == 3 {
            lsm.delete(&k).unwrap();
            memory.delete(&k).unwrap();
        } else {
            let v = format!("v{}", i).into_bytes();
            lsm.put(&k, &v).unwrap();
            memory.put(&k, &v).unwrap();
        }
        if i % 10 == 9 {
            lsm.flush().unwrap();
        }
    }

    let collect = |engine: &dyn OrderedMap| -> Vec<(Vec<u8>, Vec<u8>)> {
        engine
            .range(Bound::Unbounded, Bound::Unbounded, false)
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
    };
    assert_eq!(collect(&lsm), collect(&memory));
}
