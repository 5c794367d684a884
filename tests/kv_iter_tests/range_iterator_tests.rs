//! Tests for RangeIterator
//!
//! These tests verify:
//! - Boundary inclusion flags on both ends
//! - Prefix scans, including 0xFF boundary bytes
//! - Forward and reverse ordering
//! - has_next / get_next buffering and terminal exhaustion
//! - Key / value projection

use std::ops::Bound;

use vbakv::engine::Cursor;
use vbakv::kv_iter::{closure_key, Projection};
use vbakv::{
    BatchOp, Entry, MemoryEngine, OrderedMap, RangeIterator, RangeSpec, Result, VbaError,
};

// =============================================================================
// Helper Functions
// =============================================================================

/// Engine holding keys "1".."5" with values "v1".."v5"
fn setup_numbered_engine() -> MemoryEngine {
    let engine = MemoryEngine::new();
    for i in 1..=5 {
        engine
            .put(i.to_string().as_bytes(), format!("v{}", i).as_bytes())
            .unwrap();
    }
    engine
}

fn setup_engine_with(keys: &[&[u8]]) -> MemoryEngine {
    let engine = MemoryEngine::new();
    for key in keys {
        engine.put(key, b"x").unwrap();
    }
    engine
}

fn interval(start: &str, stop: &str, include_start: bool, include_stop: bool) -> RangeSpec {
    RangeSpec::Interval {
        start: Some(start.as_bytes().to_vec()),
        stop: Some(stop.as_bytes().to_vec()),
        include_start,
        include_stop,
    }
}

fn collect_keys(engine: &MemoryEngine, spec: RangeSpec, reverse: bool) -> Vec<Vec<u8>> {
    RangeIterator::new(engine, spec, Projection::Key, reverse)
        .unwrap()
        .map(|entry| entry.unwrap().key().unwrap().to_vec())
        .collect()
}

fn keys(list: &[&str]) -> Vec<Vec<u8>> {
    list.iter().map(|k| k.as_bytes().to_vec()).collect()
}

// =============================================================================
// Boundary Inclusion Tests
// =============================================================================

#[test]
fn test_exclude_start_include_stop() {
    let engine = setup_numbered_engine();

    let result = collect_keys(&engine, interval("2", "4", false, true), false);

    assert_eq!(result, keys(&["3", "4"]));
}

#[test]
fn test_include_start_exclude_stop() {
    let engine = setup_numbered_engine();

    let result = collect_keys(&engine, interval("2", "4", true, false), false);

    assert_eq!(result, keys(&["2", "3"]));
}

#[test]
fn test_both_bounds_inclusive_and_exclusive() {
    let engine = setup_numbered_engine();

    assert_eq!(
        collect_keys(&engine, interval("2", "4", true, true), false),
        keys(&["2", "3", "4"])
    );
    assert_eq!(
        collect_keys(&engine, interval("2", "4", false, false), false),
        keys(&["3"])
    );
}

#[test]
fn test_bounds_between_existing_keys() {
    let engine = setup_engine_with(&[b"a", b"c", b"e"]);

    let result = collect_keys(&engine, interval("b", "d", false, true), false);

    assert_eq!(result, keys(&["c"]));
}

#[test]
fn test_open_ended_intervals() {
    let engine = setup_numbered_engine();

    let from_three = RangeSpec::Interval {
        start: Some(b"3".to_vec()),
        stop: None,
        include_start: false,
        include_stop: false,
    };
    assert_eq!(collect_keys(&engine, from_three, false), keys(&["4", "5"]));

    let up_to_two = RangeSpec::Interval {
        start: None,
        stop: Some(b"2".to_vec()),
        include_start: true,
        include_stop: true,
    };
    assert_eq!(collect_keys(&engine, up_to_two, false), keys(&["1", "2"]));

    assert_eq!(
        collect_keys(&engine, RangeSpec::all(), false),
        keys(&["1", "2", "3", "4", "5"])
    );
}

#[test]
fn test_inverted_and_degenerate_intervals_are_empty() {
    let engine = setup_numbered_engine();

    assert!(collect_keys(&engine, interval("4", "2", true, true), false).is_empty());
    assert!(collect_keys(&engine, interval("3", "3", true, false), false).is_empty());
    assert_eq!(
        collect_keys(&engine, interval("3", "3", true, true), false),
        keys(&["3"])
    );
}

// =============================================================================
// Prefix Tests
// =============================================================================

#[test]
fn test_prefix_scan() {
    let engine = setup_engine_with(&[b"ab", b"abc", b"ac", b"b"]);

    let result = collect_keys(&engine, RangeSpec::Prefix(b"ab".to_vec()), false);

    assert_eq!(result, keys(&["ab", "abc"]));
}

#[test]
fn test_prefix_with_trailing_ff() {
    let engine = setup_engine_with(&[
        &[0x61, 0xFF],
        &[0x61, 0xFF, 0x00],
        &[0x61, 0xFF, 0xFF],
        &[0x62],
        &[0x62, 0x00],
    ]);

    let result = collect_keys(&engine, RangeSpec::Prefix(vec![0x61, 0xFF]), false);

    assert_eq!(
        result,
        vec![vec![0x61, 0xFF], vec![0x61, 0xFF, 0x00], vec![0x61, 0xFF, 0xFF]]
    );
}

#[test]
fn test_all_ff_prefix_has_no_upper_bound() {
    let engine = setup_engine_with(&[&[0xFE], &[0xFF], &[0xFF, 0x01], &[0xFF, 0xFF, 0xFF]]);

    let result = collect_keys(&engine, RangeSpec::Prefix(vec![0xFF]), false);

    assert_eq!(result, vec![vec![0xFF], vec![0xFF, 0x01], vec![0xFF, 0xFF, 0xFF]]);
}

#[test]
fn test_prefix_reverse() {
    let engine = setup_engine_with(&[b"ab", b"abc", b"abd", b"ac"]);

    let result = collect_keys(&engine, RangeSpec::Prefix(b"ab".to_vec()), true);

    assert_eq!(result, keys(&["abd", "abc", "ab"]));
}

#[test]
fn test_prefix_without_matches() {
    let engine = setup_engine_with(&[b"aa", b"ac"]);

    assert!(collect_keys(&engine, RangeSpec::Prefix(b"ab".to_vec()), false).is_empty());
}

#[test]
fn test_closure_key_values() {
    assert_eq!(closure_key(b"ab"), Some(b"ac".to_vec()));
    assert_eq!(closure_key(&[0x01, 0xFF, 0xFF]), Some(vec![0x02]));
    assert_eq!(closure_key(&[0xFF]), None);
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_reverse_respects_inclusion() {
    let engine = setup_numbered_engine();

    assert_eq!(
        collect_keys(&engine, interval("2", "4", false, true), true),
        keys(&["4", "3"])
    );
    assert_eq!(
        collect_keys(&engine, interval("2", "4", true, false), true),
        keys(&["3", "2"])
    );
}

#[test]
fn test_reverse_full_scan() {
    let engine = setup_numbered_engine();

    assert_eq!(
        collect_keys(&engine, RangeSpec::all(), true),
        keys(&["5", "4", "3", "2", "1"])
    );
}

// =============================================================================
// Buffering Tests
// =============================================================================

#[test]
fn test_has_next_is_idempotent() {
    let engine = setup_numbered_engine();
    let mut iter =
        RangeIterator::new(&engine, interval("1", "2", true, true), Projection::Key, false).unwrap();

    assert!(iter.has_next().unwrap());
    assert!(iter.has_next().unwrap());
    assert_eq!(iter.get_next().unwrap(), Some(Entry::Key(b"1".to_vec())));
    assert!(iter.has_next().unwrap());
    assert_eq!(iter.get_next().unwrap(), Some(Entry::Key(b"2".to_vec())));
}

#[test]
fn test_exhaustion_is_terminal() {
    let engine = setup_numbered_engine();
    let mut iter =
        RangeIterator::new(&engine, interval("5", "9", true, true), Projection::Key, false).unwrap();

    assert_eq!(iter.get_next().unwrap(), Some(Entry::Key(b"5".to_vec())));
    assert!(!iter.has_next().unwrap());
    assert_eq!(iter.get_next().unwrap(), None);
    assert!(!iter.has_next().unwrap());
    assert_eq!(iter.get_next().unwrap(), None);
}

#[test]
fn test_empty_engine() {
    let engine = MemoryEngine::new();
    let mut iter = RangeIterator::new(&engine, RangeSpec::all(), Projection::KeyValue, false).unwrap();

    assert!(!iter.has_next().unwrap());
    assert!(iter.next().is_none());
}

#[test]
fn test_iterator_snapshot_ignores_later_writes() {
    let engine = setup_numbered_engine();
    let iter = RangeIterator::new(&engine, RangeSpec::all(), Projection::Key, false).unwrap();

    engine
        .write_batch(
            vec![
                BatchOp::Put { key: b"6".to_vec(), value: b"v6".to_vec() },
                BatchOp::Delete { key: b"1".to_vec() },
            ],
            false,
        )
        .unwrap();

    let seen: Vec<_> = iter.map(|e| e.unwrap()).collect();
    assert_eq!(seen.len(), 5);
    assert_eq!(seen[0], Entry::Key(b"1".to_vec()));
}

// =============================================================================
// Projection Tests
// =============================================================================

#[test]
fn test_key_value_projection() {
    let engine = setup_numbered_engine();
    let iter =
        RangeIterator::new(&engine, interval("2", "3", true, true), Projection::KeyValue, false)
            .unwrap();

    let entries: Vec<Entry> = iter.map(|e| e.unwrap()).collect();

    assert_eq!(
        entries,
        vec![
            Entry::Pair(b"2".to_vec(), b"v2".to_vec()),
            Entry::Pair(b"3".to_vec(), b"v3".to_vec()),
        ]
    );
}

#[test]
fn test_value_projection() {
    let engine = setup_numbered_engine();
    let iter = RangeIterator::new(&engine, interval("4", "5", true, true), Projection::Value, true)
        .unwrap();

    let values: Vec<Vec<u8>> = iter.map(|e| e.unwrap().value().unwrap().to_vec()).collect();

    assert_eq!(values, keys(&["v5", "v4"]));
}

#[test]
fn test_accessors() {
    let engine = setup_numbered_engine();
    let spec = RangeSpec::Prefix(b"1".to_vec());
    let iter = RangeIterator::new(&engine, spec.clone(), Projection::Value, true).unwrap();

    assert_eq!(iter.spec(), &spec);
    assert_eq!(iter.projection(), Projection::Value);
    assert!(iter.is_reverse());
}

// =============================================================================
// Error Propagation Tests
// =============================================================================

/// Engine whose cursor fails after the first entry
struct BrokenCursorEngine;

impl OrderedMap for BrokenCursorEngine {
    fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn put(&self, _key: &[u8], _value: &[u8]) -> Result<()> {
        Ok(())
    }

    fn delete(&self, _key: &[u8]) -> Result<()> {
        Ok(())
    }

    fn write_batch(&self, _ops: Vec<BatchOp>, _sync: bool) -> Result<()> {
        Ok(())
    }

    fn range<'a>(
        &'a self,
        _lower: Bound<&[u8]>,
        _upper: Bound<&[u8]>,
        _reverse: bool,
    ) -> Result<Cursor<'a>> {
        let items: Vec<Result<(Vec<u8>, Vec<u8>)>> = vec![
            Ok((b"a".to_vec(), b"1".to_vec())),
            Err(VbaError::Storage("cursor failed".to_string())),
            Ok((b"b".to_vec(), b"2".to_vec())),
        ];
        Ok(Box::new(items.into_iter()))
    }
}

#[test]
fn test_cursor_error_finishes_iterator() {
    let engine = BrokenCursorEngine;
    let mut iter = RangeIterator::new(&engine, RangeSpec::all(), Projection::Key, false).unwrap();

    assert_eq!(iter.get_next().unwrap(), Some(Entry::Key(b"a".to_vec())));
    assert!(matches!(iter.get_next(), Err(VbaError::Storage(_))));
    assert_eq!(iter.get_next().unwrap(), None);
}
