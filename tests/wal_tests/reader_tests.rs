//! Tests for WAL Reader
//!
//! These tests verify:
//! - Reading entries in order
//! - Torn tails end the log quietly
//! - Checksum failures surface as errors

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

use tempfile::TempDir;
use vbakv::config::WalSyncStrategy;
use vbakv::wal::{Operation, WalReader, WalWriter, HEADER_SIZE};
use vbakv::VbaError;

// =============================================================================
// Helper Functions
// =============================================================================

/// WAL holding `count` puts; returns the file length after each entry
fn setup_wal_with_entries(count: usize) -> (TempDir, PathBuf, Vec<u64>) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    let mut ends = Vec::new();
    for i in 0..count {
        writer
            .append(Operation::Put {
                key: format!("key{}", i).into_bytes(),
                value: format!("value{}", i).into_bytes(),
            })
            .unwrap();
        ends.push(writer.size());
    }
    (temp_dir, wal_path, ends)
}

// =============================================================================
// Reading Tests
// =============================================================================

#[test]
fn test_read_empty_wal() {
    let (_temp, wal_path, _) = setup_wal_with_entries(0);
    let mut reader = WalReader::open(&wal_path).unwrap();

    assert!(reader.next_entry().unwrap().is_none());
    assert!(!reader.has_torn_tail());
}

#[test]
fn test_read_entries_in_order() {
    let (_temp, wal_path, ends) = setup_wal_with_entries(3);
    let mut reader = WalReader::open(&wal_path).unwrap();

    for lsn in 1..=3 {
        let entry = reader.next_entry().unwrap().unwrap();
        assert_eq!(entry.lsn, lsn);
        assert_eq!(reader.position(), ends[lsn as usize - 1]);
    }
    assert!(reader.next_entry().unwrap().is_none());
}

// =============================================================================
// Torn Tail Tests
// =============================================================================

#[test]
fn test_partial_header_is_torn_tail() {
    let (_temp, wal_path, ends) = setup_wal_with_entries(2);
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[1u8; HEADER_SIZE - 4]).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    let entries: Vec<_> = std::iter::from_fn(|| reader.next_entry().unwrap()).collect();

    assert_eq!(entries.len(), 2);
    assert!(reader.has_torn_tail());
    assert_eq!(reader.position(), ends[1]);
}

#[test]
fn test_partial_data_is_torn_tail() {
    let (_temp, wal_path, ends) = setup_wal_with_entries(2);
    let file = OpenOptions::new().write(true).open(&wal_path).unwrap();
    file.set_len(ends[1] - 3).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();

    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().unwrap().is_none());
    assert!(reader.has_torn_tail());
    assert_eq!(reader.position(), ends[0]);
}

#[test]
fn test_garbled_length_is_torn_tail() {
    let (_temp, wal_path, ends) = setup_wal_with_entries(1);
    let mut file = OpenOptions::new().write(true).open(&wal_path).unwrap();
    file.seek(SeekFrom::Start(12)).unwrap();
    file.write_all(&u32::MAX.to_le_bytes()).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();

    assert!(reader.next_entry().unwrap().is_none());
    assert!(reader.has_torn_tail());
    assert!(ends[0] > 0);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_crc_mismatch_is_error() {
    let (_temp, wal_path, ends) = setup_wal_with_entries(2);
    // Flip the last data byte of the second entry
    let mut file = OpenOptions::new().write(true).open(&wal_path).unwrap();
    file.seek(SeekFrom::Start(ends[1] - 1)).unwrap();
    file.write_all(&[0xFF]).unwrap();

    let mut iter = WalReader::open(&wal_path).unwrap().entries();

    assert!(iter.next().unwrap().is_ok());
    assert!(matches!(iter.next(), Some(Err(VbaError::WalCorruption(_)))));
    assert!(iter.next().is_none());
}
