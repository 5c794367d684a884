//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use super::MemTableEntry;
use crate::engine::is_empty_range;
use crate::wal::Operation;

/// In-memory table for recent writes
///
/// Size is approximate: key bytes plus live value bytes.
pub struct MemTable {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    data: BTreeMap<Vec<u8>, MemTableEntry>,
    size: usize,
}

impl Inner {
    fn insert(&mut self, key: Vec<u8>, entry: MemTableEntry) {
        let added = entry.value_len();
        match self.data.get(&key) {
            Some(old) => self.size = self.size - old.value_len() + added,
            None => self.size += key.len() + added,
        }
        self.data.insert(key, entry);
    }

    fn apply(&mut self, operation: Operation) {
        match operation {
            Operation::Put { key, value } => self.insert(key, MemTableEntry::Value(value)),
            Operation::Delete { key } => self.insert(key, MemTableEntry::Tombstone),
            Operation::Batch { ops } => {
                for op in ops {
                    self.apply(op);
                }
            }
        }
    }
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Get the entry for a key, tombstones included
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.inner.read().data.get(key).cloned()
    }

    /// Put a key-value pair, returning the new size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let mut inner = self.inner.write();
        inner.insert(key, MemTableEntry::Value(value));
        inner.size
    }

    /// Record a tombstone, returning the new size
    pub fn delete(&self, key: Vec<u8>) -> usize {
        let mut inner = self.inner.write();
        inner.insert(key, MemTableEntry::Tombstone);
        inner.size
    }

    /// Apply a logged operation under one write guard, returning the new size
    ///
    /// Readers see either none or all of a `Batch`.
    pub fn apply(&self, operation: Operation) -> usize {
        let mut inner = self.inner.write();
        inner.apply(operation);
        inner.size
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.inner.read().size
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.inner.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Snapshot of all entries in sorted key order
    pub fn iter(&self) -> std::vec::IntoIter<(Vec<u8>, MemTableEntry)> {
        self.range(Bound::Unbounded, Bound::Unbounded)
    }

    /// Snapshot of entries within the bounds, ascending
    pub fn range(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
    ) -> std::vec::IntoIter<(Vec<u8>, MemTableEntry)> {
        if is_empty_range(lower, upper) {
            return Vec::new().into_iter();
        }
        let inner = self.inner.read();
        let entries: Vec<_> = inner
            .data
            .range::<[u8], _>((lower, upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.into_iter()
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.data.clear();
        inner.size = 0;
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
