//! Engine Module
//!
//! Ordered map engines the key-value layer is built on.
//!
//! ## Responsibilities
//! - Define the [`OrderedMap`] seam: point reads/writes, atomic write
//!   batches and directional range cursors
//! - [`LsmEngine`]: durable WAL + MemTable + SSTable engine
//! - [`MemoryEngine`]: BTreeMap engine for tests and scratch use

mod lsm;
mod memory;

use std::ops::Bound;
use std::sync::Arc;

use crate::error::Result;
use crate::wal::Operation;

pub use lsm::LsmEngine;
pub use memory::MemoryEngine;

/// Directional cursor over `(key, value)` pairs
pub type Cursor<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + Send + 'a>;

/// One mutation inside an atomic write batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOp {
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOp::Put { key, .. } | BatchOp::Delete { key } => key,
        }
    }
}

impl From<BatchOp> for Operation {
    fn from(op: BatchOp) -> Self {
        match op {
            BatchOp::Put { key, value } => Operation::Put { key, value },
            BatchOp::Delete { key } => Operation::Delete { key },
        }
    }
}

/// A sorted key-value engine
///
/// Implementations must apply `write_batch` all-or-nothing and must yield
/// range cursors in ascending key order, or descending when `reverse` is set.
pub trait OrderedMap: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Apply every op or none; `sync` requests a durable commit
    fn write_batch(&self, ops: Vec<BatchOp>, sync: bool) -> Result<()>;

    /// Cursor over keys within the bounds
    fn range<'a>(
        &'a self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
    ) -> Result<Cursor<'a>>;

    /// Push buffered state to durable storage
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

impl<T: OrderedMap + ?Sized> OrderedMap for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        (**self).delete(key)
    }

    fn write_batch(&self, ops: Vec<BatchOp>, sync: bool) -> Result<()> {
        (**self).write_batch(ops, sync)
    }

    fn range<'a>(
        &'a self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
    ) -> Result<Cursor<'a>> {
        (**self).range(lower, upper, reverse)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}

/// True when no key can satisfy both bounds
///
/// `BTreeMap::range` panics on inverted bounds, so callers check first.
pub fn is_empty_range(lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> bool {
    match (lower, upper) {
        (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
        (Bound::Included(lo), Bound::Excluded(hi))
        | (Bound::Excluded(lo), Bound::Included(hi))
        | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
        _ => false,
    }
}

/// Cursor over an owned, ascending snapshot
pub(crate) fn snapshot_cursor(entries: Vec<(Vec<u8>, Vec<u8>)>, reverse: bool) -> Cursor<'static> {
    if reverse {
        Box::new(entries.into_iter().rev().map(Ok))
    } else {
        Box::new(entries.into_iter().map(Ok))
    }
}
