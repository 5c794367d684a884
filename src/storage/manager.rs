//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Merge SSTables into range snapshots
//! - Create new SSTables from MemTable flushes

use std::collections::BTreeMap;
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::engine::is_empty_range;
use crate::error::{Result, VbaError};
use crate::memtable::{MemTable, MemTableEntry};

use super::{SSTable, SSTableBuilder, SSTableReader};

/// Merged view of a key range; `None` marks a tombstone
pub type RangeSnapshot = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: RwLock; lookups take the write side because readers seek
/// - `next_sstable_id`: atomic counter
pub struct StorageManager {
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,

    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.is_file() {
                if let Some(id) = Self::parse_sstable_id(&file_path) {
                    ids.push(id);
                }
            }
        }
        ids.sort_unstable_by(|a, b| b.cmp(a));

        let sstables = ids
            .iter()
            .map(|&id| SSTableReader::open(&Self::sstable_path_with_dir(path, id)))
            .collect::<Result<Vec<_>>>()?;

        let next_id = ids.first().map(|&id| id + 1).unwrap_or(1);
        tracing::debug!(dir = %path.display(), tables = sstables.len(), "opened SSTable storage");

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Get a value by key (searches all SSTables newest → oldest)
    ///
    /// `Ok(None)` covers both a missing key and a tombstone.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut sstables = self.sstables.write();
        for reader in sstables.iter_mut() {
            if !reader.might_contain(key) {
                continue;
            }
            match reader.get(key) {
                Ok(value) => return Ok(value),
                Err(VbaError::KeyNotFound) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Merge every SSTable's entries within the bounds; newer tables win
    pub fn range(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> Result<RangeSnapshot> {
        let mut merged = RangeSnapshot::new();
        if is_empty_range(lower, upper) {
            return Ok(merged);
        }

        let mut sstables = self.sstables.write();
        for reader in sstables.iter_mut().rev() {
            for (key, value) in reader.range(lower, upper)? {
                merged.insert(key, value);
            }
        }
        Ok(merged)
    }

    /// Flush a MemTable to a new SSTable
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(VbaError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        let built = Self::write_sstable(&path, memtable)
            .and_then(|metadata| Ok((metadata, SSTableReader::open(&path)?)));
        let (metadata, reader) = match built {
            Ok(built) => built,
            Err(e) => {
                // Drop any half-written table
                if path.exists() {
                    if let Err(rm) = fs::remove_file(&path) {
                        tracing::warn!("failed to remove partial SSTable {}: {}", path.display(), rm);
                    }
                }
                return Err(e);
            }
        };

        self.sstables.write().insert(0, reader);
        tracing::debug!(id, entries = metadata.entry_count, "flushed memtable to SSTable");
        Ok(metadata)
    }

    fn write_sstable(path: &Path, memtable: &MemTable) -> Result<SSTable> {
        let mut builder = SSTableBuilder::new(path)?;
        for (key, entry) in memtable.iter() {
            match entry {
                MemTableEntry::Value(v) => builder.add(&key, &v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(&key)?,
            }
        }
        builder.finish()
    }

    /// Delete every SSTable file
    pub fn clear(&self) -> Result<()> {
        let mut sstables = self.sstables.write();
        for reader in sstables.drain(..) {
            fs::remove_file(reader.path())?;
        }
        Ok(())
    }

    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        name.strip_prefix("sstable_")?.parse().ok()
    }
}
