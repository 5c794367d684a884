//! LSM ordered map engine
//!
//! WAL → MemTable → SSTables, with crash recovery on open.

use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{is_empty_range, snapshot_cursor, BatchOp, Cursor, OrderedMap};
use crate::config::Config;
use crate::error::Result;
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// Durable ordered map engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader
///
/// - **Writes** (put/delete/write_batch/flush): serialized by `write_lock`,
///   acquired in the order write_lock → WAL → memtable → storage
/// - **Point reads**: no write_lock; MemTable has its own RwLock and
///   StorageManager flushes a table in before the memtable is cleared
/// - **Range cursors**: snapshot taken under `write_lock` so a concurrent
///   flush cannot move entries between layers mid-read
pub struct LsmEngine {
    config: Config,

    storage_dir: PathBuf,

    wal: Mutex<WalWriter>,

    memtable: MemTable,

    storage: StorageManager,

    write_lock: Mutex<()>,
}

impl LsmEngine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create the data directory (wiping engine files if `clear` is set)
    /// 2. Load existing SSTables
    /// 3. Replay the WAL and flush what it held into an SSTable
    /// 4. Start a fresh WAL
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        fs::create_dir_all(&storage_dir)?;

        let storage = StorageManager::open(&storage_dir)?;
        if config.clear {
            storage.clear()?;
            if wal_path.exists() {
                fs::remove_file(&wal_path)?;
            }
            tracing::debug!(dir = %config.data_dir.display(), "cleared engine files");
        }

        let memtable = MemTable::new();

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;
            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    "WAL recovery: {} entries recovered, {} corrupted, last_lsn={}",
                    recovery.entries_recovered,
                    recovery.entries_corrupted,
                    recovery.last_lsn
                );
            }
            for entry in entries {
                memtable.apply(entry.operation);
            }
            // Make replayed data durable before the log is dropped
            if !memtable.is_empty() {
                tracing::info!("Flushing {} recovered entries to SSTable", memtable.entry_count());
                storage.flush(&memtable)?;
                memtable.clear();
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        wal.truncate()?;

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
        })
    }

    /// Open with default settings rooted at `path`
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Log then apply one operation; caller holds `write_lock`
    ///
    /// The operation is committed once its WAL record lands. A flush failure
    /// after that point is logged and retried on the next write.
    fn commit(&self, operation: Operation, sync: bool) -> Result<()> {
        {
            let mut wal = self.wal.lock();
            if sync {
                wal.append_sync(operation.clone())?;
            } else {
                wal.append(operation.clone())?;
            }
        }

        let new_size = self.memtable.apply(operation);
        if new_size >= self.config.memtable_size_limit {
            if let Err(e) = self.flush_internal() {
                tracing::warn!(
                    memtable_size = new_size,
                    "memtable flush failed, data stays in WAL and memtable: {}",
                    e
                );
            }
        }
        Ok(())
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();
        self.wal.lock().truncate()?;
        Ok(())
    }

    /// Flush pending data and sync the WAL
    pub fn close(self) -> Result<()> {
        OrderedMap::flush(&self)?;
        self.wal.lock().sync()?;
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl OrderedMap for LsmEngine {
    /// MemTable first, then SSTables newest → oldest
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.memtable.get(key) {
            Some(MemTableEntry::Value(value)) => Ok(Some(value)),
            Some(MemTableEntry::Tombstone) => Ok(None),
            None => self.storage.get(key),
        }
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.commit(
            Operation::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            },
            false,
        )
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.commit(Operation::Delete { key: key.to_vec() }, false)
    }

    /// One WAL record for the whole batch; memtable updated only after it lands
    fn write_batch(&self, ops: Vec<BatchOp>, sync: bool) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        let count = ops.len();
        let _write_guard = self.write_lock.lock();
        self.commit(
            Operation::Batch {
                ops: ops.into_iter().map(Operation::from).collect(),
            },
            sync,
        )?;
        tracing::trace!(count, sync, "committed write batch");
        Ok(())
    }

    fn range<'a>(
        &'a self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
    ) -> Result<Cursor<'a>> {
        if is_empty_range(lower, upper) {
            return Ok(snapshot_cursor(Vec::new(), reverse));
        }

        let _write_guard = self.write_lock.lock();
        let mut merged = self.storage.range(lower, upper)?;
        for (key, entry) in self.memtable.range(lower, upper) {
            match entry {
                MemTableEntry::Value(value) => merged.insert(key, Some(value)),
                MemTableEntry::Tombstone => merged.insert(key, None),
            };
        }

        let live = merged
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect();
        Ok(snapshot_cursor(live, reverse))
    }

    fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }
}
