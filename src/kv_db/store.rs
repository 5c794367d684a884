//! KvStore implementation

use std::ops::Bound;
use std::path::Path;

use parking_lot::Mutex;

use super::{IterOptions, KvIterator, WriteBatch};
use crate::byte_array::VariableByteStore;
use crate::config::Config;
use crate::encoding::{decode_record_id, encode_record_id};
use crate::engine::{BatchOp, LsmEngine, OrderedMap};
use crate::error::{Result, VbaError};
use crate::kv_iter::RangeIterator;

/// Key-value store over an ordered map engine
///
/// ## Concurrency
/// Point reads inherit the engine's guarantees. In vba mode every write that
/// appends blobs holds `batch_lock` across "append blobs, then commit
/// pointers", so concurrent batches cannot interleave their record ids and
/// `truncate_blobs` never races a pointer that is about to land.
pub struct KvStore<E: OrderedMap = LsmEngine> {
    engine: E,
    /// Present in vba mode only
    blobs: Option<VariableByteStore>,
    batch_lock: Mutex<()>,
}

impl KvStore<LsmEngine> {
    /// Open (or create) a store rooted at `config.data_dir`
    ///
    /// In vba mode the byte store lives next to the engine files as
    /// `values.idx` / `values.dat`.
    pub fn open(config: Config) -> Result<Self> {
        let blobs = if config.vba_engine {
            Some(VariableByteStore::open_dir(&config.data_dir, config.clear)?)
        } else {
            None
        };
        let engine = LsmEngine::open(config)?;
        Ok(Self::with_engine(engine, blobs))
    }

    /// Open with default settings
    pub fn open_path(path: &Path, vba_engine: bool) -> Result<Self> {
        Self::open(
            Config::builder()
                .data_dir(path)
                .vba_engine(vba_engine)
                .build(),
        )
    }

    /// Flush the engine and sync the byte store
    pub fn close(self) -> Result<()> {
        if let Some(blobs) = &self.blobs {
            blobs.sync()?;
        }
        self.engine.close()
    }
}

impl<E: OrderedMap> KvStore<E> {
    /// Assemble a store from an existing engine; `blobs` enables vba mode
    pub fn with_engine(engine: E, blobs: Option<VariableByteStore>) -> Self {
        Self {
            engine,
            blobs,
            batch_lock: Mutex::new(()),
        }
    }

    /// Look up a key, resolving the record pointer in vba mode
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let stored = match self.engine.get(key)? {
            Some(stored) => stored,
            None => return Ok(None),
        };
        match &self.blobs {
            Some(blobs) => blobs.select_id(decode_record_id(&stored)?).map(Some),
            None => Ok(Some(stored)),
        }
    }

    /// Store a value, overwriting any previous one
    ///
    /// In vba mode every call appends a new blob; the one an overwritten
    /// pointer referenced stays in the byte store unreferenced.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        match &self.blobs {
            Some(blobs) => {
                let _batch_guard = self.batch_lock.lock();
                let id = blobs.insert_bytes(value)?;
                self.engine.put(key, &encode_record_id(id))
            }
            None => self.engine.put(key, value),
        }
    }

    /// Delete a key; the blob it pointed at (vba mode) is not reclaimed
    pub fn remove(&self, key: &[u8]) -> Result<()> {
        self.engine.delete(key)
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.engine.get(key)?.is_some())
    }

    /// Apply a sequence of sets and removes atomically
    ///
    /// In vba mode all set values are appended in one byte store batch before
    /// the engine commit. If the commit fails those blobs stay behind as
    /// orphans; the engine itself is left untouched. `transaction` requests a
    /// synchronous, durable commit (and syncs the byte store first).
    pub fn batch_write(&self, ops: Vec<BatchOp>, transaction: bool) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        let _batch_guard = self.batch_lock.lock();

        let blobs = match &self.blobs {
            Some(blobs) => blobs,
            None => return self.engine.write_batch(ops, transaction),
        };

        let values: Vec<&[u8]> = ops
            .iter()
            .filter_map(|op| match op {
                BatchOp::Put { value, .. } => Some(value.as_slice()),
                BatchOp::Delete { .. } => None,
            })
            .collect();
        let first_id = blobs.batch_insert_bytes(&values)?;
        let appended = values.len();
        if transaction {
            blobs.sync()?;
        }

        let mut next_id = first_id;
        let pointer_ops = ops
            .into_iter()
            .map(|op| match op {
                BatchOp::Put { key, .. } => {
                    let value = encode_record_id(next_id).to_vec();
                    next_id += 1;
                    BatchOp::Put { key, value }
                }
                delete @ BatchOp::Delete { .. } => delete,
            })
            .collect();

        if let Err(e) = self.engine.write_batch(pointer_ops, transaction) {
            tracing::warn!(
                "write batch rejected; {} blob records from id {} are orphaned: {}",
                appended,
                first_id,
                e
            );
            return Err(e);
        }
        Ok(())
    }

    /// Drop the newest `k` byte store records (vba mode only)
    ///
    /// Refused with `RecordInUse` while any key still points at one of them,
    /// so truncation can only reclaim orphans. Returns the first removed id.
    pub fn truncate_blobs(&self, k: u64) -> Result<u64> {
        let blobs = self.blobs.as_ref().ok_or_else(|| {
            VbaError::InvalidOptions("byte store truncation needs vba mode".to_string())
        })?;
        let _batch_guard = self.batch_lock.lock();

        let count = blobs.len();
        if k == 0 || k > count {
            return Err(VbaError::InvalidTruncate { k, count });
        }
        let first_removed = count - k;

        for item in self.engine.range(Bound::Unbounded, Bound::Unbounded, false)? {
            let (key, pointer) = item?;
            let id = decode_record_id(&pointer)?;
            if id >= first_removed {
                return Err(VbaError::RecordInUse {
                    id,
                    key: String::from_utf8_lossy(&key).into_owned(),
                });
            }
        }

        blobs.remove_last_k(k)?;
        blobs.sync()?;
        tracing::info!(k, first_removed, "truncated unreferenced blob records");
        Ok(first_removed)
    }

    /// Commit a [`WriteBatch`]
    pub fn write(&self, batch: WriteBatch, transaction: bool) -> Result<()> {
        self.batch_write(batch.into_ops(), transaction)
    }

    /// Start a scan described by `options`
    pub fn iterator(&self, options: IterOptions) -> Result<KvIterator<'_>> {
        let (spec, projection, reverse) = options.into_parts()?;
        let inner = RangeIterator::new(&self.engine, spec, projection, reverse)?;
        Ok(KvIterator::new(inner, self.blobs.as_ref()))
    }

    /// Push buffered engine state to disk and sync the byte store
    pub fn flush(&self) -> Result<()> {
        self.engine.flush()?;
        if let Some(blobs) = &self.blobs {
            blobs.sync()?;
        }
        Ok(())
    }

    /// Whether values are redirected through the byte store
    pub fn is_vba(&self) -> bool {
        self.blobs.is_some()
    }

    pub fn blob_store(&self) -> Option<&VariableByteStore> {
        self.blobs.as_ref()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}
