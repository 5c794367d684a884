//! Variable byte store implementation
//!
//! Two files behind one mutex: an index of fixed-size records and a data
//! file of raw concatenated payloads.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::encoding::{IndexRecord, INDEX_RECORD_SIZE};
use crate::error::{Result, VbaError};

/// Append-only store of byte payloads
///
/// ## Concurrency
/// Every public operation, reads included, holds `files` for its whole
/// duration. Operations are linearizable; reads queue behind writes.
/// Callers amortize the cost with [`batch_insert_bytes`](Self::batch_insert_bytes).
pub struct VariableByteStore {
    index_path: PathBuf,
    data_path: PathBuf,
    files: Mutex<StoreFiles>,
}

/// State guarded by the store mutex
struct StoreFiles {
    index: File,
    data: File,
    /// Number of records (index file length / 16)
    item_count: u64,
    /// Data file length
    total_bytes: u64,
}

impl VariableByteStore {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    pub const INDEX_FILENAME: &'static str = "values.idx";
    pub const DATA_FILENAME: &'static str = "values.dat";

    /// Open or create a store from explicit file paths
    ///
    /// With `clear` set, both files are truncated to empty. Otherwise missing
    /// files are created and the counters are derived from file sizes.
    pub fn open(index_path: &Path, data_path: &Path, clear: bool) -> Result<Self> {
        let index = Self::open_file(index_path, clear)?;
        let data = Self::open_file(data_path, clear)?;

        let index_len = index.metadata()?.len();
        if index_len % INDEX_RECORD_SIZE != 0 {
            return Err(VbaError::CorruptIndex(format!(
                "{} is {} bytes, not a multiple of {}",
                index_path.display(),
                index_len,
                INDEX_RECORD_SIZE
            )));
        }

        let mut files = StoreFiles {
            index,
            data,
            item_count: index_len / INDEX_RECORD_SIZE,
            total_bytes: 0,
        };
        files.total_bytes = files.data.metadata()?.len();

        // The newest record is the one a torn write could have broken
        if files.item_count > 0 {
            let last = files.read_record(files.item_count - 1)?;
            let last_end = last.end()?;
            if last_end > files.total_bytes {
                return Err(VbaError::CorruptIndex(format!(
                    "record {} ends at byte {} but {} holds only {} bytes",
                    files.item_count - 1,
                    last_end,
                    data_path.display(),
                    files.total_bytes
                )));
            }
        }

        tracing::debug!(
            index = %index_path.display(),
            items = files.item_count,
            bytes = files.total_bytes,
            clear,
            "opened variable byte store"
        );

        Ok(Self {
            index_path: index_path.to_path_buf(),
            data_path: data_path.to_path_buf(),
            files: Mutex::new(files),
        })
    }

    /// Open a store using the standard file names inside `dir`
    pub fn open_dir(dir: &Path, clear: bool) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Self::open(
            &dir.join(Self::INDEX_FILENAME),
            &dir.join(Self::DATA_FILENAME),
            clear,
        )
    }

    fn open_file(path: &Path, clear: bool) -> Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(clear)
            .open(path)?;
        Ok(file)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Append one payload, returning its record id
    pub fn insert_bytes(&self, payload: &[u8]) -> Result<u64> {
        let mut files = self.files.lock();
        let id = files.item_count;
        let record = IndexRecord::new(files.total_bytes, payload.len() as u64);

        let written = files.append(payload, &record.encode());
        if let Err(e) = written {
            files.rollback();
            return Err(e);
        }

        files.item_count += 1;
        files.total_bytes += payload.len() as u64;
        Ok(id)
    }

    /// Append several payloads in one pass, returning the first new id
    ///
    /// Ids are contiguous and follow input order. An empty batch is a no-op
    /// that returns the current item count.
    pub fn batch_insert_bytes<P: AsRef<[u8]>>(&self, payloads: &[P]) -> Result<u64> {
        let mut files = self.files.lock();
        let first_id = files.item_count;
        if payloads.is_empty() {
            return Ok(first_id);
        }

        // Offsets are fixed up front from the running byte count
        let mut index_block = Vec::with_capacity(payloads.len() * INDEX_RECORD_SIZE as usize);
        let mut offset = files.total_bytes;
        for payload in payloads {
            let size = payload.as_ref().len() as u64;
            index_block.extend_from_slice(&IndexRecord::new(offset, size).encode());
            offset += size;
        }
        let new_total = offset;

        let written = files.append_batch(payloads, &index_block);
        if let Err(e) = written {
            files.rollback();
            return Err(e);
        }

        files.item_count += payloads.len() as u64;
        files.total_bytes = new_total;

        tracing::trace!(first_id, count = payloads.len(), "batch appended");
        Ok(first_id)
    }

    /// Drop the newest `k` records, returning the id of the first one removed
    ///
    /// The removed bytes are unrecoverable. `k` must be in `1..=item_count`.
    pub fn remove_last_k(&self, k: u64) -> Result<u64> {
        let mut files = self.files.lock();
        if k == 0 || k > files.item_count {
            return Err(VbaError::InvalidTruncate {
                k,
                count: files.item_count,
            });
        }

        let target_id = files.item_count - k;
        let new_total = files.read_record(target_id)?.offset;

        // Index first, so no surviving record points past the data file
        files.index.set_len(target_id * INDEX_RECORD_SIZE)?;
        files.item_count = target_id;
        files.data.set_len(new_total)?;
        files.total_bytes = new_total;

        tracing::debug!(removed = k, remaining = target_id, "truncated byte store tail");
        Ok(target_id)
    }

    /// Flush both files to stable storage
    pub fn sync(&self) -> Result<()> {
        let files = self.files.lock();
        files.data.sync_data()?;
        files.index.sync_data()?;
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read the payload stored under `record_id`
    pub fn select_id(&self, record_id: u64) -> Result<Vec<u8>> {
        let mut files = self.files.lock();
        if record_id >= files.item_count {
            return Err(VbaError::OutOfRange {
                id: record_id,
                count: files.item_count,
            });
        }

        let record = files.read_record(record_id)?;
        files.read_data(record.offset, record.size)
    }

    /// Read payloads for ids in `[lower, upper)`, in id order
    ///
    /// `lower == upper` yields an empty vector. `lower > upper` or
    /// `upper > item_count` is rejected.
    pub fn select_id_range(&self, lower: u64, upper: u64) -> Result<Vec<Vec<u8>>> {
        let mut files = self.files.lock();
        if lower > upper || upper > files.item_count {
            return Err(VbaError::InvalidRange {
                lower,
                upper,
                count: files.item_count,
            });
        }
        if lower == upper {
            return Ok(Vec::new());
        }

        // One index read for the whole run
        let count = upper - lower;
        let mut index_block = vec![0u8; (count * INDEX_RECORD_SIZE) as usize];
        files.index.seek(SeekFrom::Start(lower * INDEX_RECORD_SIZE))?;
        files.index.read_exact(&mut index_block)?;
        let records = IndexRecord::decode_all(&index_block)?;

        // Appends keep consecutive ids physically ordered, so one span covers them
        let span_start = records[0].offset;
        let span_end = records[records.len() - 1].end()?;
        if span_end < span_start {
            return Err(VbaError::CorruptIndex(format!(
                "records {}..{} are not laid out in order",
                lower, upper
            )));
        }
        let span = files.read_data(span_start, span_end - span_start)?;

        records
            .iter()
            .map(|r| {
                let bounds = r
                    .offset
                    .checked_sub(span_start)
                    .and_then(|from| Some((from, from.checked_add(r.size)?)));
                match bounds {
                    Some((from, to)) if to <= span.len() as u64 => {
                        Ok(span[from as usize..to as usize].to_vec())
                    }
                    _ => Err(VbaError::CorruptIndex(format!(
                        "record at offset {} falls outside span {}..{}",
                        r.offset, span_start, span_end
                    ))),
                }
            })
            .collect()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current index file size in bytes
    pub fn index_size(&self) -> u64 {
        self.files.lock().item_count * INDEX_RECORD_SIZE
    }

    /// Current data file size in bytes
    pub fn data_size(&self) -> u64 {
        self.files.lock().total_bytes
    }

    /// Number of stored records
    pub fn len(&self) -> u64 {
        self.files.lock().item_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }
}

impl StoreFiles {
    /// Data first, then the index record that makes it reachable
    fn append(&mut self, payload: &[u8], record: &[u8]) -> Result<()> {
        self.data.seek(SeekFrom::Start(self.total_bytes))?;
        self.data.write_all(payload)?;
        self.index
            .seek(SeekFrom::Start(self.item_count * INDEX_RECORD_SIZE))?;
        self.index.write_all(record)?;
        Ok(())
    }

    fn append_batch<P: AsRef<[u8]>>(&mut self, payloads: &[P], index_block: &[u8]) -> Result<()> {
        self.data.seek(SeekFrom::Start(self.total_bytes))?;
        {
            let mut writer = BufWriter::new(&mut self.data);
            for payload in payloads {
                writer.write_all(payload.as_ref())?;
            }
            writer.flush()?;
        }
        self.index
            .seek(SeekFrom::Start(self.item_count * INDEX_RECORD_SIZE))?;
        self.index.write_all(index_block)?;
        Ok(())
    }

    /// Cut both files back to the last committed sizes after a failed append
    fn rollback(&mut self) {
        let index_len = self.item_count * INDEX_RECORD_SIZE;
        if let Err(e) = self.index.set_len(index_len) {
            tracing::warn!("failed to roll back index file to {} bytes: {}", index_len, e);
        }
        if let Err(e) = self.data.set_len(self.total_bytes) {
            tracing::warn!("failed to roll back data file to {} bytes: {}", self.total_bytes, e);
        }
    }

    fn read_record(&mut self, id: u64) -> Result<IndexRecord> {
        let mut buf = [0u8; INDEX_RECORD_SIZE as usize];
        self.index.seek(SeekFrom::Start(id * INDEX_RECORD_SIZE))?;
        self.index.read_exact(&mut buf)?;
        IndexRecord::decode(&buf)
    }

    fn read_data(&mut self, offset: u64, size: u64) -> Result<Vec<u8>> {
        let end = IndexRecord::new(offset, size).end()?;
        if end > self.total_bytes {
            return Err(VbaError::CorruptIndex(format!(
                "payload {}..{} past end of data ({} bytes)",
                offset, end, self.total_bytes
            )));
        }
        let mut buf = vec![0u8; size as usize];
        self.data.seek(SeekFrom::Start(offset))?;
        self.data.read_exact(&mut buf)?;
        Ok(buf)
    }
}
