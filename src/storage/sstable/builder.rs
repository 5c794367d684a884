//! SSTable Builder
//!
//! Streams sorted entries into a new SSTable file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, VbaError};

use super::{SSTable, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Builder for creating new SSTables from sorted entries
pub struct SSTableBuilder {
    path: PathBuf,
    writer: BufWriter<File>,
    entry_count: u64,
    /// Offset the next entry is written at
    offset: u64,
    /// key → entry offset, in insertion (sorted) order
    index: Vec<(Vec<u8>, u64)>,
    crc: crc32fast::Hasher,
}

impl SSTableBuilder {
    /// Create the file and write a header with a placeholder count
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            entry_count: 0,
            offset: HEADER_SIZE,
            index: Vec::new(),
            crc: crc32fast::Hasher::new(),
        })
    }

    /// Add a live entry; keys must arrive strictly ascending
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.push(key, Some(value))
    }

    /// Add a tombstone; keys must arrive strictly ascending
    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.push(key, None)
    }

    fn push(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if let Some((last, _)) = self.index.last() {
            if key <= last.as_slice() {
                return Err(VbaError::Storage(format!(
                    "SSTable keys out of order: {:?} after {:?}",
                    key, last
                )));
            }
        }

        let val_len = match value {
            Some(v) => value_len(v.len())?,
            None => TOMBSTONE_MARKER,
        };
        let key_len = u32::try_from(key.len())
            .map_err(|_| VbaError::Storage(format!("key of {} bytes too large", key.len())))?;

        let mut entry = Vec::with_capacity(8 + key.len() + value.map_or(0, |v| v.len()));
        entry.extend_from_slice(&key_len.to_le_bytes());
        entry.extend_from_slice(&val_len.to_le_bytes());
        entry.extend_from_slice(key);
        if let Some(v) = value {
            entry.extend_from_slice(v);
        }

        self.writer.write_all(&entry)?;
        self.crc.update(&entry);
        self.index.push((key.to_vec(), self.offset));
        self.offset += entry.len() as u64;
        self.entry_count += 1;
        Ok(())
    }

    /// Write index block and footer, patch the header count and fsync
    pub fn finish(mut self) -> Result<SSTable> {
        let index_offset = self.offset;
        for (key, offset) in &self.index {
            self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(key)?;
        }

        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&self.crc.clone().finalize().to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;
        self.writer.flush()?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| VbaError::Storage(format!("Failed to flush SSTable: {}", e)))?;
        file.seek(SeekFrom::Start(MAGIC.len() as u64 + 2))?;
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;
        let file_size = file.metadata()?.len();

        let min_key = self.index.first().map(|(k, _)| k.clone()).unwrap_or_default();
        let max_key = self.index.last().map(|(k, _)| k.clone()).unwrap_or_default();

        Ok(SSTable {
            path: self.path,
            entry_count: self.entry_count,
            min_key,
            max_key,
            file_size,
        })
    }
}

/// Stored length of a live value; `TOMBSTONE_MARKER` itself is reserved
fn value_len(len: usize) -> Result<u32> {
    match u32::try_from(len) {
        Ok(n) if n != TOMBSTONE_MARKER => Ok(n),
        _ => Err(VbaError::Storage(format!(
            "value of {} bytes too large for SSTable",
            len
        ))),
    }
}
