//! SSTable Reader
//!
//! Opens SSTable files and serves point and range reads via an in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use crate::engine::is_empty_range;
use crate::error::{Result, VbaError};

use super::{le_u32, le_u64, FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    path: PathBuf,
    file: BufReader<File>,
    /// key → file offset of its entry
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
}

impl SSTableReader {
    /// Open an SSTable, validating header, footer and data checksum
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(VbaError::Storage(format!(
                "{} is too small to be an SSTable ({} bytes)",
                path.display(),
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        if &header[0..4] != MAGIC {
            return Err(VbaError::Storage(format!(
                "Invalid SSTable magic in {}: {:?}",
                path.display(),
                &header[0..4]
            )));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(VbaError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }
        let entry_count = le_u64(&header, 6);

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;
        let index_offset = le_u64(&footer, 0);
        let data_crc = le_u32(&footer, 8);
        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(VbaError::Storage(format!(
                "index offset {} outside {}",
                index_offset,
                path.display()
            )));
        }

        // Data block checksum
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut data = vec![0u8; (index_offset - HEADER_SIZE) as usize];
        file.read_exact(&mut data)?;
        if crc32fast::hash(&data) != data_crc {
            return Err(VbaError::Storage(format!(
                "data checksum mismatch in {}",
                path.display()
            )));
        }
        drop(data);

        let mut block = vec![0u8; (file_size - FOOTER_SIZE - index_offset) as usize];
        file.read_exact(&mut block)?;
        let index = Self::parse_index(&block)?;
        if index.len() as u64 != entry_count {
            return Err(VbaError::Storage(format!(
                "{} declares {} entries but indexes {}",
                path.display(),
                entry_count,
                index.len()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            index,
            entry_count,
        })
    }

    /// Parse `[key_len(4)][offset(8)][key]` records
    fn parse_index(block: &[u8]) -> Result<BTreeMap<Vec<u8>, u64>> {
        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos < block.len() {
            if pos + 12 > block.len() {
                return Err(VbaError::Storage("truncated SSTable index entry".to_string()));
            }
            let key_len = le_u32(block, pos) as usize;
            let offset = le_u64(block, pos + 4);
            pos += 12;
            if pos + key_len > block.len() {
                return Err(VbaError::Storage("truncated SSTable index key".to_string()));
            }
            index.insert(block[pos..pos + key_len].to_vec(), offset);
            pos += key_len;
        }
        Ok(index)
    }

    /// Point lookup
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found with value
    /// - `Ok(None)`: key found but is a tombstone
    /// - `Err(KeyNotFound)`: key not in this SSTable
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Err(VbaError::KeyNotFound),
        };
        let (_, value) = self.read_entry(offset)?;
        Ok(value)
    }

    /// Entries with keys inside the bounds, ascending; `None` marks a tombstone
    pub fn range(
        &mut self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
    ) -> Result<Vec<(Vec<u8>, Option<Vec<u8>>)>> {
        if is_empty_range(lower, upper) {
            return Ok(Vec::new());
        }
        let offsets: Vec<u64> = self
            .index
            .range::<[u8], _>((lower, upper))
            .map(|(_, &off)| off)
            .collect();
        offsets.into_iter().map(|off| self.read_entry(off)).collect()
    }

    fn read_entry(&mut self, offset: u64) -> Result<(Vec<u8>, Option<Vec<u8>>)> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;
        let key_len = le_u32(&header, 0) as usize;
        let val_len = le_u32(&header, 4);

        let mut key = vec![0u8; key_len];
        self.file.read_exact(&mut key)?;
        if val_len == TOMBSTONE_MARKER {
            return Ok((key, None));
        }
        let mut value = vec![0u8; val_len as usize];
        self.file.read_exact(&mut value)?;
        Ok((key, Some(value)))
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// False only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false,
        }
    }
}
