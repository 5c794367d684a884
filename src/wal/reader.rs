//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::Result;

use super::{WalEntry, HEADER_SIZE};

/// Reads entries from the WAL file
///
/// A torn entry at the tail (partial header or partial data) ends the log:
/// `next_entry` returns `Ok(None)` and [`has_torn_tail`](Self::has_torn_tail)
/// turns true. A complete entry with a bad checksum is an error.
pub struct WalReader {
    file: BufReader<File>,
    file_len: u64,
    /// Offset just past the last entry returned
    position: u64,
    torn_tail: bool,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            file: BufReader::new(file),
            file_len,
            position: 0,
            torn_tail: false,
        })
    }

    /// Read the next entry from the WAL
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        if self.torn_tail {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_SIZE];
        let got = self.read_fully(&mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < HEADER_SIZE {
            self.torn_tail = true;
            return Ok(None);
        }

        let (lsn, crc, len) = WalEntry::parse_header(&header);
        // A length running past EOF is a torn write (or a garbled header)
        if self.position + (HEADER_SIZE as u64) + len as u64 > self.file_len {
            self.torn_tail = true;
            return Ok(None);
        }
        let mut data = vec![0u8; len as usize];
        if self.read_fully(&mut data)? < data.len() {
            self.torn_tail = true;
            return Ok(None);
        }

        let entry = WalEntry::from_parts(lsn, crc, len, &data)?;
        self.position += (HEADER_SIZE + data.len()) as u64;
        Ok(Some(entry))
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            failed: false,
        }
    }

    /// Byte offset just past the last good entry
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether reading stopped at an incomplete entry
    pub fn has_torn_tail(&self) -> bool {
        self.torn_tail
    }

    /// Read until `buf` is full or EOF; returns bytes read
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    failed: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
