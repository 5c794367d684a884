//! Fixed-width encodings
//!
//! All integers are little-endian, matching the on-disk SSTable and WAL
//! formats.
//!
//! ## Index Record Format
//! ```text
//! ┌──────────────────┬──────────────────┐
//! │  Offset: u64 (8) │   Size: u64 (8)  │
//! └──────────────────┴──────────────────┘
//! ```

use crate::error::{Result, VbaError};

/// Size of one index record on disk
pub const INDEX_RECORD_SIZE: u64 = 16;

/// Size of a serialized record pointer stored in the ordered map engine
pub const RECORD_POINTER_SIZE: usize = 8;

/// Location of one payload inside the data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    /// Byte offset in the data file where the payload begins
    pub offset: u64,
    /// Payload length in bytes
    pub size: u64,
}

impl IndexRecord {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Offset one past the last payload byte
    ///
    /// A record whose end does not fit in a `u64` is `CorruptIndex`.
    pub fn end(&self) -> Result<u64> {
        self.offset.checked_add(self.size).ok_or_else(|| {
            VbaError::CorruptIndex(format!(
                "record at offset {} with size {} overflows",
                self.offset, self.size
            ))
        })
    }

    pub fn encode(&self) -> [u8; INDEX_RECORD_SIZE as usize] {
        let mut buf = [0u8; INDEX_RECORD_SIZE as usize];
        buf[0..8].copy_from_slice(&self.offset.to_le_bytes());
        buf[8..16].copy_from_slice(&self.size.to_le_bytes());
        buf
    }

    /// Decode a record from exactly 16 bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != INDEX_RECORD_SIZE as usize {
            return Err(VbaError::CorruptIndex(format!(
                "index record must be {} bytes, got {}",
                INDEX_RECORD_SIZE,
                bytes.len()
            )));
        }
        Ok(Self {
            offset: read_u64(&bytes[0..8]),
            size: read_u64(&bytes[8..16]),
        })
    }

    /// Decode a contiguous run of records
    pub fn decode_all(bytes: &[u8]) -> Result<Vec<Self>> {
        if bytes.len() % INDEX_RECORD_SIZE as usize != 0 {
            return Err(VbaError::CorruptIndex(format!(
                "index block of {} bytes is not a whole number of records",
                bytes.len()
            )));
        }
        bytes
            .chunks_exact(INDEX_RECORD_SIZE as usize)
            .map(Self::decode)
            .collect()
    }
}

/// Serialize a record id for storage as an engine value
pub fn encode_record_id(id: u64) -> [u8; RECORD_POINTER_SIZE] {
    id.to_le_bytes()
}

/// Deserialize a record id previously written by [`encode_record_id`]
pub fn decode_record_id(bytes: &[u8]) -> Result<u64> {
    if bytes.len() != RECORD_POINTER_SIZE {
        return Err(VbaError::Serialization(format!(
            "record pointer must be {} bytes, got {}",
            RECORD_POINTER_SIZE,
            bytes.len()
        )));
    }
    Ok(read_u64(bytes))
}

/// Caller guarantees `bytes.len() == 8`
fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
