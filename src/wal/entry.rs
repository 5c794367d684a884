//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VbaError};

/// Header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// Apply every nested operation, or none of them
    Batch { ops: Vec<Operation> },
}

/// Body stored in the data section (LSN lives in the header)
#[derive(Serialize, Deserialize)]
struct EntryBody {
    operation: Operation,
    timestamp: u64,
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Encode as `[lsn][crc][len][data]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let body = EntryBody {
            operation: self.operation.clone(),
            timestamp: self.timestamp,
        };
        let data = bincode::serialize(&body)
            .map_err(|e| VbaError::Serialization(format!("WAL entry encode: {}", e)))?;
        let len = u32::try_from(data.len()).map_err(|_| {
            VbaError::WalWrite(format!("WAL entry of {} bytes is too large", data.len()))
        })?;

        let lsn_bytes = self.lsn.to_le_bytes();
        let len_bytes = len.to_le_bytes();
        let crc = Self::compute_crc(&lsn_bytes, &len_bytes, &data);

        let mut out = Vec::with_capacity(HEADER_SIZE + data.len());
        out.extend_from_slice(&lsn_bytes);
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&len_bytes);
        out.extend_from_slice(&data);
        Ok(out)
    }

    /// Decode one complete entry, verifying its checksum
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(VbaError::WalCorruption(format!(
                "entry of {} bytes is shorter than the {} byte header",
                bytes.len(),
                HEADER_SIZE
            )));
        }
        let (lsn, crc, len) = Self::parse_header(&bytes[..HEADER_SIZE]);
        let data = &bytes[HEADER_SIZE..];
        if data.len() != len as usize {
            return Err(VbaError::WalCorruption(format!(
                "entry declares {} data bytes but {} are present",
                len,
                data.len()
            )));
        }
        Self::from_parts(lsn, crc, len, data)
    }

    /// Split a header into (lsn, crc, len)
    pub(super) fn parse_header(header: &[u8]) -> (u64, u32, u32) {
        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&header[0..8]);
        crc.copy_from_slice(&header[8..12]);
        len.copy_from_slice(&header[12..16]);
        (
            u64::from_le_bytes(lsn),
            u32::from_le_bytes(crc),
            u32::from_le_bytes(len),
        )
    }

    /// Rebuild an entry from a parsed header and its data bytes
    pub(super) fn from_parts(lsn: u64, crc: u32, len: u32, data: &[u8]) -> Result<Self> {
        let expected = Self::compute_crc(&lsn.to_le_bytes(), &len.to_le_bytes(), data);
        if expected != crc {
            return Err(VbaError::WalCorruption(format!(
                "CRC mismatch for LSN {}: stored {:#010x}, computed {:#010x}",
                lsn, crc, expected
            )));
        }

        let body: EntryBody = bincode::deserialize(data)
            .map_err(|e| VbaError::WalCorruption(format!("undecodable entry body: {}", e)))?;

        Ok(Self {
            lsn,
            operation: body.operation,
            timestamp: body.timestamp,
        })
    }

    fn compute_crc(lsn: &[u8], len: &[u8], data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(lsn);
        hasher.update(len);
        hasher.update(data);
        hasher.finalize()
    }
}
