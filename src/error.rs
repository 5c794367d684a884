//! Error types for vbakv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using VbaError
pub type Result<T> = std::result::Result<T, VbaError>;

/// Unified error type for vbakv operations
#[derive(Debug, Error)]
pub enum VbaError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Byte Array Errors
    // -------------------------------------------------------------------------
    #[error("Record id {id} out of range (item count {count})")]
    OutOfRange { id: u64, count: u64 },

    #[error("Invalid record range [{lower}, {upper}) (item count {count})")]
    InvalidRange { lower: u64, upper: u64, count: u64 },

    #[error("Cannot remove last {k} records (item count {count})")]
    InvalidTruncate { k: u64, count: u64 },

    #[error("Record {id} is still referenced by key {key:?}")]
    RecordInUse { id: u64, key: String },

    #[error("Corrupt index file: {0}")]
    CorruptIndex(String),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // API Misuse
    // -------------------------------------------------------------------------
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
