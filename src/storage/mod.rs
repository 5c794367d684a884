//! Storage Module
//!
//! Immutable on-disk layer of the LSM ordered map engine.
//!
//! ## Responsibilities
//! - Persist flushed memtables as sorted SSTables
//! - Point lookups newest → oldest
//! - Range snapshots merged across all tables

mod sstable;
mod manager;

pub use sstable::{SSTable, SSTableBuilder, SSTableReader};
pub use manager::StorageManager;
