//! # vbakv
//!
//! A variable byte array store with an ordered key-value index layer:
//! - Append-only, two-file blob store addressed by dense record ids
//! - Key-value façade over a sorted engine, optionally redirecting values
//!   into the blob store
//! - Range, prefix and reverse scans with independent boundary inclusion
//! - Atomic write batches backed by a write-ahead log
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         KvStore                              │
//! │          get / set / remove / batch_write / iterator         │
//! └──────────────┬───────────────────────────────┬──────────────┘
//!                │ keys → values | record ids    │ values (vba mode)
//!                ▼                               ▼
//!   ┌──────────────────────────┐      ┌──────────────────────────┐
//!   │   OrderedMap engine      │      │   VariableByteStore      │
//!   │  (LsmEngine by default)  │      │  values.idx + values.dat │
//!   └────────────┬─────────────┘      └──────────────────────────┘
//!                │
//!     ┌──────────┼──────────┐
//!     ▼          ▼          ▼
//!  ┌──────┐ ┌─────────┐ ┌─────────┐
//!  │ WAL  │ │MemTable │ │SSTables │
//!  └──────┘ └─────────┘ └─────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod encoding;

pub mod byte_array;
pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;
pub mod kv_iter;
pub mod kv_db;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{VbaError, Result};
pub use config::Config;
pub use byte_array::VariableByteStore;
pub use engine::{BatchOp, LsmEngine, MemoryEngine, OrderedMap};
pub use kv_iter::{Entry, RangeIterator, RangeSpec};
pub use kv_db::{IterOptions, KvIterator, KvStore, WriteBatch};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of vbakv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
