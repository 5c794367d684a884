//! KV Database Module
//!
//! Key-value façade over an [`OrderedMap`](crate::engine::OrderedMap) engine,
//! optionally redirecting values into a
//! [`VariableByteStore`](crate::byte_array::VariableByteStore).
//!
//! ## Value Indirection ("vba" mode)
//! ```text
//!   set(key, value)
//!        │
//!        ├─1─▶ VariableByteStore::insert_bytes(value) ──▶ record id
//!        │
//!        └─2─▶ engine.put(key, le_u64(record id))
//! ```
//! Blob bytes are always appended before the pointer that references them is
//! committed, so the engine never holds a dangling id. Overwrites and removes
//! leave the old blob behind as unreachable bytes.

mod batch;
mod iter;
mod store;

pub use batch::WriteBatch;
pub use iter::{IterOptions, KvIterator};
pub use store::KvStore;
