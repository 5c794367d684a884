//! Byte Array Module
//!
//! Append-only storage of variable length byte payloads addressed by a
//! dense, zero-based record id.
//!
//! ## Responsibilities
//! - Append payloads singly or in batches
//! - Random reads by id and contiguous id ranges
//! - Tail truncation (the only supported delete)
//!
//! ## File Layout
//! ```text
//! index file                          data file
//! ┌───────────────┬─────────────┐     ┌──────────┬──────────┬─────┐
//! │ offset_0 (8)  │ size_0 (8)  │ ──▶ │ payload0 │ payload1 │ ... │
//! ├───────────────┼─────────────┤     └──────────┴──────────┴─────┘
//! │ offset_1 (8)  │ size_1 (8)  │ ──────────────▲
//! └───────────────┴─────────────┘
//! record i lives at index offset i * 16
//! ```

mod store;

pub use store::VariableByteStore;
