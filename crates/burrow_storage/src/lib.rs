//! # BurrowDB Storage
//!
//! Transactional sorted key-value engine boundary for BurrowDB.
//!
//! This crate defines the storage contract the index engine and record
//! layer are built against:
//!
//! - [`StorageEngine`] - begins transactions
//! - [`StorageTx`] - get/put/delete plus ordered cursors, commit/rollback
//! - [`Cursor`] - ascending byte-order iteration with seek
//!
//! Engines are opaque byte stores organized into named namespaces. They do
//! not interpret keys or values; key layout belongs to the layers above.
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - for tests and ephemeral stores
//! - [`FileEngine`] - persistent, single-process, snapshot-image backed
//!
//! ## Example
//!
//! ```rust
//! use burrow_storage::{MemoryEngine, StorageEngine};
//!
//! let engine = MemoryEngine::new();
//! let mut tx = engine.begin(true).unwrap();
//! tx.put("users", b"1", b"alice").unwrap();
//! tx.commit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod file;
mod memory;

pub use engine::{Cursor, StorageEngine, StorageTx};
pub use error::{StorageError, StorageResult};
pub use file::FileEngine;
pub use memory::MemoryEngine;
