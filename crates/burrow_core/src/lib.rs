//! Typed record storage with secondary indexes.
//!
//! `burrow_core` layers records and indexes over a transactional sorted
//! key-value engine from [`burrow_storage`], serializing record payloads
//! with a [`burrow_codec`] codec:
//!
//! - [`Key`]: order-preserving byte encoding for index values and record
//!   identifiers, so lexicographic byte order equals logical order
//! - [`Store`] / [`Session`]: typed get/set/delete over namespaces, with
//!   explicit or implicit per-call transactions
//! - [`FieldIndex`]: unique and list secondary indexes, persisted inside
//!   the record namespace under reserved key prefixes
//!
//! # Example
//!
//! ```rust
//! use burrow_codec::CborCodec;
//! use burrow_core::{IndexKind, Key, QueryOptions, Store};
//! use burrow_storage::MemoryEngine;
//!
//! # fn main() -> burrow_core::CoreResult<()> {
//! let store = Store::new(MemoryEngine::new(), CborCodec::new());
//! store.create_index("users", "group", IndexKind::List)?;
//!
//! store.in_transaction(|session| {
//!     session.set_raw("users", b"100", b"john")?;
//!     session.index_add("users", "group", &Key::from("staff"), b"100")
//! })?;
//!
//! let session = store.begin(false)?;
//! let staff = session.index_all("users", "group", &Key::from("staff"), QueryOptions::new())?;
//! assert_eq!(staff, vec![b"100".to_vec()]);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod index;
mod key;
mod record;
mod store;

pub use error::{CoreError, CoreResult};
pub use index::{
    lookup_index, open_index, FieldIndex, IndexKind, ListIndex, QueryOptions, UniqueIndex,
};
pub use key::{decode_float, decode_instant, decode_int, decode_uint, Key};
pub use store::{RecordId, Session, Store};
