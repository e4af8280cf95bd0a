//! # BurrowDB Codec
//!
//! Pluggable payload serialization for BurrowDB.
//!
//! A [`Codec`] turns typed values into opaque byte payloads and back. The
//! store treats payloads as opaque: the codec is only consulted at the
//! record-access boundary, never for key layout (keys use the
//! order-preserving encoder in `burrow_core`).
//!
//! The default implementation is [`CborCodec`]. Stores are generic over
//! their codec, so an alternative can be plugged in per store instance.
//!
//! ## Usage
//!
//! ```
//! use burrow_codec::{CborCodec, Codec};
//!
//! let codec = CborCodec::new();
//! let bytes = codec.encode(&("alice", 30)).unwrap();
//! let decoded: (String, u32) = codec.decode(&bytes).unwrap();
//! assert_eq!(decoded, ("alice".to_string(), 30));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;

pub use cbor::CborCodec;
pub use error::{CodecError, CodecResult};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A payload codec: typed values to opaque bytes and back.
///
/// Implementations must be deterministic enough for their own round-trip;
/// the store imposes no canonical-form requirement on payloads.
pub trait Codec: Send + Sync {
    /// Encodes a value to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented by this codec.
    fn encode<T: Serialize>(&self, value: &T) -> CodecResult<Vec<u8>>;

    /// Decodes a value from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoding of `T`.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T>;
}
