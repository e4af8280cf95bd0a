//! CBOR codec implementation.

use crate::error::{CodecError, CodecResult};
use crate::Codec;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// CBOR payload codec backed by `ciborium`.
///
/// This is the default codec for BurrowDB stores. Payloads are opaque to
/// the store; this codec is only consulted at the record-access boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl CborCodec {
    /// Creates a new CBOR codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Codec for CborCodec {
    fn encode<T: Serialize>(&self, value: &T) -> CodecResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(value, &mut bytes)
            .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        Ok(bytes)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        ciborium::de::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
    }
}
