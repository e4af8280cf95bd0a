//! Order-preserving key encoding.
//!
//! A [`Key`] is one of a closed set of scalar variants, each with a
//! deterministic byte encoding whose lexicographic order matches the
//! natural order of the underlying type. This is what makes byte-range
//! cursor scans over index entries equivalent to value-range queries.
//!
//! Composite values (maps, sequences) have no defined ordering here and
//! are intentionally unrepresentable: callers must reduce them to a
//! supported scalar or raw bytes before indexing.

use crate::error::{CoreError, CoreResult};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SIGN_BIT: u64 = 1 << 63;

/// A typed scalar used as a record identifier or indexed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    Uint(u64),
    /// IEEE-754 double. `NaN` has no ordering and cannot be encoded.
    Float(f64),
    /// UTF-8 text, ordered lexicographically by its bytes.
    Text(String),
    /// Raw bytes, passed through unchanged.
    Bytes(Vec<u8>),
    /// Boolean, `false` before `true`.
    Bool(bool),
    /// A point in time, ordered chronologically.
    Instant(SystemTime),
}

impl Key {
    /// Encodes the key to order-preserving bytes.
    ///
    /// For values of the same variant, byte-lexicographic order of the
    /// encoding equals the natural order of the values. Fixed-width
    /// numeric variants use a big-endian layout with the sign handled so
    /// that negative values sort before positive ones.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::UnsupportedKeyType`] for `NaN` floats and
    /// for instants outside the encodable window (roughly years
    /// 1678-2262, i64 nanoseconds around the Unix epoch).
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        match self {
            Key::Int(v) => Ok(encode_i64(*v).to_vec()),
            Key::Uint(v) => Ok(v.to_be_bytes().to_vec()),
            Key::Float(v) => {
                if v.is_nan() {
                    return Err(CoreError::unsupported_key_type("NaN float"));
                }
                Ok(encode_f64(*v).to_vec())
            }
            Key::Text(s) => Ok(s.as_bytes().to_vec()),
            Key::Bytes(b) => Ok(b.clone()),
            Key::Bool(b) => Ok(vec![u8::from(*b)]),
            Key::Instant(t) => {
                let nanos = instant_nanos(*t)?;
                Ok(encode_i64(nanos).to_vec())
            }
        }
    }
}

fn encode_i64(v: i64) -> [u8; 8] {
    // Flipping the sign bit maps i64 order onto unsigned byte order.
    ((v as u64) ^ SIGN_BIT).to_be_bytes()
}

fn encode_f64(v: f64) -> [u8; 8] {
    // IEEE-754 total-order transform: invert negatives entirely, set the
    // sign bit on non-negatives.
    let bits = v.to_bits();
    let mapped = if bits & SIGN_BIT != 0 {
        !bits
    } else {
        bits | SIGN_BIT
    };
    mapped.to_be_bytes()
}

fn instant_nanos(t: SystemTime) -> CoreResult<i64> {
    let nanos: i128 = match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i128::try_from(d.as_nanos())
            .map_err(|_| CoreError::unsupported_key_type("instant outside encodable range"))?,
        Err(e) => {
            let before = i128::try_from(e.duration().as_nanos())
                .map_err(|_| CoreError::unsupported_key_type("instant outside encodable range"))?;
            -before
        }
    };
    i64::try_from(nanos)
        .map_err(|_| CoreError::unsupported_key_type("instant outside encodable range"))
}

fn fixed8(bytes: &[u8], what: &str) -> CoreResult<[u8; 8]> {
    bytes
        .try_into()
        .map_err(|_| CoreError::invalid_key(format!("expected 8 bytes for {what}")))
}

/// Decodes an encoded signed integer key.
///
/// # Errors
///
/// Fails with [`CoreError::InvalidKey`] if `bytes` is not 8 bytes.
pub fn decode_int(bytes: &[u8]) -> CoreResult<i64> {
    let arr = fixed8(bytes, "Int")?;
    Ok((u64::from_be_bytes(arr) ^ SIGN_BIT) as i64)
}

/// Decodes an encoded unsigned integer key.
///
/// # Errors
///
/// Fails with [`CoreError::InvalidKey`] if `bytes` is not 8 bytes.
pub fn decode_uint(bytes: &[u8]) -> CoreResult<u64> {
    Ok(u64::from_be_bytes(fixed8(bytes, "Uint")?))
}

/// Decodes an encoded float key.
///
/// # Errors
///
/// Fails with [`CoreError::InvalidKey`] if `bytes` is not 8 bytes.
pub fn decode_float(bytes: &[u8]) -> CoreResult<f64> {
    let mapped = u64::from_be_bytes(fixed8(bytes, "Float")?);
    let bits = if mapped & SIGN_BIT != 0 {
        mapped ^ SIGN_BIT
    } else {
        !mapped
    };
    Ok(f64::from_bits(bits))
}

/// Decodes an encoded instant key.
///
/// # Errors
///
/// Fails with [`CoreError::InvalidKey`] if `bytes` is not 8 bytes.
pub fn decode_instant(bytes: &[u8]) -> CoreResult<SystemTime> {
    let nanos = decode_int(bytes)?;
    let duration = Duration::from_nanos(nanos.unsigned_abs());
    if nanos >= 0 {
        Ok(UNIX_EPOCH + duration)
    } else {
        Ok(UNIX_EPOCH - duration)
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key::Int(i64::from(v))
    }
}

impl From<u64> for Key {
    fn from(v: u64) -> Self {
        Key::Uint(v)
    }
}

impl From<u32> for Key {
    fn from(v: u32) -> Self {
        Key::Uint(u64::from(v))
    }
}

impl From<f64> for Key {
    fn from(v: f64) -> Self {
        Key::Float(v)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Text(v.to_string())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Text(v)
    }
}

impl From<&[u8]> for Key {
    fn from(v: &[u8]) -> Self {
        Key::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Key {
    fn from(v: Vec<u8>) -> Self {
        Key::Bytes(v)
    }
}

impl From<bool> for Key {
    fn from(v: bool) -> Self {
        Key::Bool(v)
    }
}

impl From<SystemTime> for Key {
    fn from(v: SystemTime) -> Self {
        Key::Instant(v)
    }
}
