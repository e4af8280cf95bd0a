//! Error types for BurrowDB core.

use crate::index::IndexKind;
use burrow_codec::CodecError;
use burrow_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in BurrowDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The namespace, record, index, or index entry does not exist.
    #[error("not found")]
    NotFound,

    /// A unique index already maps this value to a different record.
    #[error("unique index on field {field} already has an entry for this value")]
    AlreadyExists {
        /// The indexed field.
        field: String,
    },

    /// The key violates an encoding precondition.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Description of the violation.
        message: String,
    },

    /// The value has no order-preserving encoding.
    #[error("unsupported key type: {type_name}")]
    UnsupportedKeyType {
        /// Name of the unsupported type or value class.
        type_name: String,
    },

    /// An index was reopened with a different kind than it was created with.
    #[error("index kind mismatch on field {field}: stored {stored}, requested {requested}")]
    IndexKindMismatch {
        /// The indexed field.
        field: String,
        /// The kind recorded in the index metadata marker.
        stored: IndexKind,
        /// The kind the caller asked for.
        requested: IndexKind,
    },

    /// A write transaction was begun inside an active one on the same engine.
    #[error("nested write transaction")]
    NestedTransaction,

    /// Storage engine error.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Payload codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl CoreError {
    /// Creates an already-exists error for a unique index field.
    pub fn already_exists(field: impl Into<String>) -> Self {
        Self::AlreadyExists {
            field: field.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates an unsupported key type error.
    pub fn unsupported_key_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedKeyType {
            type_name: type_name.into(),
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            // Transaction misuse surfaces in the core taxonomy.
            StorageError::NestedWriteTransaction => Self::NestedTransaction,
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_write_maps_to_nested_transaction() {
        let err = CoreError::from(StorageError::NestedWriteTransaction);
        assert!(matches!(err, CoreError::NestedTransaction));
    }

    #[test]
    fn other_storage_errors_pass_through() {
        let err = CoreError::from(StorageError::Corrupted("bad".into()));
        assert!(matches!(err, CoreError::Storage(StorageError::Corrupted(_))));
    }
}
