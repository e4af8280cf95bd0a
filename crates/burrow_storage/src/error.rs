//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The persisted image is corrupted or has an unknown format.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// A write transaction was begun while the same thread already holds one.
    ///
    /// Writers on other threads block on the single-writer lock instead;
    /// only same-thread re-entry fails fast, because blocking there would
    /// deadlock.
    #[error("write transaction already active on this thread")]
    NestedWriteTransaction,

    /// A mutating operation was attempted on a read-only transaction.
    #[error("transaction is read-only")]
    ReadOnlyTransaction,

    /// The engine's data file is locked by another process.
    #[error("storage locked: another process has exclusive access")]
    Locked,
}
