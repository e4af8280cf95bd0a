//! Storage engine trait definitions.

use crate::error::StorageResult;

/// A transactional, sorted key-value engine.
///
/// Engines are **opaque byte stores** organized into named namespaces.
/// Within a namespace, keys are unique byte strings iterated in ascending
/// byte order. Engines do not interpret keys or values - all layout
/// interpretation belongs to the layers above.
///
/// # Invariants
///
/// - At most one write transaction is active at a time (single writer).
/// - Read transactions observe a consistent snapshot taken at `begin`.
/// - A transaction observes its own uncommitted writes.
/// - Beginning a write transaction on a thread that already holds one
///   fails fast with [`StorageError::NestedWriteTransaction`] rather than
///   deadlocking.
///
/// [`StorageError::NestedWriteTransaction`]: crate::StorageError::NestedWriteTransaction
pub trait StorageEngine: Send + Sync {
    /// Begins a new transaction.
    ///
    /// A writable transaction acquires the single-writer lock for its
    /// lifetime; read-only transactions never block.
    ///
    /// # Errors
    ///
    /// Returns an error if a writable transaction is requested on a thread
    /// that already holds one.
    fn begin(&self, writable: bool) -> StorageResult<Box<dyn StorageTx + '_>>;
}

/// An open transaction against a storage engine.
///
/// Dropping a transaction without calling [`commit`](StorageTx::commit)
/// discards all of its pending writes.
pub trait StorageTx {
    /// Returns the value stored under `key` in `namespace`, if any.
    ///
    /// Absent namespaces read as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to read.
    fn get(&self, namespace: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key` in `namespace`, creating the namespace
    /// if it does not exist and overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Fails with [`ReadOnlyTransaction`](crate::StorageError::ReadOnlyTransaction)
    /// on a read-only transaction.
    fn put(&mut self, namespace: &str, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Deletes `key` from `namespace`.
    ///
    /// Returns whether a value was present, so callers can distinguish a
    /// deletion from a no-op.
    ///
    /// # Errors
    ///
    /// Fails with [`ReadOnlyTransaction`](crate::StorageError::ReadOnlyTransaction)
    /// on a read-only transaction.
    fn delete(&mut self, namespace: &str, key: &[u8]) -> StorageResult<bool>;

    /// Opens a cursor over `namespace`.
    ///
    /// The cursor yields keys in ascending byte order and sees the
    /// transaction's state as of this call, including its own pending
    /// writes. It holds no borrow of the transaction, so the transaction
    /// may be mutated while the cursor is alive; the cursor's view does not
    /// change.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to read.
    fn cursor(&self, namespace: &str) -> StorageResult<Box<dyn Cursor>>;

    /// Commits the transaction, making all pending writes visible to
    /// transactions begun afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to apply or persist the writes.
    fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discards all pending writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to release transaction state.
    fn rollback(self: Box<Self>) -> StorageResult<()>;
}

/// A cursor over one namespace, yielding entries in ascending key order.
pub trait Cursor {
    /// Positions the cursor at the first key greater than or equal to `key`.
    fn seek(&mut self, key: &[u8]);

    /// Returns the entry at the current position and advances.
    ///
    /// Returns `None` once the namespace is exhausted.
    fn next(&mut self) -> Option<(Vec<u8>, Vec<u8>)>;
}
