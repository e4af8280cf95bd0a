//! In-memory storage engine.

use crate::engine::{Cursor, StorageEngine, StorageTx};
use crate::error::{StorageError, StorageResult};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::BTreeMap;
use std::thread::{self, ThreadId};

/// One namespace's committed entries.
pub(crate) type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// All committed namespaces, keyed by name.
pub(crate) type Tables = BTreeMap<String, Table>;

/// Pending writes for one namespace. `None` marks a deletion.
type Overlay = BTreeMap<String, BTreeMap<Vec<u8>, Option<Vec<u8>>>>;

/// An in-memory transactional sorted key-value engine.
///
/// Suitable for tests and ephemeral stores. Write transactions hold the
/// single-writer lock for their lifetime; read transactions work against a
/// snapshot cloned at `begin` and never block.
///
/// # Thread Safety
///
/// The engine is `Send + Sync` and may be shared across threads. Each
/// transaction belongs to the thread that began it.
///
/// # Example
///
/// ```rust
/// use burrow_storage::{MemoryEngine, StorageEngine};
///
/// let engine = MemoryEngine::new();
/// let mut tx = engine.begin(true).unwrap();
/// tx.put("users", b"1", b"alice").unwrap();
/// tx.commit().unwrap();
/// ```
#[derive(Debug, Default)]
pub struct MemoryEngine {
    tables: RwLock<Tables>,
    write_lock: Mutex<()>,
    writer_thread: Mutex<Option<ThreadId>>,
}

impl MemoryEngine {
    /// Creates a new empty in-memory engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine seeded with committed state.
    pub(crate) fn with_tables(tables: Tables) -> Self {
        Self {
            tables: RwLock::new(tables),
            write_lock: Mutex::new(()),
            writer_thread: Mutex::new(None),
        }
    }

    /// Returns a clone of all committed state.
    pub(crate) fn export(&self) -> Tables {
        self.tables.read().clone()
    }
}

impl StorageEngine for MemoryEngine {
    fn begin(&self, writable: bool) -> StorageResult<Box<dyn StorageTx + '_>> {
        let guard = if writable {
            let current = thread::current().id();
            if *self.writer_thread.lock() == Some(current) {
                return Err(StorageError::NestedWriteTransaction);
            }
            let guard = self.write_lock.lock();
            *self.writer_thread.lock() = Some(current);
            Some(guard)
        } else {
            None
        };

        Ok(Box::new(MemoryTx {
            engine: self,
            snapshot: self.tables.read().clone(),
            overlay: Overlay::new(),
            writable,
            _guard: guard,
        }))
    }
}

struct MemoryTx<'e> {
    engine: &'e MemoryEngine,
    snapshot: Tables,
    overlay: Overlay,
    writable: bool,
    _guard: Option<MutexGuard<'e, ()>>,
}

impl MemoryTx<'_> {
    /// Current value of `key` as seen by this transaction: pending writes
    /// first, then the begin-time snapshot.
    fn read(&self, namespace: &str, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(pending) = self.overlay.get(namespace) {
            if let Some(write) = pending.get(key) {
                return write.clone();
            }
        }
        self.snapshot
            .get(namespace)
            .and_then(|table| table.get(key))
            .cloned()
    }

    /// Materializes the transaction's current view of one namespace.
    fn merged_table(&self, namespace: &str) -> Table {
        let mut table = self.snapshot.get(namespace).cloned().unwrap_or_default();
        if let Some(pending) = self.overlay.get(namespace) {
            for (key, write) in pending {
                match write {
                    Some(value) => {
                        table.insert(key.clone(), value.clone());
                    }
                    None => {
                        table.remove(key);
                    }
                }
            }
        }
        table
    }
}

impl StorageTx for MemoryTx<'_> {
    fn get(&self, namespace: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.read(namespace, key))
    }

    fn put(&mut self, namespace: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        if !self.writable {
            return Err(StorageError::ReadOnlyTransaction);
        }
        self.overlay
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &[u8]) -> StorageResult<bool> {
        if !self.writable {
            return Err(StorageError::ReadOnlyTransaction);
        }
        let existed = self.read(namespace, key).is_some();
        self.overlay
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_vec(), None);
        Ok(existed)
    }

    fn cursor(&self, namespace: &str) -> StorageResult<Box<dyn Cursor>> {
        let entries: Vec<(Vec<u8>, Vec<u8>)> = self.merged_table(namespace).into_iter().collect();
        Ok(Box::new(MemoryCursor { entries, pos: 0 }))
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        if self.writable {
            let mut tables = self.engine.tables.write();
            for (namespace, pending) in &self.overlay {
                let table = tables.entry(namespace.clone()).or_default();
                for (key, write) in pending {
                    match write {
                        Some(value) => {
                            table.insert(key.clone(), value.clone());
                        }
                        None => {
                            table.remove(key);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) -> StorageResult<()> {
        // Pending writes are discarded when the transaction drops.
        Ok(())
    }
}

impl Drop for MemoryTx<'_> {
    fn drop(&mut self) {
        if self.writable {
            // Clear the re-entry marker before the write lock releases.
            *self.engine.writer_thread.lock() = None;
        }
    }
}

/// Cursor over a materialized namespace view.
struct MemoryCursor {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: usize,
}

impl Cursor for MemoryCursor {
    fn seek(&mut self, key: &[u8]) {
        self.pos = self.entries.partition_point(|(k, _)| k.as_slice() < key);
    }

    fn next(&mut self) -> Option<(Vec<u8>, Vec<u8>)> {
        let entry = self.entries.get(self.pos).cloned();
        if entry.is_some() {
            self.pos += 1;
        }
        entry
    }
}
