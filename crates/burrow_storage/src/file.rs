//! File-backed storage engine.

use crate::engine::{Cursor, StorageEngine, StorageTx};
use crate::error::{StorageError, StorageResult};
use crate::memory::{MemoryEngine, Table, Tables};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes identifying a BurrowDB snapshot image.
const MAGIC: &[u8; 8] = b"BRWSNAP\x01";

/// A file-backed transactional sorted key-value engine.
///
/// Committed state lives in memory; after every committed write transaction
/// the full image is rewritten to disk via a temp file and an atomic
/// rename, so the on-disk image is always some committed state. An `fs2`
/// exclusive lock file guards against two processes opening the same store.
///
/// # Example
///
/// ```rust,no_run
/// use burrow_storage::{FileEngine, StorageEngine};
///
/// let engine = FileEngine::open("data.burrow").unwrap();
/// let mut tx = engine.begin(true).unwrap();
/// tx.put("users", b"1", b"alice").unwrap();
/// tx.commit().unwrap();
/// ```
pub struct FileEngine {
    inner: MemoryEngine,
    path: PathBuf,
    persist_lock: Mutex<()>,
    // Held for the engine's lifetime; releasing the fs2 lock happens on drop.
    _lock_file: File,
}

impl FileEngine {
    /// Opens (or creates) the store at `path`.
    ///
    /// # Errors
    ///
    /// Fails with [`StorageError::Locked`] if another process holds the
    /// store, and [`StorageError::Corrupted`] if the image on disk is not a
    /// valid snapshot.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        let lock_path = path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StorageError::Locked)?;

        let tables = if path.exists() {
            read_image(&path)?
        } else {
            Tables::new()
        };

        Ok(Self {
            inner: MemoryEngine::with_tables(tables),
            path,
            persist_lock: Mutex::new(()),
            _lock_file: lock_file,
        })
    }

    /// Returns the path of the underlying data file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrites the on-disk image from the current committed state.
    fn persist(&self) -> StorageResult<()> {
        let _guard = self.persist_lock.lock();
        // Export inside the lock so the last persist wins with the newest
        // committed state.
        let tables = self.inner.export();

        let tmp_path = self.path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            write_image(&mut writer, &tables)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl StorageEngine for FileEngine {
    fn begin(&self, writable: bool) -> StorageResult<Box<dyn StorageTx + '_>> {
        let inner = self.inner.begin(writable)?;
        if writable {
            Ok(Box::new(FileTx {
                inner,
                engine: self,
            }))
        } else {
            Ok(inner)
        }
    }
}

struct FileTx<'e> {
    inner: Box<dyn StorageTx + 'e>,
    engine: &'e FileEngine,
}

impl StorageTx for FileTx<'_> {
    fn get(&self, namespace: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(namespace, key)
    }

    fn put(&mut self, namespace: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.inner.put(namespace, key, value)
    }

    fn delete(&mut self, namespace: &str, key: &[u8]) -> StorageResult<bool> {
        self.inner.delete(namespace, key)
    }

    fn cursor(&self, namespace: &str) -> StorageResult<Box<dyn Cursor>> {
        self.inner.cursor(namespace)
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        let this = *self;
        this.inner.commit()?;
        this.engine.persist()
    }

    fn rollback(self: Box<Self>) -> StorageResult<()> {
        let this = *self;
        this.inner.rollback()
    }
}

fn write_image<W: Write>(writer: &mut W, tables: &Tables) -> StorageResult<()> {
    writer.write_all(MAGIC)?;
    let table_count = u32::try_from(tables.len()).map_err(|_| {
        StorageError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "namespace count exceeds u32",
        ))
    })?;
    writer.write_all(&table_count.to_be_bytes())?;
    for (name, table) in tables {
        write_frame(writer, name.as_bytes())?;
        writer.write_all(&(table.len() as u64).to_be_bytes())?;
        for (key, value) in table {
            write_frame(writer, key)?;
            write_frame(writer, value)?;
        }
    }
    Ok(())
}

fn write_frame<W: Write>(writer: &mut W, bytes: &[u8]) -> StorageResult<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| {
        StorageError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "frame exceeds u32 length",
        ))
    })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(bytes)?;
    Ok(())
}

fn read_image(path: &Path) -> StorageResult<Tables> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 8];
    read_exact(&mut reader, &mut magic)?;
    if &magic != MAGIC {
        return Err(StorageError::Corrupted(
            "bad magic: not a BurrowDB snapshot".into(),
        ));
    }

    let table_count = read_u32(&mut reader)?;
    let mut tables = Tables::new();
    for _ in 0..table_count {
        let name_bytes = read_frame(&mut reader)?;
        let name = String::from_utf8(name_bytes)
            .map_err(|_| StorageError::Corrupted("namespace name is not UTF-8".into()))?;

        let entry_count = read_u64(&mut reader)?;
        let mut table = Table::new();
        for _ in 0..entry_count {
            let key = read_frame(&mut reader)?;
            let value = read_frame(&mut reader)?;
            table.insert(key, value);
        }
        tables.insert(name, table);
    }
    Ok(tables)
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> StorageResult<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            StorageError::Corrupted("truncated snapshot image".into())
        } else {
            StorageError::Io(e)
        }
    })
}

fn read_u32<R: Read>(reader: &mut R) -> StorageResult<u32> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> StorageResult<u64> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

fn read_frame<R: Read>(reader: &mut R) -> StorageResult<Vec<u8>> {
    let len = read_u32(reader)? as usize;
    let mut buf = vec![0u8; len];
    read_exact(reader, &mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn data_path(dir: &TempDir) -> PathBuf {
        dir.path().join("store.burrow")
    }

    #[test]
    fn open_creates_empty_store() {
        let dir = TempDir::new().unwrap();
        let engine = FileEngine::open(data_path(&dir)).unwrap();
        let tx = engine.begin(false).unwrap();
        assert_eq!(tx.get("ns", b"key").unwrap(), None);
    }

    #[test]
    fn committed_data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = data_path(&dir);

        {
            let engine = FileEngine::open(&path).unwrap();
            let mut tx = engine.begin(true).unwrap();
            tx.put("users", b"1", b"alice").unwrap();
            tx.put("users", b"2", b"bob").unwrap();
            tx.commit().unwrap();
        }

        let engine = FileEngine::open(&path).unwrap();
        let tx = engine.begin(false).unwrap();
        assert_eq!(tx.get("users", b"1").unwrap(), Some(b"alice".to_vec()));
        assert_eq!(tx.get("users", b"2").unwrap(), Some(b"bob".to_vec()));
    }

    #[test]
    fn uncommitted_data_not_persisted() {
        let dir = TempDir::new().unwrap();
        let path = data_path(&dir);

        {
            let engine = FileEngine::open(&path).unwrap();
            let mut tx = engine.begin(true).unwrap();
            tx.put("ns", b"key", b"value").unwrap();
            tx.rollback().unwrap();
        }

        let engine = FileEngine::open(&path).unwrap();
        let tx = engine.begin(false).unwrap();
        assert_eq!(tx.get("ns", b"key").unwrap(), None);
    }

    #[test]
    fn second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let path = data_path(&dir);
        let _engine = FileEngine::open(&path).unwrap();

        let result = FileEngine::open(&path);
        assert!(matches!(result.err(), Some(StorageError::Locked)));
    }

    #[test]
    fn corrupt_image_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = data_path(&dir);
        fs::write(&path, b"not a snapshot").unwrap();

        let result = FileEngine::open(&path);
        assert!(matches!(result.err(), Some(StorageError::Corrupted(_))));
    }

    #[test]
    fn deletes_are_persisted() {
        let dir = TempDir::new().unwrap();
        let path = data_path(&dir);

        {
            let engine = FileEngine::open(&path).unwrap();
            let mut tx = engine.begin(true).unwrap();
            tx.put("ns", b"key", b"value").unwrap();
            tx.commit().unwrap();

            let mut tx = engine.begin(true).unwrap();
            tx.delete("ns", b"key").unwrap();
            tx.commit().unwrap();
        }

        let engine = FileEngine::open(&path).unwrap();
        let tx = engine.begin(false).unwrap();
        assert_eq!(tx.get("ns", b"key").unwrap(), None);
    }
}
