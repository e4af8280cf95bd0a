//! List index implementation.

use crate::error::{CoreError, CoreResult};
use crate::index::{decode_ids, encode_ids, entry_key, paginate, scan_entries, QueryOptions};
use burrow_storage::StorageTx;

/// A list index: an ordered, duplicate-free identifier sequence per value.
///
/// Each entry is stored as `entry key -> framed identifier sequence` in
/// insertion order. `add` is idempotent per (value, identifier) pair so a
/// caller-driven retry after a partial failure cannot double-insert.
#[derive(Debug, Clone)]
pub struct ListIndex {
    namespace: String,
    field: String,
}

impl ListIndex {
    pub(crate) fn new(namespace: &str, field: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            field: field.to_string(),
        }
    }

    /// Returns the indexed field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Appends `id` to `value`'s sequence if not already present.
    ///
    /// # Errors
    ///
    /// Returns storage errors only.
    pub fn add(&self, tx: &mut dyn StorageTx, value: &[u8], id: &[u8]) -> CoreResult<()> {
        let key = entry_key(&self.field, value)?;
        let mut ids = match tx.get(&self.namespace, &key)? {
            Some(bytes) => decode_ids(&bytes)?,
            None => Vec::new(),
        };
        if ids.iter().any(|existing| existing == id) {
            return Ok(());
        }
        ids.push(id.to_vec());
        tx.put(&self.namespace, &key, &encode_ids(&ids))?;
        Ok(())
    }

    /// Deletes the whole sequence stored for `value`.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NotFound`] if no entry exists.
    pub fn remove(&self, tx: &mut dyn StorageTx, value: &[u8]) -> CoreResult<()> {
        let key = entry_key(&self.field, value)?;
        if !tx.delete(&self.namespace, &key)? {
            return Err(CoreError::NotFound);
        }
        Ok(())
    }

    /// Removes `id` from the sequence currently holding it, if any.
    ///
    /// The entry is deleted outright when its sequence becomes empty, so
    /// `all` keeps its absent-value contract.
    ///
    /// # Errors
    ///
    /// Returns storage errors only; an absent `id` is a no-op.
    pub fn remove_id(&self, tx: &mut dyn StorageTx, id: &[u8]) -> CoreResult<()> {
        for (key, payload) in scan_entries(&*tx, &self.namespace, &self.field, None, None)? {
            let mut ids = decode_ids(&payload)?;
            if let Some(pos) = ids.iter().position(|existing| existing == id) {
                ids.remove(pos);
                if ids.is_empty() {
                    tx.delete(&self.namespace, &key)?;
                } else {
                    tx.put(&self.namespace, &key, &encode_ids(&ids))?;
                }
                break;
            }
        }
        Ok(())
    }

    /// Returns `value`'s sequence in insertion order.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NotFound`] if no entry exists.
    pub fn all(
        &self,
        tx: &dyn StorageTx,
        value: &[u8],
        opts: QueryOptions,
    ) -> CoreResult<Vec<Vec<u8>>> {
        let key = entry_key(&self.field, value)?;
        let bytes = tx.get(&self.namespace, &key)?.ok_or(CoreError::NotFound)?;
        Ok(paginate(decode_ids(&bytes)?, opts))
    }

    /// Returns every indexed identifier, ordered by value key and by
    /// insertion order within equal values.
    ///
    /// # Errors
    ///
    /// Returns storage errors only.
    pub fn all_records(&self, tx: &dyn StorageTx, opts: QueryOptions) -> CoreResult<Vec<Vec<u8>>> {
        let entries = scan_entries(tx, &self.namespace, &self.field, None, None)?;
        let mut ids = Vec::new();
        for (_, payload) in entries {
            ids.extend(decode_ids(&payload)?);
        }
        Ok(paginate(ids, opts))
    }

    /// Returns identifiers for entries with encoded value in `[min, max]`,
    /// concatenated in value-key order.
    ///
    /// # Errors
    ///
    /// Returns storage errors only.
    pub fn range(
        &self,
        tx: &dyn StorageTx,
        min: &[u8],
        max: &[u8],
        opts: QueryOptions,
    ) -> CoreResult<Vec<Vec<u8>>> {
        let entries = scan_entries(tx, &self.namespace, &self.field, Some(min), Some(max))?;
        let mut ids = Vec::new();
        for (_, payload) in entries {
            ids.extend(decode_ids(&payload)?);
        }
        Ok(paginate(ids, opts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_storage::{MemoryEngine, StorageEngine};

    fn index() -> ListIndex {
        ListIndex::new("users", "group")
    }

    #[test]
    fn add_preserves_insertion_order() {
        let engine = MemoryEngine::new();
        let mut tx = engine.begin(true).unwrap();
        let index = index();

        index.add(&mut *tx, b"staff", b"100").unwrap();
        index.add(&mut *tx, b"staff", b"101").unwrap();
        index.add(&mut *tx, b"admin", b"102").unwrap();

        let staff = index.all(&*tx, b"staff", QueryOptions::new()).unwrap();
        assert_eq!(staff, vec![b"100".to_vec(), b"101".to_vec()]);

        let admin = index.all(&*tx, b"admin", QueryOptions::new()).unwrap();
        assert_eq!(admin, vec![b"102".to_vec()]);
    }

    #[test]
    fn add_is_idempotent_per_pair() {
        let engine = MemoryEngine::new();
        let mut tx = engine.begin(true).unwrap();
        let index = index();

        index.add(&mut *tx, b"staff", b"100").unwrap();
        index.add(&mut *tx, b"staff", b"100").unwrap();

        let staff = index.all(&*tx, b"staff", QueryOptions::new()).unwrap();
        assert_eq!(staff, vec![b"100".to_vec()]);
    }

    #[test]
    fn remove_deletes_whole_entry() {
        let engine = MemoryEngine::new();
        let mut tx = engine.begin(true).unwrap();
        let index = index();

        index.add(&mut *tx, b"staff", b"100").unwrap();
        index.add(&mut *tx, b"staff", b"101").unwrap();
        index.remove(&mut *tx, b"staff").unwrap();

        let result = index.all(&*tx, b"staff", QueryOptions::new());
        assert!(matches!(result, Err(CoreError::NotFound)));
    }

    #[test]
    fn remove_absent_is_not_found() {
        let engine = MemoryEngine::new();
        let mut tx = engine.begin(true).unwrap();
        let result = index().remove(&mut *tx, b"ghost");
        assert!(matches!(result, Err(CoreError::NotFound)));
    }

    #[test]
    fn remove_id_touches_only_its_entry() {
        let engine = MemoryEngine::new();
        let mut tx = engine.begin(true).unwrap();
        let index = index();

        index.add(&mut *tx, b"staff", b"100").unwrap();
        index.add(&mut *tx, b"staff", b"101").unwrap();
        index.add(&mut *tx, b"admin", b"102").unwrap();

        index.remove_id(&mut *tx, b"100").unwrap();

        let staff = index.all(&*tx, b"staff", QueryOptions::new()).unwrap();
        assert_eq!(staff, vec![b"101".to_vec()]);
        let admin = index.all(&*tx, b"admin", QueryOptions::new()).unwrap();
        assert_eq!(admin, vec![b"102".to_vec()]);
    }

    #[test]
    fn remove_id_deletes_emptied_entry() {
        let engine = MemoryEngine::new();
        let mut tx = engine.begin(true).unwrap();
        let index = index();

        index.add(&mut *tx, b"staff", b"100").unwrap();
        index.remove_id(&mut *tx, b"100").unwrap();

        let result = index.all(&*tx, b"staff", QueryOptions::new());
        assert!(matches!(result, Err(CoreError::NotFound)));
    }

    #[test]
    fn remove_id_absent_is_noop() {
        let engine = MemoryEngine::new();
        let mut tx = engine.begin(true).unwrap();
        let index = index();

        index.add(&mut *tx, b"staff", b"100").unwrap();
        index.remove_id(&mut *tx, b"999").unwrap();

        let staff = index.all(&*tx, b"staff", QueryOptions::new()).unwrap();
        assert_eq!(staff, vec![b"100".to_vec()]);
    }

    #[test]
    fn all_records_orders_by_value_then_insertion() {
        let engine = MemoryEngine::new();
        let mut tx = engine.begin(true).unwrap();
        let index = index();

        index.add(&mut *tx, b"staff", b"100").unwrap();
        index.add(&mut *tx, b"admin", b"102").unwrap();
        index.add(&mut *tx, b"staff", b"101").unwrap();

        let ids = index.all_records(&*tx, QueryOptions::new()).unwrap();
        // "admin" < "staff" in key order; insertion order within "staff".
        assert_eq!(ids, vec![b"102".to_vec(), b"100".to_vec(), b"101".to_vec()]);
    }

    #[test]
    fn all_records_counts_every_id_once() {
        let engine = MemoryEngine::new();
        let mut tx = engine.begin(true).unwrap();
        let index = index();

        for (value, id) in [
            (&b"a"[..], &b"1"[..]),
            (b"a", b"2"),
            (b"b", b"3"),
            (b"c", b"4"),
            (b"c", b"5"),
        ] {
            index.add(&mut *tx, value, id).unwrap();
        }

        let mut ids = index.all_records(&*tx, QueryOptions::new()).unwrap();
        assert_eq!(ids.len(), 5);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn range_is_inclusive_and_ordered() {
        let engine = MemoryEngine::new();
        let mut tx = engine.begin(true).unwrap();
        let index = index();

        index.add(&mut *tx, b"x", b"1").unwrap();
        index.add(&mut *tx, b"xm", b"2").unwrap();
        index.add(&mut *tx, b"y", b"3").unwrap();
        index.add(&mut *tx, b"z", b"4").unwrap();

        let ids = index.range(&*tx, b"x", b"y", QueryOptions::new()).unwrap();
        assert_eq!(ids, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
    }

    #[test]
    fn pagination_spans_entries() {
        let engine = MemoryEngine::new();
        let mut tx = engine.begin(true).unwrap();
        let index = index();

        index.add(&mut *tx, b"a", b"1").unwrap();
        index.add(&mut *tx, b"a", b"2").unwrap();
        index.add(&mut *tx, b"b", b"3").unwrap();

        let opts = QueryOptions::new().skip(1).limit(2);
        let ids = index.all_records(&*tx, opts).unwrap();
        assert_eq!(ids, vec![b"2".to_vec(), b"3".to_vec()]);
    }
}
