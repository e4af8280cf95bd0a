//! Unique index implementation.

use crate::error::{CoreError, CoreResult};
use crate::index::{entry_key, paginate, scan_entries, QueryOptions};
use burrow_storage::StorageTx;

/// A unique index: one record identifier per value.
///
/// Each entry is stored as `entry key -> identifier bytes`, so equality
/// lookup is a single point read and uniqueness is checked on `add`.
#[derive(Debug, Clone)]
pub struct UniqueIndex {
    namespace: String,
    field: String,
}

impl UniqueIndex {
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

    /// Maps `value` to `id`.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::AlreadyExists`] if `value` already maps to
    /// a different identifier. Re-adding the same pair is a no-op.
    pub fn add(&self, tx: &mut dyn StorageTx, value: &[u8], id: &[u8]) -> CoreResult<()> {
        let key = entry_key(&self.field, value)?;
        match tx.get(&self.namespace, &key)? {
            Some(existing) if existing == id => Ok(()),
            Some(_) => Err(CoreError::already_exists(&self.field)),
            None => {
                tx.put(&self.namespace, &key, id)?;
                Ok(())
            }
        }
    }

    /// Deletes the entry for `value`.
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

    /// Removes the entry currently mapping to `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns storage errors only; an absent `id` is a no-op.
    pub fn remove_id(&self, tx: &mut dyn StorageTx, id: &[u8]) -> CoreResult<()> {
        for (key, stored) in scan_entries(&*tx, &self.namespace, &self.field, None, None)? {
            if stored == id {
                tx.delete(&self.namespace, &key)?;
                break;
            }
        }
        Ok(())
    }

    /// Returns the identifier mapped to `value`.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NotFound`] if no entry exists.
    pub fn get(&self, tx: &dyn StorageTx, value: &[u8]) -> CoreResult<Vec<u8>> {
        let key = entry_key(&self.field, value)?;
        tx.get(&self.namespace, &key)?.ok_or(CoreError::NotFound)
    }

    /// Returns the identifier mapped to `value` as a one-element sequence.
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
        let id = self.get(tx, value)?;
        Ok(paginate([id], opts))
    }

    /// Returns every indexed identifier in value-key order.
    ///
    /// # Errors
    ///
    /// Returns storage errors only.
    pub fn all_records(&self, tx: &dyn StorageTx, opts: QueryOptions) -> CoreResult<Vec<Vec<u8>>> {
        let entries = scan_entries(tx, &self.namespace, &self.field, None, None)?;
        Ok(paginate(entries.into_iter().map(|(_, id)| id), opts))
    }

    /// Returns identifiers for entries with encoded value in `[min, max]`.
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
        Ok(paginate(entries.into_iter().map(|(_, id)| id), opts))
    }
}
