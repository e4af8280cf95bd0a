//! Index kind markers.
//!
//! Each index persists a one-byte kind marker under a reserved metadata key
//! in its own namespace, so reopening a namespace recovers its indexes
//! without any external schema.

use crate::error::{CoreError, CoreResult};
use crate::index::{meta_key, FieldIndex, IndexKind};
use burrow_storage::StorageTx;

/// Opens the index on `(namespace, field)`, creating its kind marker on
/// first use.
///
/// # Errors
///
/// Fails with [`CoreError::IndexKindMismatch`] if a marker already exists
/// and records a different kind than `kind`.
pub fn open_index(
    tx: &mut dyn StorageTx,
    namespace: &str,
    field: &str,
    kind: IndexKind,
) -> CoreResult<FieldIndex> {
    let key = meta_key(field);
    match tx.get(namespace, &key)? {
        Some(marker) => {
            let stored = decode_marker(&marker)?;
            if stored != kind {
                return Err(CoreError::IndexKindMismatch {
                    field: field.to_string(),
                    stored,
                    requested: kind,
                });
            }
        }
        None => {
            tracing::debug!(namespace, field, %kind, "creating index");
            tx.put(namespace, &key, &[kind.as_u8()])?;
        }
    }
    Ok(FieldIndex::new(namespace, field, kind))
}

/// Looks up the existing index on `(namespace, field)`.
///
/// # Errors
///
/// Fails with [`CoreError::NotFound`] if the field was never indexed.
pub fn lookup_index(tx: &dyn StorageTx, namespace: &str, field: &str) -> CoreResult<FieldIndex> {
    let key = meta_key(field);
    let marker = tx.get(namespace, &key)?.ok_or(CoreError::NotFound)?;
    let kind = decode_marker(&marker)?;
    Ok(FieldIndex::new(namespace, field, kind))
}

fn decode_marker(marker: &[u8]) -> CoreResult<IndexKind> {
    match marker {
        [byte] => IndexKind::try_from(*byte),
        _ => Err(CoreError::Storage(burrow_storage::StorageError::Corrupted(
            format!("index kind marker has length {}", marker.len()),
        ))),
    }
}
