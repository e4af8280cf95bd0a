//! Raw record operations on a namespace.
//!
//! Records are opaque byte payloads keyed by caller-chosen identifiers.
//! The identifier space shares its namespace with the reserved index key
//! region, so identifiers starting with that prefix are rejected up front.

use crate::error::{CoreError, CoreResult};
use crate::index::RESERVED_PREFIX;
use burrow_storage::StorageTx;

/// Fetches the payload stored under `id`.
pub(crate) fn get(tx: &dyn StorageTx, namespace: &str, id: &[u8]) -> CoreResult<Vec<u8>> {
    tx.get(namespace, id)?.ok_or(CoreError::NotFound)
}

/// Stores `payload` under `id`, replacing any previous payload.
///
/// An empty payload is stored as-is and remains distinct from absence.
pub(crate) fn set(
    tx: &mut dyn StorageTx,
    namespace: &str,
    id: &[u8],
    payload: &[u8],
) -> CoreResult<()> {
    check_id(id)?;
    tx.put(namespace, id, payload)?;
    Ok(())
}

/// Deletes the record stored under `id`.
///
/// Empty and reserved-region identifiers are never records, so they read
/// as absent here; the reserved key region stays reachable only through
/// the index operations.
pub(crate) fn delete(tx: &mut dyn StorageTx, namespace: &str, id: &[u8]) -> CoreResult<()> {
    if id.is_empty() || id.starts_with(RESERVED_PREFIX) {
        return Err(CoreError::NotFound);
    }
    if !tx.delete(namespace, id)? {
        return Err(CoreError::NotFound);
    }
    Ok(())
}

/// Fetches the payloads for `ids`, in order.
///
/// The result is all-or-nothing: any missing identifier fails the whole
/// call without returning partial output.
pub(crate) fn get_all(
    tx: &dyn StorageTx,
    namespace: &str,
    ids: &[Vec<u8>],
) -> CoreResult<Vec<Vec<u8>>> {
    let mut payloads = Vec::with_capacity(ids.len());
    for id in ids {
        payloads.push(get(tx, namespace, id)?);
    }
    Ok(payloads)
}

fn check_id(id: &[u8]) -> CoreResult<()> {
    if id.is_empty() {
        return Err(CoreError::invalid_key("record identifier is empty"));
    }
    if id.starts_with(RESERVED_PREFIX) {
        return Err(CoreError::invalid_key(
            "record identifier collides with the reserved index key region",
        ));
    }
    Ok(())
}
