//! Secondary index structures.
//!
//! An index is a per-(namespace, field) structure mapping an encoded field
//! value to the record identifiers holding it. Two variants exist:
//!
//! - [`UniqueIndex`]: at most one identifier per value
//! - [`ListIndex`]: an ordered, duplicate-free identifier sequence per value
//!
//! Index entries and their kind markers live inside the same namespace as
//! the records, under reserved key prefixes, so an index can be reopened
//! without external schema (see [`directory`]).
//!
//! Index maintenance is the *caller's* responsibility: call
//! [`FieldIndex::remove_id`] before [`FieldIndex::add`] when a record's
//! field value changes, and on record deletion. Given correctly ordered
//! calls, the index guarantees the correctness of its own structure.

mod directory;
mod list;
mod unique;

pub use directory::{lookup_index, open_index};
pub use list::ListIndex;
pub use unique::UniqueIndex;

use crate::error::{CoreError, CoreResult};
use burrow_storage::{StorageError, StorageTx};
use std::fmt;

/// Prefix of index entry keys inside a namespace.
const ENTRY_PREFIX: &[u8] = b"__idx!";

/// Prefix of index metadata (kind marker) keys inside a namespace.
const META_PREFIX: &[u8] = b"__idxmeta!";

/// Shared prefix of the whole reserved index key region. User record
/// identifiers must not start with this.
pub(crate) const RESERVED_PREFIX: &[u8] = b"__idx";

/// Kind of a secondary index, persisted in its metadata marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IndexKind {
    /// One record identifier per value.
    Unique = 0,
    /// An ordered, duplicate-free identifier sequence per value.
    List = 1,
}

impl IndexKind {
    /// Returns the marker byte persisted for this kind.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for IndexKind {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(IndexKind::Unique),
            1 => Ok(IndexKind::List),
            _ => Err(CoreError::Storage(StorageError::Corrupted(format!(
                "unknown index kind marker: {value}"
            )))),
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Unique => write!(f, "unique"),
            IndexKind::List => write!(f, "list"),
        }
    }
}

/// Pagination options for index queries.
///
/// # Example
///
/// ```rust
/// use burrow_core::QueryOptions;
///
/// let opts = QueryOptions::new().skip(10).limit(5);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    limit: Option<usize>,
    skip: usize,
}

impl QueryOptions {
    /// Creates options with no limit and no offset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of returned identifiers.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `skip` identifiers.
    #[must_use]
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }
}

/// Applies pagination options to an identifier sequence.
fn paginate<I>(ids: I, opts: QueryOptions) -> Vec<Vec<u8>>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    ids.into_iter()
        .skip(opts.skip)
        .take(opts.limit.unwrap_or(usize::MAX))
        .collect()
}

/// Builds the metadata marker key for `field`.
fn meta_key(field: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(META_PREFIX.len() + field.len());
    key.extend_from_slice(META_PREFIX);
    key.extend_from_slice(field.as_bytes());
    key
}

/// Builds the entry key prefix shared by all of `field`'s entries.
///
/// The field name is length-prefixed so the entry regions of two fields
/// stay disjoint even when one field name is a prefix of the other.
///
/// # Errors
///
/// Fails with [`CoreError::InvalidKey`] if the field name does not fit
/// the u16 length prefix; truncating it would collapse distinct fields
/// into one entry region.
fn entry_prefix(field: &str) -> CoreResult<Vec<u8>> {
    let len = u16::try_from(field.len())
        .map_err(|_| CoreError::invalid_key("index field name exceeds u16 length"))?;
    let mut prefix = Vec::with_capacity(ENTRY_PREFIX.len() + 2 + field.len());
    prefix.extend_from_slice(ENTRY_PREFIX);
    prefix.extend_from_slice(&len.to_be_bytes());
    prefix.extend_from_slice(field.as_bytes());
    Ok(prefix)
}

/// Builds the entry key for `value` in `field`'s entry region.
fn entry_key(field: &str, value: &[u8]) -> CoreResult<Vec<u8>> {
    let mut key = entry_prefix(field)?;
    key.extend_from_slice(value);
    Ok(key)
}

/// Scans `field`'s entry region, returning `(entry key, payload)` pairs in
/// ascending value order, bounded to `[min, max]` on the encoded value when
/// bounds are given. The cursor seeks directly to the lower bound and stops
/// at the upper one; entries outside the bound are never visited.
fn scan_entries(
    tx: &dyn StorageTx,
    namespace: &str,
    field: &str,
    min: Option<&[u8]>,
    max: Option<&[u8]>,
) -> CoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
    let prefix = entry_prefix(field)?;

    let mut start = prefix.clone();
    if let Some(min) = min {
        start.extend_from_slice(min);
    }

    let mut cursor = tx.cursor(namespace)?;
    cursor.seek(&start);

    let mut entries = Vec::new();
    while let Some((key, payload)) = cursor.next() {
        if !key.starts_with(&prefix) {
            break;
        }
        if let Some(max) = max {
            if &key[prefix.len()..] > max {
                break;
            }
        }
        entries.push((key, payload));
    }
    Ok(entries)
}

/// Encodes an ordered identifier sequence as a list-entry payload.
///
/// Layout: u32-BE count, then u32-BE length + bytes per identifier.
fn encode_ids(ids: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + ids.iter().map(|id| 4 + id.len()).sum::<usize>());
    bytes.extend_from_slice(&(ids.len() as u32).to_be_bytes());
    for id in ids {
        bytes.extend_from_slice(&(id.len() as u32).to_be_bytes());
        bytes.extend_from_slice(id);
    }
    bytes
}

/// Decodes a list-entry payload back into its identifier sequence.
fn decode_ids(bytes: &[u8]) -> CoreResult<Vec<Vec<u8>>> {
    let corrupted = || {
        CoreError::Storage(StorageError::Corrupted(
            "malformed list index entry".into(),
        ))
    };

    fn take<'b>(rest: &mut &'b [u8], n: usize) -> Option<&'b [u8]> {
        if rest.len() < n {
            return None;
        }
        let (head, tail) = rest.split_at(n);
        *rest = tail;
        Some(head)
    }
    fn take_u32(rest: &mut &[u8]) -> Option<usize> {
        let bytes = take(rest, 4)?;
        let bytes: [u8; 4] = bytes.try_into().ok()?;
        Some(u32::from_be_bytes(bytes) as usize)
    }

    let mut rest = bytes;
    let count = take_u32(&mut rest).ok_or_else(corrupted)?;
    let mut ids = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let len = take_u32(&mut rest).ok_or_else(corrupted)?;
        ids.push(take(&mut rest, len).ok_or_else(corrupted)?.to_vec());
    }
    if !rest.is_empty() {
        return Err(corrupted());
    }
    Ok(ids)
}

/// A resolved index on one (namespace, field) pair, dispatching to the
/// unique or list implementation.
///
/// Obtained from [`open_index`] or [`lookup_index`]. All operations run
/// against the caller's storage transaction; identifiers and values are
/// order-preserving encoded key bytes (see [`crate::Key`]).
#[derive(Debug, Clone)]
pub enum FieldIndex {
    /// A unique index.
    Unique(UniqueIndex),
    /// A list index.
    List(ListIndex),
}

impl FieldIndex {
    pub(crate) fn new(namespace: &str, field: &str, kind: IndexKind) -> Self {
        match kind {
            IndexKind::Unique => FieldIndex::Unique(UniqueIndex::new(namespace, field)),
            IndexKind::List => FieldIndex::List(ListIndex::new(namespace, field)),
        }
    }

    /// Returns this index's kind.
    #[must_use]
    pub fn kind(&self) -> IndexKind {
        match self {
            FieldIndex::Unique(_) => IndexKind::Unique,
            FieldIndex::List(_) => IndexKind::List,
        }
    }

    /// Maps `value` to `id`.
    ///
    /// Unique: fails with [`CoreError::AlreadyExists`] if `value` already
    /// maps to a different identifier; re-adding the same pair is a no-op.
    /// List: appends `id` to `value`'s sequence if not already present,
    /// preserving insertion order.
    ///
    /// # Errors
    ///
    /// See above, plus storage errors.
    pub fn add(&self, tx: &mut dyn StorageTx, value: &[u8], id: &[u8]) -> CoreResult<()> {
        match self {
            FieldIndex::Unique(index) => index.add(tx, value, id),
            FieldIndex::List(index) => index.add(tx, value, id),
        }
    }

    /// Deletes the entire entry for `value`.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NotFound`] if no entry exists.
    pub fn remove(&self, tx: &mut dyn StorageTx, value: &[u8]) -> CoreResult<()> {
        match self {
            FieldIndex::Unique(index) => index.remove(tx, value),
            FieldIndex::List(index) => index.remove(tx, value),
        }
    }

    /// Removes `id` from whatever value entry currently references it.
    ///
    /// A record holds one value per field at a time, so at most one entry
    /// is touched. Not finding `id` anywhere is a no-op, not an error, so
    /// callers may invoke this defensively on records that were never
    /// indexed.
    ///
    /// # Errors
    ///
    /// Returns storage errors only.
    pub fn remove_id(&self, tx: &mut dyn StorageTx, id: &[u8]) -> CoreResult<()> {
        match self {
            FieldIndex::Unique(index) => index.remove_id(tx, id),
            FieldIndex::List(index) => index.remove_id(tx, id),
        }
    }

    /// Returns the single identifier mapped to `value` (unique only).
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NotFound`] if no entry exists, and with
    /// [`CoreError::IndexKindMismatch`] on a list index.
    pub fn get(&self, tx: &dyn StorageTx, value: &[u8]) -> CoreResult<Vec<u8>> {
        match self {
            FieldIndex::Unique(index) => index.get(tx, value),
            FieldIndex::List(index) => Err(CoreError::IndexKindMismatch {
                field: index.field().to_string(),
                stored: IndexKind::List,
                requested: IndexKind::Unique,
            }),
        }
    }

    /// Returns the identifiers mapped to `value`, in insertion order.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NotFound`] if no entry exists for `value`.
    pub fn all(
        &self,
        tx: &dyn StorageTx,
        value: &[u8],
        opts: QueryOptions,
    ) -> CoreResult<Vec<Vec<u8>>> {
        match self {
            FieldIndex::Unique(index) => index.all(tx, value, opts),
            FieldIndex::List(index) => index.all(tx, value, opts),
        }
    }

    /// Returns every indexed identifier, ordered by encoded value key and
    /// by insertion order within equal values.
    ///
    /// # Errors
    ///
    /// Returns storage errors only.
    pub fn all_records(&self, tx: &dyn StorageTx, opts: QueryOptions) -> CoreResult<Vec<Vec<u8>>> {
        match self {
            FieldIndex::Unique(index) => index.all_records(tx, opts),
            FieldIndex::List(index) => index.all_records(tx, opts),
        }
    }

    /// Returns the identifiers of every entry whose encoded value falls in
    /// `[min, max]` inclusive, concatenated in value-key order.
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
        match self {
            FieldIndex::Unique(index) => index.range(tx, min, max, opts),
            FieldIndex::List(index) => index.range(tx, min, max, opts),
        }
    }
}
