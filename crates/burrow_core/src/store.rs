//! Typed record store and its transactional sessions.
//!
//! [`Store`] pairs a storage engine with a codec. All work happens inside a
//! [`Session`], which wraps one storage transaction: either an explicit one
//! obtained from [`Store::begin`] / [`Store::in_transaction`], or an
//! implicit per-call one opened by the convenience methods on [`Store`]
//! itself.

use crate::error::CoreResult;
use crate::index::{lookup_index, open_index, FieldIndex, IndexKind, QueryOptions};
use crate::key::Key;
use crate::record;
use burrow_codec::Codec;
use burrow_storage::{StorageEngine, StorageTx};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record identifier: opaque bytes, usually produced by [`Key::encode`].
pub type RecordId = Vec<u8>;

/// A typed record store over a storage engine and a codec.
#[derive(Debug)]
pub struct Store<E, C> {
    engine: E,
    codec: C,
}

impl<E: StorageEngine, C: Codec> Store<E, C> {
    /// Creates a store over `engine`, serializing records with `codec`.
    pub fn new(engine: E, codec: C) -> Self {
        Self { engine, codec }
    }

    /// Starts an explicit session. Writable sessions must be committed;
    /// dropping one discards its writes.
    ///
    /// At most one writable session is live at a time. Beginning a second
    /// writable session on the thread already holding one fails with
    /// [`crate::CoreError::NestedTransaction`] instead of deadlocking.
    ///
    /// # Errors
    ///
    /// Fails with storage errors, including the nested-transaction guard.
    pub fn begin(&self, writable: bool) -> CoreResult<Session<'_, C>> {
        let tx = self.engine.begin(writable)?;
        Ok(Session {
            tx,
            codec: &self.codec,
        })
    }

    /// Runs `f` inside one writable session, committing on `Ok` and
    /// rolling back on `Err`.
    ///
    /// # Errors
    ///
    /// Propagates `f`'s error, or the commit failure.
    pub fn in_transaction<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Session<'_, C>) -> CoreResult<T>,
    {
        let mut session = self.begin(true)?;
        match f(&mut session) {
            Ok(value) => {
                session.commit()?;
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(error = %err, "rolling back transaction");
                // Keep the caller's error even if rollback also fails.
                let _ = session.rollback();
                Err(err)
            }
        }
    }

    /// Fetches and decodes the record stored under `id` in one read-only
    /// session.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::NotFound`] if absent.
    pub fn get<T: DeserializeOwned>(&self, namespace: &str, id: &[u8]) -> CoreResult<T> {
        self.begin(false)?.get(namespace, id)
    }

    /// Encodes and stores `value` under `id` in its own transaction.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::InvalidKey`] for empty or reserved
    /// identifiers.
    pub fn set<T: Serialize>(&self, namespace: &str, id: &[u8], value: &T) -> CoreResult<()> {
        self.in_transaction(|session| session.set(namespace, id, value))
    }

    /// Stores a raw payload under `id` in its own transaction.
    ///
    /// # Errors
    ///
    /// Same contract as [`Store::set`].
    pub fn set_raw(&self, namespace: &str, id: &[u8], payload: &[u8]) -> CoreResult<()> {
        self.in_transaction(|session| session.set_raw(namespace, id, payload))
    }

    /// Deletes the record stored under `id` in its own transaction.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::NotFound`] if absent.
    pub fn delete(&self, namespace: &str, id: &[u8]) -> CoreResult<()> {
        self.in_transaction(|session| session.delete(namespace, id))
    }

    /// Fetches and decodes the records for `ids`, all-or-nothing, in one
    /// read-only session.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::NotFound`] if any identifier is
    /// absent; no partial result is returned.
    pub fn get_all<T: DeserializeOwned>(
        &self,
        namespace: &str,
        ids: &[RecordId],
    ) -> CoreResult<Vec<T>> {
        self.begin(false)?.get_all(namespace, ids)
    }

    /// Opens (creating on first use) the index on `(namespace, field)` in
    /// its own transaction.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::IndexKindMismatch`] if the field is
    /// already indexed with a different kind.
    pub fn create_index(&self, namespace: &str, field: &str, kind: IndexKind) -> CoreResult<()> {
        self.in_transaction(|session| session.create_index(namespace, field, kind).map(|_| ()))
    }

    /// Returns the identifiers mapped to `value` on `field`, in insertion
    /// order, in one read-only session.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::NotFound`] if the field was never
    /// indexed or no entry exists for `value`.
    pub fn index(
        &self,
        namespace: &str,
        field: &str,
        value: &Key,
        opts: QueryOptions,
    ) -> CoreResult<Vec<RecordId>> {
        self.begin(false)?.index_all(namespace, field, value, opts)
    }
}

/// One transactional view over the store.
///
/// Reads observe a snapshot taken at session start plus this session's own
/// writes. Writes become visible to other sessions only after
/// [`Session::commit`].
pub struct Session<'s, C> {
    tx: Box<dyn StorageTx + 's>,
    codec: &'s C,
}

impl<'s, C: Codec> Session<'s, C> {
    /// Fetches and decodes the record stored under `id`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::NotFound`] if absent, or with a
    /// codec error if the payload does not decode as `T`.
    pub fn get<T: DeserializeOwned>(&self, namespace: &str, id: &[u8]) -> CoreResult<T> {
        let payload = record::get(&*self.tx, namespace, id)?;
        Ok(self.codec.decode(&payload)?)
    }

    /// Fetches the raw payload stored under `id`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::NotFound`] if absent.
    pub fn get_raw(&self, namespace: &str, id: &[u8]) -> CoreResult<Vec<u8>> {
        record::get(&*self.tx, namespace, id)
    }

    /// Encodes and stores `value` under `id`, replacing any previous
    /// record.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::InvalidKey`] for empty or reserved
    /// identifiers.
    pub fn set<T: Serialize>(&mut self, namespace: &str, id: &[u8], value: &T) -> CoreResult<()> {
        let payload = self.codec.encode(value)?;
        record::set(&mut *self.tx, namespace, id, &payload)
    }

    /// Stores a raw payload under `id`. An empty payload stays distinct
    /// from absence.
    ///
    /// # Errors
    ///
    /// Same contract as [`Session::set`].
    pub fn set_raw(&mut self, namespace: &str, id: &[u8], payload: &[u8]) -> CoreResult<()> {
        record::set(&mut *self.tx, namespace, id, payload)
    }

    /// Deletes the record stored under `id`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::NotFound`] if absent.
    pub fn delete(&mut self, namespace: &str, id: &[u8]) -> CoreResult<()> {
        record::delete(&mut *self.tx, namespace, id)
    }

    /// Fetches and decodes the records for `ids`, in order, all-or-nothing.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::NotFound`] if any identifier is
    /// absent; no partial result is returned.
    pub fn get_all<T: DeserializeOwned>(
        &self,
        namespace: &str,
        ids: &[RecordId],
    ) -> CoreResult<Vec<T>> {
        let payloads = record::get_all(&*self.tx, namespace, ids)?;
        let mut records = Vec::with_capacity(payloads.len());
        for payload in &payloads {
            records.push(self.codec.decode(payload)?);
        }
        Ok(records)
    }

    /// Opens (creating on first use) the index on `(namespace, field)`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::IndexKindMismatch`] if the field is
    /// already indexed with a different kind.
    pub fn create_index(
        &mut self,
        namespace: &str,
        field: &str,
        kind: IndexKind,
    ) -> CoreResult<FieldIndex> {
        open_index(&mut *self.tx, namespace, field, kind)
    }

    /// Resolves the existing index on `(namespace, field)`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::NotFound`] if the field was never
    /// indexed.
    pub fn index(&self, namespace: &str, field: &str) -> CoreResult<FieldIndex> {
        lookup_index(&*self.tx, namespace, field)
    }

    /// Maps `value` to `id` in the index on `field`.
    ///
    /// # Errors
    ///
    /// Unique indexes fail with [`crate::CoreError::AlreadyExists`] when
    /// `value` already maps to a different identifier.
    pub fn index_add(&mut self, namespace: &str, field: &str, value: &Key, id: &[u8]) -> CoreResult<()> {
        let index = lookup_index(&*self.tx, namespace, field)?;
        index.add(&mut *self.tx, &value.encode()?, id)
    }

    /// Deletes the whole index entry for `value` on `field`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::NotFound`] if no entry exists.
    pub fn index_remove(&mut self, namespace: &str, field: &str, value: &Key) -> CoreResult<()> {
        let index = lookup_index(&*self.tx, namespace, field)?;
        index.remove(&mut *self.tx, &value.encode()?)
    }

    /// Removes `id` from `field`'s index, whatever value references it.
    /// Absence is a no-op.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::NotFound`] only if `field` itself is
    /// not indexed.
    pub fn index_remove_id(&mut self, namespace: &str, field: &str, id: &[u8]) -> CoreResult<()> {
        let index = lookup_index(&*self.tx, namespace, field)?;
        index.remove_id(&mut *self.tx, id)
    }

    /// Returns the single identifier mapped to `value` on a unique index.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::NotFound`] if no entry exists, and
    /// with [`crate::CoreError::IndexKindMismatch`] on a list index.
    pub fn index_get(&self, namespace: &str, field: &str, value: &Key) -> CoreResult<RecordId> {
        let index = lookup_index(&*self.tx, namespace, field)?;
        index.get(&*self.tx, &value.encode()?)
    }

    /// Returns the identifiers mapped to `value` on `field`, in insertion
    /// order.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::NotFound`] if no entry exists.
    pub fn index_all(
        &self,
        namespace: &str,
        field: &str,
        value: &Key,
        opts: QueryOptions,
    ) -> CoreResult<Vec<RecordId>> {
        let index = lookup_index(&*self.tx, namespace, field)?;
        index.all(&*self.tx, &value.encode()?, opts)
    }

    /// Returns every identifier indexed on `field`, ordered by encoded
    /// value and by insertion order within equal values.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::NotFound`] if `field` is not indexed.
    pub fn index_all_records(
        &self,
        namespace: &str,
        field: &str,
        opts: QueryOptions,
    ) -> CoreResult<Vec<RecordId>> {
        let index = lookup_index(&*self.tx, namespace, field)?;
        index.all_records(&*self.tx, opts)
    }

    /// Returns identifiers whose indexed value falls in `[min, max]`
    /// inclusive, ordered by encoded value.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CoreError::NotFound`] if `field` is not
    /// indexed, and with [`crate::CoreError::UnsupportedKeyType`] if a
    /// bound cannot be encoded.
    pub fn index_range(
        &self,
        namespace: &str,
        field: &str,
        min: &Key,
        max: &Key,
        opts: QueryOptions,
    ) -> CoreResult<Vec<RecordId>> {
        let index = lookup_index(&*self.tx, namespace, field)?;
        index.range(&*self.tx, &min.encode()?, &max.encode()?, opts)
    }

    /// Commits this session's writes.
    ///
    /// # Errors
    ///
    /// Fails with storage errors; the transaction is consumed either way.
    pub fn commit(self) -> CoreResult<()> {
        self.tx.commit()?;
        Ok(())
    }

    /// Discards this session's writes.
    ///
    /// # Errors
    ///
    /// Fails with storage errors.
    pub fn rollback(self) -> CoreResult<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use burrow_codec::CborCodec;
    use burrow_storage::MemoryEngine;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct User {
        name: String,
        group: String,
    }

    fn store() -> Store<MemoryEngine, CborCodec> {
        Store::new(MemoryEngine::new(), CborCodec::new())
    }

    fn user(name: &str, group: &str) -> User {
        User {
            name: name.to_string(),
            group: group.to_string(),
        }
    }

    #[test]
    fn set_then_get_roundtrip() {
        let store = store();
        let john = user("john", "staff");
        store.set("users", b"100", &john).unwrap();
        assert_eq!(store.get::<User>("users", b"100").unwrap(), john);
    }

    #[test]
    fn delete_twice_is_not_found() {
        let store = store();
        store.set("users", b"100", &user("john", "staff")).unwrap();
        store.delete("users", b"100").unwrap();
        assert!(matches!(
            store.delete("users", b"100"),
            Err(CoreError::NotFound)
        ));
    }

    #[test]
    fn get_all_preserves_order_and_fails_atomically() {
        let store = store();
        store.set("users", b"102", &user("jane", "admin")).unwrap();
        store.set("users", b"100", &user("john", "staff")).unwrap();

        let users: Vec<User> = store
            .get_all("users", &[b"100".to_vec(), b"102".to_vec()])
            .unwrap();
        assert_eq!(users, vec![user("john", "staff"), user("jane", "admin")]);

        let missing = store.get_all::<User>("users", &[b"100".to_vec(), b"101".to_vec()]);
        assert!(matches!(missing, Err(CoreError::NotFound)));
    }

    #[test]
    fn explicit_session_commit_publishes_writes() {
        let store = store();
        let mut session = store.begin(true).unwrap();
        session.set("users", b"100", &user("john", "staff")).unwrap();
        session.commit().unwrap();

        assert_eq!(
            store.get::<User>("users", b"100").unwrap(),
            user("john", "staff")
        );
    }

    #[test]
    fn explicit_session_rollback_discards_writes() {
        let store = store();
        let mut session = store.begin(true).unwrap();
        session.set("users", b"100", &user("john", "staff")).unwrap();
        session.rollback().unwrap();

        assert!(matches!(
            store.get::<User>("users", b"100"),
            Err(CoreError::NotFound)
        ));
    }

    #[test]
    fn in_transaction_rolls_back_on_error() {
        let store = store();
        let result: CoreResult<()> = store.in_transaction(|session| {
            session.set("users", b"100", &user("john", "staff"))?;
            session.delete("users", b"999")?; // absent: fails the closure
            Ok(())
        });
        assert!(matches!(result, Err(CoreError::NotFound)));
        assert!(matches!(
            store.get::<User>("users", b"100"),
            Err(CoreError::NotFound)
        ));
    }

    #[test]
    fn rollback_reverts_records_and_index_entries_together() {
        let store = store();
        store.create_index("users", "username", IndexKind::Unique).unwrap();
        store
            .in_transaction(|session| {
                session.index_add("users", "username", &Key::from("john"), b"100")
            })
            .unwrap();

        // The collision aborts the whole sequence, including the set.
        let result: CoreResult<()> = store.in_transaction(|session| {
            session.set("users", b"101", &user("john", "staff"))?;
            session.index_add("users", "username", &Key::from("john"), b"101")
        });
        assert!(matches!(result, Err(CoreError::AlreadyExists { .. })));

        assert!(matches!(
            store.get::<User>("users", b"101"),
            Err(CoreError::NotFound)
        ));
        let session = store.begin(false).unwrap();
        assert_eq!(
            session.index_get("users", "username", &Key::from("john")).unwrap(),
            b"100".to_vec()
        );
    }

    #[test]
    fn nested_writable_session_fails_fast() {
        let store = store();
        let result: CoreResult<()> = store.in_transaction(|_| {
            let nested = store.begin(true);
            assert!(matches!(nested, Err(CoreError::NestedTransaction)));
            Ok(())
        });
        result.unwrap();
    }

    #[test]
    fn unique_index_enforces_one_id_per_value() {
        let store = store();
        store.create_index("users", "username", IndexKind::Unique).unwrap();

        store
            .in_transaction(|session| {
                session.index_add("users", "username", &Key::from("john"), b"100")?;
                let clash = session.index_add("users", "username", &Key::from("john"), b"101");
                assert!(matches!(clash, Err(CoreError::AlreadyExists { .. })));
                // Same pair again is a no-op.
                session.index_add("users", "username", &Key::from("john"), b"100")
            })
            .unwrap();

        let session = store.begin(false).unwrap();
        assert_eq!(
            session.index_get("users", "username", &Key::from("john")).unwrap(),
            b"100".to_vec()
        );
    }

    #[test]
    fn remove_id_then_readd_under_new_value() {
        let store = store();
        store.create_index("users", "username", IndexKind::Unique).unwrap();

        store
            .in_transaction(|session| {
                session.index_add("users", "username", &Key::from("john"), b"100")?;
                session.index_remove_id("users", "username", b"100")?;
                session.index_add("users", "username", &Key::from("johnny"), b"100")
            })
            .unwrap();

        let session = store.begin(false).unwrap();
        assert!(matches!(
            session.index_get("users", "username", &Key::from("john")),
            Err(CoreError::NotFound)
        ));
        assert_eq!(
            session
                .index_get("users", "username", &Key::from("johnny"))
                .unwrap(),
            b"100".to_vec()
        );
    }

    #[test]
    fn get_on_list_index_is_a_kind_mismatch() {
        let store = store();
        store.create_index("users", "group", IndexKind::List).unwrap();
        let session = store.begin(false).unwrap();
        let result = session.index_get("users", "group", &Key::from("staff"));
        assert!(matches!(
            result,
            Err(CoreError::IndexKindMismatch {
                stored: IndexKind::List,
                requested: IndexKind::Unique,
                ..
            })
        ));
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let store = store();
        store.create_index("users", "name", IndexKind::Unique).unwrap();

        store
            .in_transaction(|session| {
                session.index_add("users", "name", &Key::from("w"), b"1")?;
                session.index_add("users", "name", &Key::from("x"), b"2")?;
                session.index_add("users", "name", &Key::from("y"), b"3")?;
                session.index_add("users", "name", &Key::from("z"), b"4")
            })
            .unwrap();

        let session = store.begin(false).unwrap();
        let ids = session
            .index_range(
                "users",
                "name",
                &Key::from("w"),
                &Key::from("y"),
                QueryOptions::new(),
            )
            .unwrap();
        assert_eq!(ids, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
    }

    #[test]
    fn numeric_range_follows_numeric_order() {
        let store = store();
        store.create_index("events", "seq", IndexKind::Unique).unwrap();

        store
            .in_transaction(|session| {
                for seq in [-5i64, -1, 0, 2, 10, 100] {
                    session.index_add(
                        "events",
                        "seq",
                        &Key::from(seq),
                        seq.to_string().as_bytes(),
                    )?;
                }
                Ok(())
            })
            .unwrap();

        let session = store.begin(false).unwrap();
        let ids = session
            .index_range(
                "events",
                "seq",
                &Key::from(-1i64),
                &Key::from(10i64),
                QueryOptions::new(),
            )
            .unwrap();
        assert_eq!(
            ids,
            vec![b"-1".to_vec(), b"0".to_vec(), b"2".to_vec(), b"10".to_vec()]
        );
    }

    #[test]
    fn users_and_groups_scenario() {
        let store = store();
        store.create_index("users", "group", IndexKind::List).unwrap();
        store.create_index("users", "username", IndexKind::Unique).unwrap();

        store
            .in_transaction(|session| {
                for (id, name, username, group) in [
                    (&b"100"[..], "john", "john", "staff"),
                    (b"101", "jack", "jack", "staff"),
                    (b"102", "jane", "jane", "admin"),
                ] {
                    session.set("users", id, &user(name, group))?;
                    session.index_add("users", "group", &Key::from(group), id)?;
                    session.index_add("users", "username", &Key::from(username), id)?;
                }
                Ok(())
            })
            .unwrap();

        let session = store.begin(false).unwrap();

        let staff = session
            .index_all("users", "group", &Key::from("staff"), QueryOptions::new())
            .unwrap();
        assert_eq!(staff, vec![b"100".to_vec(), b"101".to_vec()]);

        let jack = session
            .index_get("users", "username", &Key::from("jack"))
            .unwrap();
        assert_eq!(jack, b"101".to_vec());
        let jack: User = session.get("users", &jack).unwrap();
        assert_eq!(jack, user("jack", "staff"));

        let everyone = session
            .index_all_records("users", "group", QueryOptions::new())
            .unwrap();
        assert_eq!(
            everyone,
            vec![b"102".to_vec(), b"100".to_vec(), b"101".to_vec()]
        );
    }

    #[test]
    fn index_maintenance_on_record_update() {
        let store = store();
        store.create_index("users", "group", IndexKind::List).unwrap();

        store
            .in_transaction(|session| {
                session.set("users", b"100", &user("john", "staff"))?;
                session.index_add("users", "group", &Key::from("staff"), b"100")
            })
            .unwrap();

        // Move john to admin: remove by identifier, then re-add.
        store
            .in_transaction(|session| {
                session.set("users", b"100", &user("john", "admin"))?;
                session.index_remove_id("users", "group", b"100")?;
                session.index_add("users", "group", &Key::from("admin"), b"100")
            })
            .unwrap();

        let session = store.begin(false).unwrap();
        assert!(matches!(
            session.index_all("users", "group", &Key::from("staff"), QueryOptions::new()),
            Err(CoreError::NotFound)
        ));
        assert_eq!(
            session
                .index_all("users", "group", &Key::from("admin"), QueryOptions::new())
                .unwrap(),
            vec![b"100".to_vec()]
        );
    }

    #[test]
    fn index_pagination() {
        let store = store();
        store.create_index("users", "group", IndexKind::List).unwrap();

        store
            .in_transaction(|session| {
                for id in [&b"1"[..], b"2", b"3", b"4", b"5"] {
                    session.index_add("users", "group", &Key::from("staff"), id)?;
                }
                Ok(())
            })
            .unwrap();

        let session = store.begin(false).unwrap();
        let page = session
            .index_all(
                "users",
                "group",
                &Key::from("staff"),
                QueryOptions::new().skip(1).limit(2),
            )
            .unwrap();
        assert_eq!(page, vec![b"2".to_vec(), b"3".to_vec()]);
    }

    #[test]
    fn store_index_reads_without_an_explicit_session() {
        let store = store();
        store.create_index("users", "group", IndexKind::List).unwrap();
        store
            .in_transaction(|session| {
                session.index_add("users", "group", &Key::from("staff"), b"100")?;
                session.index_add("users", "group", &Key::from("staff"), b"101")
            })
            .unwrap();

        let staff = store
            .index("users", "group", &Key::from("staff"), QueryOptions::new())
            .unwrap();
        assert_eq!(staff, vec![b"100".to_vec(), b"101".to_vec()]);

        assert!(matches!(
            store.index("users", "group", &Key::from("ghost"), QueryOptions::new()),
            Err(CoreError::NotFound)
        ));
        assert!(matches!(
            store.index("users", "nope", &Key::from("staff"), QueryOptions::new()),
            Err(CoreError::NotFound)
        ));
    }

    #[test]
    fn unindexed_field_is_not_found() {
        let store = store();
        let session = store.begin(false).unwrap();
        assert!(matches!(
            session.index("users", "nope"),
            Err(CoreError::NotFound)
        ));
    }
}
