//! Collections: id-unique, insertion-ordered sets of records.

use crate::error::{InsertionError, Result};
use crate::query::{execute_query, Query};
use crate::types::{Identifier, Record};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Weak;

/// Something that can flush the full store after a persisted insert.
pub trait PersistHook: Send + Sync {
    fn persist(&self) -> Result<()>;
}

/// Records plus an id -> position index.
#[derive(Default)]
struct CollectionData {
    records: Vec<Record>,
    positions: HashMap<Identifier, usize>,
}

/// A named set of records with unique identifiers.
///
/// Collections are handed out by [`Store::collection`](crate::Store::collection)
/// and hold only a weak handle back to their store, used by [`insert`](Self::insert)
/// to trigger persistence. A collection that outlives its store keeps working
/// in memory and simply stops persisting.
pub struct Collection {
    name: String,
    data: RwLock<CollectionData>,
    hook: Weak<dyn PersistHook>,
}

impl Collection {
    pub(crate) fn new(name: impl Into<String>, hook: Weak<dyn PersistHook>) -> Self {
        Self {
            name: name.into(),
            data: RwLock::new(CollectionData::default()),
            hook,
        }
    }

    /// Name of the collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert and persist the whole store.
    ///
    /// The record stays in memory even if persisting fails; the I/O error is
    /// returned to the caller.
    pub fn insert(&self, fields: Value, id: Option<Value>) -> Result<Identifier> {
        let id = self.insert_no_persist(fields, id)?;
        if let Some(hook) = self.hook.upgrade() {
            hook.persist()?;
        }
        Ok(id)
    }

    /// Insert into memory only.
    ///
    /// `fields` must be a JSON object. Without an `id` a random string
    /// identifier is generated. Returns the identifier of the new record.
    pub fn insert_no_persist(&self, fields: Value, id: Option<Value>) -> Result<Identifier> {
        let id = match id {
            Some(value) => Identifier::from_value(&value)?,
            None => Identifier::generate(),
        };
        let fields = match fields {
            Value::Object(map) => map,
            _ => return Err(InsertionError::NotAnObject.into()),
        };
        let record = Record::new(id.clone(), fields)?;
        self.insert_raw(record)?;
        Ok(id)
    }

    /// Insert an already-identified record without persisting.
    pub fn insert_raw(&self, record: Record) -> Result<()> {
        let mut data = self.data.write();
        if data.positions.contains_key(record.id()) {
            return Err(InsertionError::DuplicateId {
                collection: self.name.clone(),
                id: record.id().clone(),
            }
            .into());
        }
        let position = data.records.len();
        data.positions.insert(record.id().clone(), position);
        data.records.push(record);
        Ok(())
    }

    /// Get a record by identifier.
    pub fn get(&self, id: impl Into<Identifier>) -> Option<Record> {
        let id = id.into();
        let data = self.data.read();
        data.positions.get(&id).map(|&pos| data.records[pos].clone())
    }

    /// Get a record and decode it into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, id: impl Into<Identifier>) -> Result<Option<T>> {
        self.get(id).map(|record| record.deserialize()).transpose()
    }

    /// Check whether an identifier is present.
    pub fn contains(&self, id: impl Into<Identifier>) -> bool {
        self.data.read().positions.contains_key(&id.into())
    }

    /// Records matching `query`, in insertion order.
    ///
    /// The predicate runs over a snapshot, so it may read from or insert into
    /// this collection.
    pub fn query<Q: Query + ?Sized>(&self, query: &Q) -> Vec<Record> {
        execute_query(&self.all(), query)
    }

    /// Snapshot of all records in insertion order.
    pub fn all(&self) -> Vec<Record> {
        self.data.read().records.clone()
    }

    /// Number of records.
    pub fn count(&self) -> usize {
        self.data.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Visit every record under the read lock.
    pub(crate) fn for_each_record(&self, mut f: impl FnMut(&Record)) {
        for record in &self.data.read().records {
            f(record);
        }
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("count", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    struct CountingHook {
        calls: Mutex<usize>,
        fail: bool,
    }

    impl PersistHook for CountingHook {
        fn persist(&self) -> Result<()> {
            *self.calls.lock() += 1;
            if self.fail {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into());
            }
            Ok(())
        }
    }

    fn detached(name: &str) -> Collection {
        Collection::new(name, Weak::<CountingHook>::new())
    }

    fn with_hook(fail: bool) -> (Collection, Arc<CountingHook>) {
        let hook = Arc::new(CountingHook {
            calls: Mutex::new(0),
            fail,
        });
        let weak: Weak<dyn PersistHook> = Arc::downgrade(&(hook.clone() as Arc<dyn PersistHook>));
        (Collection::new("items", weak), hook)
    }

    #[test]
    fn test_insert_and_get() {
        let c = detached("users");
        let id = c.insert_no_persist(json!({"name": "a"}), Some(json!(1))).unwrap();
        assert_eq!(id, Identifier::Int(1));
        assert_eq!(c.count(), 1);
        assert_eq!(c.get(1).unwrap().to_value(), json!({"_id": 1, "name": "a"}));
        assert!(c.get("1").is_none());
    }

    #[test]
    fn test_generated_id() {
        let c = detached("users");
        let id = c.insert_no_persist(json!({"name": "a"}), None).unwrap();
        assert!(matches!(id, Identifier::Str(_)));
        assert!(c.contains(&id));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let c = detached("users");
        c.insert_no_persist(json!({"v": 1}), Some(json!("x"))).unwrap();
        let result = c.insert_no_persist(json!({"v": 2}), Some(json!("x")));

        assert!(matches!(
            result,
            Err(StoreError::Insertion(InsertionError::DuplicateId { .. }))
        ));
        assert_eq!(c.count(), 1);
        assert_eq!(c.get("x").unwrap().get("v"), Some(&json!(1)));
    }

    #[test]
    fn test_invalid_identifier_types() {
        let c = detached("users");
        for bad in [json!(true), json!({"a": 1}), json!([1, 2]), json!(2.5)] {
            let result = c.insert_no_persist(json!({}), Some(bad));
            assert!(matches!(
                result,
                Err(StoreError::Insertion(InsertionError::InvalidIdentifier(_)))
            ));
        }
        assert!(c.is_empty());
    }

    #[test]
    fn test_non_object_fields_rejected() {
        let c = detached("users");
        let result = c.insert_no_persist(json!([1, 2]), None);
        assert!(matches!(
            result,
            Err(StoreError::Insertion(InsertionError::NotAnObject))
        ));
    }

    #[test]
    fn test_insert_calls_hook_once() {
        let (c, hook) = with_hook(false);
        c.insert(json!({"a": 1}), None).unwrap();
        c.insert_no_persist(json!({"a": 2}), None).unwrap();
        assert_eq!(*hook.calls.lock(), 1);
    }

    #[test]
    fn test_failed_insert_skips_hook() {
        let (c, hook) = with_hook(false);
        c.insert(json!({}), Some(json!(1))).unwrap();
        assert!(c.insert(json!({}), Some(json!(1))).is_err());
        assert_eq!(*hook.calls.lock(), 1);
    }

    #[test]
    fn test_persist_failure_keeps_record_in_memory() {
        let (c, _hook) = with_hook(true);
        let result = c.insert(json!({"a": 1}), Some(json!(9)));
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert!(c.contains(9));
    }

    #[test]
    fn test_all_is_snapshot_in_insertion_order() {
        let c = detached("users");
        for i in [3, 1, 2] {
            c.insert_no_persist(json!({}), Some(json!(i))).unwrap();
        }
        let snapshot = c.all();
        c.insert_no_persist(json!({}), Some(json!(4))).unwrap();

        let ids: Vec<_> = snapshot.iter().map(|r| r.id().clone()).collect();
        assert_eq!(
            ids,
            vec![Identifier::Int(3), Identifier::Int(1), Identifier::Int(2)]
        );
        assert_eq!(c.count(), 4);
    }

    #[test]
    fn test_query_with_closure() {
        let c = detached("users");
        c.insert_no_persist(json!({"age": 10}), Some(json!(1))).unwrap();
        c.insert_no_persist(json!({"age": 40}), Some(json!(2))).unwrap();

        let hits = c.query(&|r: &Record| r.get("age").and_then(Value::as_i64) > Some(18));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id(), &Identifier::Int(2));
    }

    #[test]
    fn test_query_predicate_may_touch_collection() {
        let c = detached("users");
        c.insert_no_persist(json!({}), Some(json!(1))).unwrap();
        c.insert_no_persist(json!({}), Some(json!(2))).unwrap();

        let hits = c.query(&|r: &Record| {
            c.insert_no_persist(json!({"seen": r.id().to_value()}), None).unwrap();
            c.get(r.id()).is_some()
        });
        assert_eq!(hits.len(), 2);
        assert_eq!(c.count(), 4);
    }

    #[test]
    fn test_get_is_idempotent() {
        let c = detached("users");
        c.insert_no_persist(json!({"n": 1}), Some(json!("k"))).unwrap();
        assert_eq!(c.get("k"), c.get("k"));
        assert_eq!(c.count(), 1);
    }
}
