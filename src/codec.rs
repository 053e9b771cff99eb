//! Conversion between collections and the flat tagged-record array.
//!
//! The interchange form of a store is a JSON array with one object per
//! record. Each object carries the record's fields plus two reserved keys:
//!
//! ```text
//! [{"_id": 1, "_collection": "users", "name": "a"}, ...]
//! ```
//!
//! Everything read from a file or handed in by a caller passes through
//! [`validate_tagged_record`] before any collection is built.

use crate::collection::Collection;
use crate::error::{Result, StoreError};
use crate::store::{Store, StoreConfig};
use crate::types::{json_kind, Identifier, Record, COLLECTION_KEY, ID_KEY};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Check that `value` is a well-formed tagged record.
///
/// `index` is the position of the item in its array and is reported in the
/// error.
pub fn validate_tagged_record(index: usize, value: &Value) -> Result<()> {
    let invalid = |reason: String| StoreError::InvalidItem { index, reason };

    let object = value
        .as_object()
        .ok_or_else(|| invalid(format!("expected an object, got {}", json_kind(value))))?;

    match object.get(ID_KEY) {
        None => return Err(invalid(format!("missing '{}'", ID_KEY))),
        Some(id) => {
            Identifier::from_value(id).map_err(|e| invalid(format!("'{}': {}", ID_KEY, e)))?;
        }
    }

    match object.get(COLLECTION_KEY) {
        None => Err(invalid(format!("missing '{}'", COLLECTION_KEY))),
        Some(Value::String(name)) if name.is_empty() => {
            Err(invalid(format!("'{}' must not be empty", COLLECTION_KEY)))
        }
        Some(Value::String(_)) => Ok(()),
        Some(other) => Err(invalid(format!(
            "'{}' must be a string, got {}",
            COLLECTION_KEY,
            json_kind(other)
        ))),
    }
}

/// Validate a tagged record and split it into its collection name and record.
pub fn untag_record(index: usize, value: Value) -> Result<(String, Record)> {
    validate_tagged_record(index, &value)?;

    let mut fields = match value {
        Value::Object(map) => map,
        _ => unreachable!("validated as object"),
    };
    let id = fields
        .remove(ID_KEY)
        .map(|v| Identifier::from_value(&v))
        .transpose()?
        .ok_or_else(|| StoreError::InvalidItem {
            index,
            reason: format!("missing '{}'", ID_KEY),
        })?;
    let collection = match fields.remove(COLLECTION_KEY) {
        Some(Value::String(name)) => name,
        _ => unreachable!("validated as string"),
    };

    Ok((collection, Record::new(id, fields)?))
}

/// Render one record in its tagged form.
pub fn tag_record(collection: &str, record: &Record) -> Value {
    let mut object = Map::with_capacity(record.fields().len() + 2);
    object.insert(ID_KEY.to_string(), record.id().to_value());
    object.insert(COLLECTION_KEY.to_string(), Value::String(collection.to_string()));
    object.extend(record.fields().iter().map(|(k, v)| (k.clone(), v.clone())));
    Value::Object(object)
}

/// Flatten collections into a tagged-record array, collections in the given
/// order and records in insertion order.
pub fn serialize_collections(collections: &[Arc<Collection>]) -> Value {
    let mut items = Vec::new();
    for collection in collections {
        collection.for_each_record(|record| items.push(tag_record(collection.name(), record)));
    }
    Value::Array(items)
}

/// Parse tagged-record JSON text.
pub fn parse_tagged_records(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| StoreError::Deserialization(e.to_string()))
}

/// Build a fresh store from a tagged-record array.
///
/// Every item is validated before anything is built, so a batch containing
/// one bad item is rejected as a whole. Collections are created in order of
/// first appearance. No persistence happens here, even if `config` has a path.
pub fn build_store_from_tagged_records(value: Value, config: StoreConfig) -> Result<Store> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(StoreError::InvalidFormat(format!(
                "expected a JSON array of tagged records, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut untagged = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        untagged.push(untag_record(index, item)?);
    }

    let store = Store::empty(config);
    for (name, record) in untagged {
        store.collection(&name)?.insert_raw(record)?;
    }
    Ok(store)
}
