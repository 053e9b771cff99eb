//! Core types for the document store.

use crate::error::{InsertionError, Result, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Reserved key carrying a record's identifier in the interchange form.
pub const ID_KEY: &str = "_id";

/// Reserved key carrying the owning collection's name in the interchange form.
pub const COLLECTION_KEY: &str = "_collection";

/// Unique identifier for a record within one collection.
///
/// Either a non-empty string or an integer. `Str("1")` and `Int(1)` are
/// different identifiers.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Identifier {
    Int(i64),
    Str(String),
}

impl Identifier {
    /// Generate a random identifier (UUID v4, 122 random bits).
    pub fn generate() -> Self {
        Identifier::Str(uuid::Uuid::new_v4().to_string())
    }

    /// Interpret a JSON value as an identifier.
    pub fn from_value(value: &Value) -> std::result::Result<Self, InsertionError> {
        match value {
            Value::String(s) if s.is_empty() => Err(InsertionError::EmptyIdentifier),
            Value::String(s) => Ok(Identifier::Str(s.clone())),
            Value::Number(n) => n
                .as_i64()
                .map(Identifier::Int)
                .ok_or_else(|| InsertionError::InvalidIdentifier(format!("number {}", n))),
            other => Err(InsertionError::InvalidIdentifier(
                json_kind(other).to_string(),
            )),
        }
    }

    /// Render as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Identifier::Int(i) => Value::from(*i),
            Identifier::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Int(i) => write!(f, "Identifier({})", i),
            Identifier::Str(s) => write!(f, "Identifier({:?})", s),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Int(i) => write!(f, "{}", i),
            Identifier::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Identifier::from_value(&value).map_err(serde::de::Error::custom)
    }
}

impl From<i64> for Identifier {
    fn from(i: i64) -> Self {
        Identifier::Int(i)
    }
}

impl From<i32> for Identifier {
    fn from(i: i32) -> Self {
        Identifier::Int(i64::from(i))
    }
}

impl From<u32> for Identifier {
    fn from(i: u32) -> Self {
        Identifier::Int(i64::from(i))
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier::Str(s.to_string())
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Identifier::Str(s)
    }
}

impl From<&Identifier> for Identifier {
    fn from(id: &Identifier) -> Self {
        id.clone()
    }
}

/// Short name of a JSON value's type, for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single record: an identifier plus schema-free fields.
///
/// Fields never contain the reserved keys [`ID_KEY`] or [`COLLECTION_KEY`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    #[serde(rename = "_id")]
    id: Identifier,

    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Record {
    /// Create a record, rejecting fields that reuse a reserved key.
    pub fn new(
        id: Identifier,
        fields: Map<String, Value>,
    ) -> std::result::Result<Self, InsertionError> {
        for key in [ID_KEY, COLLECTION_KEY] {
            if fields.contains_key(key) {
                return Err(InsertionError::ReservedField(key.to_string()));
            }
        }
        if let Identifier::Str(s) = &id {
            if s.is_empty() {
                return Err(InsertionError::EmptyIdentifier);
            }
        }
        Ok(Self { id, fields })
    }

    /// The record's identifier.
    pub fn id(&self) -> &Identifier {
        &self.id
    }

    /// The record's fields, without the identifier.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Look up a single field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Render as `{"_id": ..., ...fields}`.
    pub fn to_value(&self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        object.insert(ID_KEY.to_string(), self.id.to_value());
        object.extend(self.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        Value::Object(object)
    }

    /// Decode the record (including `_id`) into a typed value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_value())
            .map_err(|e| StoreError::Deserialization(e.to_string()))
    }

    pub(crate) fn into_parts(self) -> (Identifier, Map<String, Value>) {
        (self.id, self.fields)
    }
}

/// Store statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub collection_count: usize,
    pub record_count: usize,
}
