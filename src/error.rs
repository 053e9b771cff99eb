//! Error types for the document store.

use crate::types::Identifier;
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    /// A tagged record from a file or caller-supplied array is malformed.
    #[error("Invalid item at index {index}: {reason}")]
    InvalidItem { index: usize, reason: String },

    #[error("Insertion failed: {0}")]
    Insertion(#[from] InsertionError),

    #[error("Invalid collection name: {0:?}")]
    InvalidCollectionName(String),
}

/// An in-memory insertion violated the identifier rules of a collection.
///
/// The collection is unchanged when one of these is returned.
#[derive(Debug, Error, PartialEq)]
pub enum InsertionError {
    #[error("identifier must be a string or an integer, got {0}")]
    InvalidIdentifier(String),

    #[error("identifier must not be an empty string")]
    EmptyIdentifier,

    #[error("identifier {id} already exists in collection '{collection}'")]
    DuplicateId { collection: String, id: Identifier },

    #[error("record fields must be a JSON object")]
    NotAnObject,

    #[error("field '{0}' is reserved")]
    ReservedField(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
