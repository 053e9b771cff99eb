//! # Document Store
//!
//! An embeddable store of named collections, each holding schema-free JSON
//! records with unique identifiers, optionally backed by a single JSON file.
//!
//! ## Core Concepts
//!
//! - **Records**: A field map plus an [`Identifier`] (string or integer)
//! - **Collections**: Id-unique, insertion-ordered sets of records
//! - **Store**: A registry of collections and the optional backing file
//! - **Tagged records**: The on-disk form, `{"_id": .., "_collection": .., ...}`
//!
//! ## Example
//!
//! ```ignore
//! use docstore::{Store, StoreConfig};
//! use serde_json::json;
//!
//! let store = Store::open(StoreConfig::at("./data/store.json"))?;
//! let users = store.collection("users")?;
//!
//! // Persisted insert: rewrites ./data/store.json
//! let id = users.insert(json!({"name": "Ada"}), None)?;
//!
//! // In-memory only
//! users.insert_no_persist(json!({"name": "Grace"}), Some(json!(2)))?;
//! store.persist()?;
//!
//! assert!(users.get(id).is_some());
//! ```

pub mod codec;
pub mod collection;
pub mod error;
pub mod query;
pub mod store;
pub mod types;

// Re-exports
pub use codec::{build_store_from_tagged_records, validate_tagged_record};
pub use collection::{Collection, PersistHook};
pub use error::{InsertionError, Result, StoreError};
pub use query::{execute_query, Condition, Filter, Op, Query};
pub use store::{Store, StoreConfig};
pub use types::*;
