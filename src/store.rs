//! Main Store struct tying collections and persistence together.

use crate::codec;
use crate::collection::{Collection, PersistHook};
use crate::error::{Result, StoreError};
use crate::types::StoreStats;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Store configuration.
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    /// JSON file backing the store. `None` keeps the store in memory only.
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Configuration for a store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self { path: None }
    }

    /// Configuration for a store backed by `path`. An empty path means
    /// in-memory only.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.as_os_str().is_empty() {
            Self::in_memory()
        } else {
            Self { path: Some(path) }
        }
    }
}

/// Collections in registration order, plus a name index.
#[derive(Default)]
struct Registry {
    order: Vec<Arc<Collection>>,
    by_name: HashMap<String, usize>,
}

struct StoreInner {
    config: StoreConfig,
    registry: RwLock<Registry>,

    /// Serialises file writes.
    write_lock: Mutex<()>,
}

impl StoreInner {
    fn serialize(&self) -> Result<String> {
        let registry = self.registry.read();
        let value = codec::serialize_collections(&registry.order);
        Ok(serde_json::to_string(&value)?)
    }
}

impl PersistHook for StoreInner {
    fn persist(&self) -> Result<()> {
        let Some(path) = self.config.path.as_deref() else {
            return Ok(());
        };

        let _lock = self.write_lock.lock();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir(parent)?;
            }
        }

        let text = self.serialize()?;

        // Write to a sibling temp file, then rename over the target.
        let tmp_path = temp_path_for(path);
        fs::write(&tmp_path, text.as_bytes())?;
        fs::rename(&tmp_path, path)?;

        debug!("Persisted store to {:?} ({} bytes)", path, text.len());
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn read_tagged_records(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)?;
    codec::parse_tagged_records(&text)
}

/// A registry of named collections with an optional backing file.
///
/// Collections are created on first reference and live as long as the store.
/// Inserting through [`Collection::insert`] rewrites the whole backing file;
/// [`Collection::insert_no_persist`] only touches memory.
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Open a store, loading the backing file if there is one.
    ///
    /// Loading is skipped when no path is configured, when the file's parent
    /// directory does not exist, or when the file itself does not exist. A
    /// file that is present but malformed fails the whole open.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let Some(path) = config.path.clone() else {
            return Ok(Self::empty(config));
        };

        let parent_exists = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.is_dir(),
            _ => true,
        };
        if !parent_exists {
            debug!("Parent directory of {:?} does not exist, starting empty", path);
            return Ok(Self::empty(config));
        }
        if !path.exists() {
            debug!("Store file {:?} does not exist, starting empty", path);
            return Ok(Self::empty(config));
        }

        let store = codec::build_store_from_tagged_records(read_tagged_records(&path)?, config)?;
        info!(
            "Loaded store from {:?} ({} collections, {} records)",
            path,
            store.collection_names().len(),
            store.stats().record_count
        );
        Ok(store)
    }

    /// Open a store at `path`. An empty path gives an in-memory store.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(StoreConfig::at(path.as_ref()))
    }

    /// A store that never reads or writes a file.
    pub fn in_memory() -> Self {
        Self::empty(StoreConfig::in_memory())
    }

    /// Load a store from an existing file and keep it as the backing file.
    ///
    /// Unlike [`open`](Self::open), a missing file is an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let value = read_tagged_records(path)?;
        codec::build_store_from_tagged_records(value, StoreConfig::at(path))
    }

    /// Build a store from an already-parsed tagged-record array.
    ///
    /// The store adopts `config.path` for later persistence but writes
    /// nothing now.
    pub fn from_records(records: Value, config: StoreConfig) -> Result<Self> {
        codec::build_store_from_tagged_records(records, config)
    }

    pub(crate) fn empty(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config,
                registry: RwLock::new(Registry::default()),
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Get a collection, creating it on first reference.
    ///
    /// Repeated calls with the same name return the same collection.
    pub fn collection(&self, name: &str) -> Result<Arc<Collection>> {
        if name.is_empty() {
            return Err(StoreError::InvalidCollectionName(name.to_string()));
        }

        {
            let registry = self.inner.registry.read();
            if let Some(&pos) = registry.by_name.get(name) {
                return Ok(Arc::clone(&registry.order[pos]));
            }
        }

        let mut registry = self.inner.registry.write();
        if let Some(&pos) = registry.by_name.get(name) {
            return Ok(Arc::clone(&registry.order[pos]));
        }

        let inner = Arc::downgrade(&self.inner);
        let hook: Weak<dyn PersistHook> = inner;
        let collection = Arc::new(Collection::new(name, hook));
        let pos = registry.order.len();
        registry.order.push(Arc::clone(&collection));
        registry.by_name.insert(name.to_string(), pos);
        debug!("Created collection '{}'", name);
        Ok(collection)
    }

    /// Check whether a collection has been created.
    pub fn has_collection(&self, name: &str) -> bool {
        self.inner.registry.read().by_name.contains_key(name)
    }

    /// Collection names in registration order.
    pub fn collection_names(&self) -> Vec<String> {
        self.inner
            .registry
            .read()
            .order
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.inner.config.path.as_deref()
    }

    /// Write the whole store to its backing file. No-op without a path.
    pub fn persist(&self) -> Result<()> {
        self.inner.persist()
    }

    /// The store as compact tagged-record JSON.
    pub fn serialize(&self) -> Result<String> {
        self.inner.serialize()
    }

    /// Get store statistics.
    pub fn stats(&self) -> StoreStats {
        let registry = self.inner.registry.read();
        StoreStats {
            collection_count: registry.order.len(),
            record_count: registry.order.iter().map(|c| c.count()).sum(),
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.inner.config.path)
            .field("collections", &self.collection_names())
            .finish()
    }
}
