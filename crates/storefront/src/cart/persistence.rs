//! Durable cart snapshots.
//!
//! The cart is written to a single named entry in a key/value store after
//! every mutation and read back once at start-up. The snapshot is a JSON
//! array of product records, each extended with a `quantity` field:
//!
//! ```json
//! [{"id":"p1","name":"Silk Evening Gown","category":"Clothing","price":2450,
//!   "description":"...","images":["..."],"details":["..."],"isNew":true,
//!   "quantity":2}]
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use luxe_core::{Product, ProductId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::CartLineItem;
use crate::config::CartConfig;

/// Errors raised by a [`SnapshotStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error for key {key}: {source}")]
    Io {
        key: String,
        source: std::io::Error,
    },

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Errors raised while decoding a persisted snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON for a cart: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot line {0} has quantity 0")]
    ZeroQuantity(ProductId),

    #[error("snapshot contains product {0} more than once")]
    DuplicateLine(ProductId),
}

/// Browser-style local key/value storage.
pub trait SnapshotStore {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with one entry.
    #[must_use]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        store
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-backed store: one `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    /// Directory this store writes into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SnapshotStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(io_err)?;
        // Write-then-rename; readers never see a partial snapshot.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(io_err)?;
        std::fs::rename(&tmp, &path).map_err(io_err)
    }
}

/// Store selected by configuration: file-backed when a directory is set.
#[derive(Debug, Clone)]
pub enum CartStorage {
    Memory(MemoryStore),
    File(FileStore),
}

impl CartStorage {
    #[must_use]
    pub fn from_config(config: &CartConfig) -> Self {
        match &config.storage_dir {
            Some(dir) => Self::File(FileStore::new(dir)),
            None => Self::Memory(MemoryStore::new()),
        }
    }
}

impl SnapshotStore for CartStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self {
            Self::Memory(store) => store.load(key),
            Self::File(store) => store.load(key),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        match self {
            Self::Memory(store) => store.save(key, value),
            Self::File(store) => store.save(key, value),
        }
    }
}

#[derive(Serialize)]
struct LineRecordRef<'a> {
    #[serde(flatten)]
    product: &'a Product,
    quantity: u32,
}

#[derive(Deserialize)]
struct LineRecord {
    #[serde(flatten)]
    product: Product,
    quantity: u32,
}

/// Serialize cart lines into the snapshot format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(lines: &[CartLineItem]) -> Result<String, serde_json::Error> {
    let records: Vec<_> = lines
        .iter()
        .map(|line| LineRecordRef {
            product: line.product(),
            quantity: line.quantity(),
        })
        .collect();
    serde_json::to_string(&records)
}

/// Decode a snapshot, enforcing the cart invariants.
///
/// # Errors
///
/// Returns an error if the JSON does not match the record shape, a line has
/// quantity 0, or a product appears on more than one line.
pub fn decode(raw: &str) -> Result<Vec<CartLineItem>, SnapshotError> {
    let records: Vec<LineRecord> = serde_json::from_str(raw)?;

    let mut seen = HashSet::with_capacity(records.len());
    let mut lines = Vec::with_capacity(records.len());
    for record in records {
        if record.quantity == 0 {
            return Err(SnapshotError::ZeroQuantity(record.product.id));
        }
        if !seen.insert(record.product.id.clone()) {
            return Err(SnapshotError::DuplicateLine(record.product.id));
        }
        lines.push(CartLineItem::new(Arc::new(record.product), record.quantity));
    }
    Ok(lines)
}
