//! Persisted snapshots for instant reload.
//!
//! Snapshots are named key → JSON string entries. They are a courtesy cache,
//! never a source of truth: every successful fetch overwrites its entry
//! wholesale and logout deletes it.
//!
//! Two backends are provided:
//! - [`RedbSnapshots`] - embedded `redb` file, default `~/.pzafira/state.redb`
//! - [`MemorySnapshots`] - process-local map, used by tests and ephemeral runs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use redb::{Database, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Snapshot entry names.
pub mod keys {
    pub const CART: &str = "cart";
    pub const WISHLIST: &str = "wishlist";
    pub const ORDERS: &str = "userOrders";
    pub const PRODUCTS: &str = "cachedProducts";
    pub const CATEGORIES: &str = "categories";
    pub const BRANDS: &str = "brands";
    pub const COLORS: &str = "colors";
    pub const SIZES: &str = "sizes";

    /// Every key this crate writes.
    pub const ALL: [&str; 8] = [
        CART, WISHLIST, ORDERS, PRODUCTS, CATEGORIES, BRANDS, COLORS, SIZES,
    ];
}

const SNAPSHOTS: TableDefinition<&str, &str> = TableDefinition::new("snapshots");

/// Errors from snapshot persistence.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("Snapshot serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to create snapshot directory: {0}")]
    Io(#[from] std::io::Error),
}

fn storage(err: impl Into<redb::Error>) -> SnapshotError {
    SnapshotError::Storage(err.into())
}

/// Key → JSON string storage.
pub trait SnapshotStore: Send + Sync {
    /// Read a raw entry.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Storage` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, SnapshotError>;

    /// Overwrite an entry.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Storage` if the backend cannot be written.
    fn put(&self, key: &str, value: &str) -> Result<(), SnapshotError>;

    /// Delete an entry. Deleting a missing entry is not an error.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Storage` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), SnapshotError>;
}

/// Decode a snapshot entry.
///
/// A corrupt entry is logged and treated as missing.
///
/// # Errors
///
/// Returns `SnapshotError::Storage` if the backend cannot be read.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn SnapshotStore,
    key: &str,
) -> Result<Option<T>, SnapshotError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(key, error = %e, "Discarding unreadable snapshot");
            Ok(None)
        }
    }
}

/// Encode and overwrite a snapshot entry.
///
/// # Errors
///
/// Returns `SnapshotError` if encoding or writing fails.
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn SnapshotStore,
    key: &str,
    value: &T,
) -> Result<(), SnapshotError> {
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw)
}

// =============================================================================
// redb backend
// =============================================================================

/// Snapshot store backed by an embedded `redb` database file.
pub struct RedbSnapshots {
    db: Database,
    path: PathBuf,
}

impl RedbSnapshots {
    /// Open (or create) the snapshot database at `path`.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` if the parent directory or the database
    /// cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "Opening snapshot database");
        let db = Database::create(&path).map_err(storage)?;

        // Create the table up front so reads never see a missing table.
        let write_txn = db.begin_write().map_err(storage)?;
        {
            let _ = write_txn.open_table(SNAPSHOTS).map_err(storage)?;
        }
        write_txn.commit().map_err(storage)?;

        Ok(Self { db, path })
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for RedbSnapshots {
    fn get(&self, key: &str) -> Result<Option<String>, SnapshotError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(SNAPSHOTS).map_err(storage)?;
        let value = table.get(key).map_err(storage)?;
        Ok(value.map(|guard| guard.value().to_string()))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), SnapshotError> {
        let write_txn = self.db.begin_write().map_err(storage)?;
        {
            let mut table = write_txn.open_table(SNAPSHOTS).map_err(storage)?;
            table.insert(key, value).map_err(storage)?;
        }
        write_txn.commit().map_err(storage)?;
        debug!(key, bytes = value.len(), "Snapshot written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SnapshotError> {
        let write_txn = self.db.begin_write().map_err(storage)?;
        {
            let mut table = write_txn.open_table(SNAPSHOTS).map_err(storage)?;
            table.remove(key).map_err(storage)?;
        }
        write_txn.commit().map_err(storage)?;
        debug!(key, "Snapshot removed");
        Ok(())
    }
}

impl std::fmt::Debug for RedbSnapshots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbSnapshots")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// In-memory backend
// =============================================================================

/// Snapshot store held in process memory.
#[derive(Debug, Default)]
pub struct MemorySnapshots {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySnapshots {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an entry exists under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl SnapshotStore for MemorySnapshots {
    fn get(&self, key: &str) -> Result<Option<String>, SnapshotError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), SnapshotError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SnapshotError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
