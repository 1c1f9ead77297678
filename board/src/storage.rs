//! Named saves over a key-value store.
//!
//! Each save is one JSON record under `coverboard:<id>`. The backing store is
//! a trait so the host can put saves on disk while tests keep them in memory.
//! Writes are last-write-wins; there is no locking.

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::consts::{DEFAULT_SAVE_ID, STORAGE_PREFIX};
use crate::doc::Board;
use crate::schema;

/// Errors from a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend could not read or write.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The board could not be encoded.
    #[error("board encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The save id is empty or contains characters a backend cannot store.
    #[error("invalid save id {0:?}")]
    InvalidKey(String),
}

/// String key-value store holding saved boards.
pub trait Storage {
    /// Value at `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` at `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be written.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be written.
    fn remove(&mut self, key: &str) -> Result<bool, StorageError>;

    /// Every key currently stored.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be listed.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Storage in a sorted in-process map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// Storage key for save `id`.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] for ids that are empty or contain
/// anything but ASCII letters, digits, `-`, and `_`.
pub fn save_key(id: &str) -> Result<String, StorageError> {
    let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(StorageError::InvalidKey(id.to_owned()));
    }
    Ok(format!("{STORAGE_PREFIX}{id}"))
}

/// Save id for a storage key, if it is one of ours.
#[must_use]
pub fn save_id(key: &str) -> Option<&str> {
    key.strip_prefix(STORAGE_PREFIX).filter(|id| !id.is_empty())
}

/// Named boards kept in a [`Storage`].
#[derive(Debug, Clone, Default)]
pub struct Saves<S> {
    storage: S,
}

impl<S: Storage> Saves<S> {
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Load save `id`, or [`DEFAULT_SAVE_ID`] when `id` is `None`.
    ///
    /// A missing or corrupt save yields an empty board.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] for an invalid id or a failing backend.
    pub fn load(&self, id: Option<&str>) -> Result<Board, StorageError> {
        let key = save_key(id.unwrap_or(DEFAULT_SAVE_ID))?;
        let raw = self.storage.get(&key)?;
        debug!(%key, found = raw.is_some(), "loading save");
        Ok(schema::rehydrate(raw.as_deref()))
    }

    /// Write `board` as save `id` in the current record version.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] for an invalid id, an encode failure, or a
    /// failing backend.
    pub fn store(&mut self, id: Option<&str>, board: &Board) -> Result<(), StorageError> {
        let key = save_key(id.unwrap_or(DEFAULT_SAVE_ID))?;
        let json = schema::export_json(board)?;
        self.storage.set(&key, &json)?;
        info!(%key, covers = board.covers.len(), groups = board.groups.len(), "saved board");
        Ok(())
    }

    /// Ids of every save, sorted.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be listed.
    pub fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut ids: Vec<String> = self
            .storage
            .keys()?
            .iter()
            .filter_map(|key| save_id(key))
            .map(str::to_owned)
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Delete save `id`. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] for an invalid id or a failing backend.
    pub fn delete(&mut self, id: &str) -> Result<bool, StorageError> {
        let key = save_key(id)?;
        let removed = self.storage.remove(&key)?;
        if removed {
            info!(%key, "deleted save");
        }
        Ok(removed)
    }

    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }
}
