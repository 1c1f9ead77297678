//! File-backed save storage.
//!
//! SYSTEM CONTEXT
//! ==============
//! The board crate keeps saves behind a string key-value trait. On the
//! command line each key becomes one JSON file in the data directory, so
//! saves survive between invocations and can be inspected by hand.
//!
//! Keys map to file names by swapping `:` for `.` and appending `.json`;
//! keys containing `.`, path separators, or other characters outside
//! `[A-Za-z0-9_:-]` are rejected so the mapping stays reversible.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use board::storage::{Storage, StorageError};
use tracing::debug;

const EXTENSION: &str = ".json";

/// Saves stored as files under one directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened file storage");
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(file_name(key)?))
    }
}

fn file_name(key: &str) -> Result<String, StorageError> {
    let valid = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':'));
    if !valid {
        return Err(StorageError::InvalidKey(key.to_owned()));
    }
    Ok(format!("{}{EXTENSION}", key.replace(':', ".")))
}

fn key_for(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(EXTENSION)?;
    (!stem.is_empty()).then(|| stem.replace('.', ":"))
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        // Write then rename so a crash never leaves a half-written save.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StorageError> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(key) = entry.file_name().to_str().and_then(key_for) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
