use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::{StorageError, DATA_DIR};

/// A durable slot per key holding text, in the manner of browser local storage.
pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The `data/` directory under the project root.
    pub fn open_default() -> Result<Self, StorageError> {
        let root: PathBuf = project_root::get_project_root().map_err(StorageError::ProjectRoot)?;
        Ok(Self::new(root.join(DATA_DIR)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::io(&path, err)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|err| StorageError::io(&self.dir, err))?;
        }

        // Atomic replace
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, value).map_err(|err| StorageError::io(&tmp_path, err))?;
        std::fs::rename(&tmp_path, &path).map_err(|err| StorageError::io(&path, err))?;
        Ok(())
    }
}

/// In-process storage. Clones share the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_round_trip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut storage = FileStorage::new(temp_dir.path().join("nested"));

        assert!(storage.get("saved_trips").unwrap().is_none());

        storage.set("saved_trips", "[]").unwrap();
        assert_eq!(storage.get("saved_trips").unwrap().as_deref(), Some("[]"));
        assert!(temp_dir.path().join("nested/saved_trips.json").exists());

        storage.set("saved_trips", "[1]").unwrap();
        assert_eq!(storage.get("saved_trips").unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn memory_storage_clones_share_slots() {
        let mut storage = MemoryStorage::new();
        let other = storage.clone();

        storage.set("k", "v").unwrap();

        assert_eq!(other.get("k").unwrap().as_deref(), Some("v"));
        assert!(other.get("missing").unwrap().is_none());
    }
}
