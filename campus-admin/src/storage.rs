//! Durable client storage.
//!
//! A flat string-to-string key space, the same shape a browser's local
//! storage offers. The session keys are always written and removed as one
//! batch so memory and storage never disagree after a completed call.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

pub const USER_KEY: &str = "user";
pub const TOKEN_KEY: &str = "token";
pub const ROLE_KEY: &str = "role";
pub const DEVICE_ID_KEY: &str = "device_unique_id";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage file is not a valid key map: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write every entry in a single operation.
    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError>;

    /// Remove every key in a single operation. Missing keys are ignored.
    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError>;

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.set_many(&[(key, value)])
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.remove_many(&[key])
    }
}

/// In-process storage. Lives as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wipe every key, as a user clearing site data would.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set_many(&self, items: &[(&str, String)]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        for (key, value) in items {
            entries.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

/// Storage persisted as one JSON object on disk.
///
/// Writes go to a sibling temporary file that is renamed over the target,
/// so readers observe either the previous map or the new one.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Current map for a read-modify-write. An unparseable file is replaced
    /// by the write instead of blocking it forever.
    fn load_for_write(&self) -> Result<HashMap<String, String>, StorageError> {
        match self.load() {
            Err(StorageError::Corrupt(e)) => {
                tracing::warn!(path = %self.path.display(), "Rewriting corrupt storage file: {}", e);
                Ok(HashMap::new())
            }
            other => other,
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.load()?.remove(key))
    }

    fn set_many(&self, items: &[(&str, String)]) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut entries = self.load_for_write()?;
        for (key, value) in items {
            entries.insert((*key).to_string(), value.clone());
        }
        self.save(&entries)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut entries = self.load_for_write()?;
        let before = entries.len();
        for key in keys {
            entries.remove(*key);
        }
        if entries.len() == before && !self.path.exists() {
            return Ok(());
        }
        self.save(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_batch_write_and_remove() {
        let store = MemoryStore::new();
        store
            .set_many(&[(USER_KEY, "{}".to_string()), (TOKEN_KEY, "t".to_string())])
            .unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), Some("t".to_string()));

        store.remove_many(&[USER_KEY, TOKEN_KEY, ROLE_KEY]).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let store = FileStore::new(&path);
        store.set(DEVICE_ID_KEY, "abc".to_string()).unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get(DEVICE_ID_KEY).unwrap(), Some("abc".to_string()));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_file_store_remove_without_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let store = FileStore::new(&path);
        store.remove_many(&[USER_KEY, TOKEN_KEY]).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_file_store_reports_corrupt_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.get(USER_KEY), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn test_file_store_write_repairs_corrupt_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, r#"{"user": trunc"#).unwrap();

        let store = FileStore::new(&path);
        store.remove_many(&[USER_KEY, TOKEN_KEY, ROLE_KEY]).unwrap();
        assert_eq!(store.get(USER_KEY).unwrap(), None);

        store.set(DEVICE_ID_KEY, "abc".to_string()).unwrap();
        assert_eq!(store.get(DEVICE_ID_KEY).unwrap(), Some("abc".to_string()));
    }
}
