//! Key-value settings storage.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tracing::debug;

/// Error type for settings storage.
#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("failed to read settings from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write settings to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {} is malformed: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },
}

/// String key-value storage for user settings.
pub trait SettingsStore: Send + Sync {
    /// Get a stored value.
    fn get(&self, key: &str) -> Result<Option<String>, PreferencesError>;

    /// Store a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), PreferencesError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Settings kept in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PreferencesError> {
        Ok(lock(&self.values).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferencesError> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Settings persisted as a flat TOML table of strings.
///
/// The file is read once when opened and rewritten on every `set`.
#[derive(Debug)]
pub struct TomlFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl TomlFileStore {
    /// Opens `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PreferencesError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => {
                toml::from_str(&content).map_err(|e| PreferencesError::Malformed {
                    path: path.clone(),
                    message: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(source) => return Err(PreferencesError::Read { path, source }),
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), PreferencesError> {
        let content = toml::to_string(values).map_err(|e| PreferencesError::Malformed {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| PreferencesError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        std::fs::write(&self.path, content).map_err(|source| PreferencesError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl SettingsStore for TomlFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PreferencesError> {
        Ok(lock(&self.values).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferencesError> {
        let mut values = lock(&self.values);
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get("use_gpu").unwrap(), None);
        store.set("use_gpu", "true").unwrap();
        assert_eq!(store.get("use_gpu").unwrap(), Some("true".to_string()));
    }

    #[test]
    fn test_file_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let store = TomlFileStore::open(&path).unwrap();
        assert_eq!(store.get("output_dir").unwrap(), None);
        store.set("output_dir", "/videos/out").unwrap();
        assert!(path.exists());

        let reopened = TomlFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("output_dir").unwrap(),
            Some("/videos/out".to_string())
        );
    }

    #[test]
    fn test_file_store_rejects_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "not = [valid").unwrap();

        let err = TomlFileStore::open(&path).unwrap_err();
        assert!(matches!(err, PreferencesError::Malformed { .. }));
    }
}
