//! Key-value persistence
//!
//! Every persisted value lives under a logical key (`slideData`,
//! `coverData`, `timerSettings`, `path`) as a JSON text document.
//! The file backend stores one `<key>.json` per key and uses atomic writes
//! (write to temp file, then rename) so a value is never half-written.
//!
//! Storage location: `~/.local/share/signage/` (configurable via `Config`)

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;

use super::error::{StorageError, StorageResult};

/// A string-keyed text store holding whole serialized values
pub trait KvBackend {
    /// Read the value stored under `key`, `None` if absent
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replace the value stored under `key`
    fn set(&mut self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`; removing an absent key is not an error
    fn remove(&mut self, key: &str) -> StorageResult<()>;
}

/// File-per-key backend rooted at the configured data directory
#[derive(Debug, Clone)]
pub struct FileBackend {
    config: Config,
}

impl FileBackend {
    /// Create a new file backend with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if a key has a file on disk
    pub fn exists(&self, key: &str) -> bool {
        self.config.key_path(key).exists()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.config.key_path(key)
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key);

        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadError { path, source: e }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        atomic_write(&self.path_for(key), value.as_bytes())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from_io(e, path)),
        }
    }
}

/// In-memory backend
///
/// Used by tests and by callers that want a throwaway kiosk session.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    values: HashMap<String, String>,
    read_only: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, as a full or locked disk would
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Raw stored text for a key
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn check_writable(&self, key: &str) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::WriteError {
                path: PathBuf::from(key),
                source: io::Error::new(io::ErrorKind::Other, "backend is read-only"),
            });
        }
        Ok(())
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.check_writable(key)?;
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.check_writable(key)?;
        self.values.remove(key);
        Ok(())
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
///
/// The target file is never left in a partially-written state.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|e| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_backend(temp_dir: &TempDir) -> FileBackend {
        FileBackend::new(Config::with_data_dir(temp_dir.path()))
    }

    #[test]
    fn test_set_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let mut backend = test_backend(&temp_dir);

        assert!(!backend.exists("slideData"));
        assert!(backend.get("slideData").unwrap().is_none());

        backend.set("slideData", "[]").unwrap();
        assert!(backend.exists("slideData"));
        assert_eq!(backend.get("slideData").unwrap().as_deref(), Some("[]"));
        assert!(temp_dir.path().join("slideData.json").exists());
    }

    #[test]
    fn test_set_replaces_value() {
        let temp_dir = TempDir::new().unwrap();
        let mut backend = test_backend(&temp_dir);

        backend.set("path", "\"slide\"").unwrap();
        backend.set("path", "\"list\"").unwrap();

        assert_eq!(backend.get("path").unwrap().as_deref(), Some("\"list\""));
        // No temp file left behind
        assert!(!temp_dir.path().join("path.tmp").exists());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut backend = test_backend(&temp_dir);

        backend.set("coverData", "{}").unwrap();
        backend.remove("coverData").unwrap();
        backend.remove("coverData").unwrap();
        assert!(backend.get("coverData").unwrap().is_none());
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir
            .path()
            .join("a")
            .join("b")
            .join("c")
            .join("file.json");

        atomic_write(&nested_path, b"test data").unwrap();

        assert!(nested_path.exists());
        let content = fs::read_to_string(&nested_path).unwrap();
        assert_eq!(content, "test data");
    }

    #[test]
    fn test_memory_backend_read_only() {
        let mut backend = MemoryBackend::new();
        backend.set("timerSettings", "{}").unwrap();

        backend.set_read_only(true);
        assert!(backend.set("timerSettings", "{\"sliderTimer\":\"9\"}").is_err());
        assert!(backend.remove("timerSettings").is_err());
        assert_eq!(backend.raw("timerSettings"), Some("{}"));

        backend.set_read_only(false);
        backend.remove("timerSettings").unwrap();
        assert!(backend.raw("timerSettings").is_none());
    }
}
