//! Keyed persistence surface for the library
//!
//! Keys are `/`-separated relative paths such as `collections/public.json`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Result, RitualError};

/// Opaque external key-value store
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove a key. Returns false when it was absent.
    fn remove(&mut self, key: &str) -> Result<bool>;

    /// Every key currently stored, sorted
    fn keys(&self) -> Result<Vec<String>>;
}

/// Volatile store for tests and headless runs
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// Store that maps each key to a file under a root directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).map_err(|e| RitualError::Storage {
            key: root.display().to_string(),
            source: e,
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(storage_error(
                key,
                io::Error::new(io::ErrorKind::InvalidInput, "key must be a relative path"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(key, e)),
        }
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| storage_error(key, e))?;
        }
        fs::write(&path, value).map_err(|e| storage_error(key, e))
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(storage_error(key, e)),
        }

        // Drop now-empty parent directories up to the root
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == self.root.as_path() || fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
        Ok(true)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(|e| storage_error(&self.root.display().to_string(), e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            keys.push(key);
        }
        keys.sort();
        Ok(keys)
    }
}

fn storage_error(key: &str, source: io::Error) -> RitualError {
    RitualError::Storage {
        key: key.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        store.put("a/b", b"hello").unwrap();
        assert_eq!(store.get("a/b").unwrap().as_deref(), Some(&b"hello"[..]));
        assert!(store.remove("a/b").unwrap());
        assert!(!store.remove("a/b").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_keys_are_relative() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        store.put("collections/public.json", b"[]").unwrap();
        store.put("blobs/x/image.png", b"png").unwrap();

        assert_eq!(
            store.keys().unwrap(),
            vec!["blobs/x/image.png".to_string(), "collections/public.json".to_string()]
        );
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_file_store_remove_prunes_directories() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        store.put("blobs/x/audio.wav", b"wav").unwrap();
        assert!(store.remove("blobs/x/audio.wav").unwrap());
        assert!(!dir.path().join("blobs").exists());
        assert!(dir.path().exists());
    }

    #[test]
    fn test_file_store_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        assert!(store.put("../outside", b"x").is_err());
        assert!(store.put("/abs", b"x").is_err());
        assert!(store.get("").is_err());
    }
}
