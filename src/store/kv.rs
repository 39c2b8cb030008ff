// src/store/kv.rs
// =============================================================================
// The key-value service our state lives in.
//
// The core only ever needs two calls:
// - get(key) -> Option<value>
// - set(key, value)
// Each call is atomic for its key; there are no partial writes.
//
// Implementations:
// - MemoryStore: an in-process map (tests, --ephemeral runs)
// - JsonFileStore: one JSON object on disk holding every key
//
// Rust concepts:
// - async-trait: async fn in a trait we use as a trait object (dyn)
// - tokio::fs: async file I/O so a slow disk doesn't block the runtime
// =============================================================================

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::error::StorageError;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a key. Ok(None) means the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Replaces the value stored under a key.
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// Keeps everything in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Persists all keys as a single JSON object in one file.
///
/// The whole object is cached in memory after `open`; every `set` rewrites
/// the file via a sibling temp file and a rename, so readers never observe
/// a half-written document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Opens (or lazily creates) the store file. A missing file is an empty store.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => serde_json::from_str::<Map<String, Value>>(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), keys = entries.len(), "opened store file");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        // Hold the lock for the whole write so two sets can't race on the file
        let mut entries = self.entries.lock().await;

        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        let bytes = serde_json::to_vec_pretty(&next)?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        // Only update the cache once the file write has landed
        *entries = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_get_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("rawLinks").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_set_then_get() {
        let store = MemoryStore::new();
        store.set("rawLinks", json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("rawLinks").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_json_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("links.json")).await.unwrap();
        assert_eq!(store.get("rawLinks").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        store.set("rawLinks", json!({"https://example.com/a": 42})).await.unwrap();
        store.set("visitProfile", json!({"links": [], "currentIndex": 0})).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("rawLinks").await.unwrap(),
            Some(json!({"https://example.com/a": 42}))
        );
        assert_eq!(
            reopened.get("visitProfile").await.unwrap(),
            Some(json!({"links": [], "currentIndex": 0}))
        );
    }

    #[tokio::test]
    async fn test_json_store_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");
        let store = JsonFileStore::open(&path).await.unwrap();
        store.set("rawLinks", json!({})).await.unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("links.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");
        std::fs::write(&path, "not json").unwrap();

        let result = JsonFileStore::open(&path).await;
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }
}
