//! File-based key-value store — one JSON object on disk.
//!
//! Storage location: `~/.milim/store.json` (see `AppConfig::store_path`).
//! The file maps each key to its serialized value string, so it stays
//! human-inspectable and can be edited by hand.

use async_trait::async_trait;
use milim_core::error::StoreError;
use milim_core::store::KeyValueStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A file-backed key-value store.
///
/// Values are loaded into memory on creation and flushed to disk on every
/// mutation (set, remove). This gives fast reads with durable writes.
pub struct FileStore {
    path: PathBuf,
    values: Arc<RwLock<BTreeMap<String, String>>>,
}

impl FileStore {
    /// Open the store at the given path.
    ///
    /// A missing file starts empty (created on first write). An unreadable or
    /// corrupted file is logged and also starts empty.
    pub fn new(path: PathBuf) -> Self {
        let values = Self::load_from_disk(&path);
        debug!(path = %path.display(), keys = values.len(), "File store loaded");
        Self {
            path,
            values: Arc::new(RwLock::new(values)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> BTreeMap<String, String> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return BTreeMap::new(), // File doesn't exist yet — start empty
        };
        if content.trim().is_empty() {
            return BTreeMap::new();
        }

        match serde_json::from_str(&content) {
            Ok(values) => values,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupted store file");
                BTreeMap::new()
            }
        }
    }

    /// Flush all values to disk.
    async fn flush(&self) -> Result<(), StoreError> {
        let values = self.values.read().await;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("Failed to create store directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(&*values)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize store: {e}")))?;

        std::fs::write(&self.path, content)
            .map_err(|e| StoreError::Storage(format!("Failed to write store file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.values.write().await.insert(key.to_string(), value);
        self.flush().await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let removed = self.values.write().await.remove(key).is_some();
        if removed {
            self.flush().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::new(path);
        (dir, store)
    }

    #[tokio::test]
    async fn set_and_get() {
        let (_dir, store) = temp_store();
        store.set("milim.api_key", "\"sk-1\"".into()).await.unwrap();
        assert_eq!(store.get("milim.api_key").await.unwrap().as_deref(), Some("\"sk-1\""));
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn persistence_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");

        {
            let store = FileStore::new(path.clone());
            store.set("a", "1".into()).await.unwrap();
            store.set("b", "2".into()).await.unwrap();
            store.remove("a").await.unwrap();
        }

        let reopened = FileStore::new(path);
        assert!(reopened.get("a").await.unwrap().is_none());
        assert_eq!(reopened.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn corrupted_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(path.clone());
        assert!(store.get("anything").await.unwrap().is_none());

        // first write replaces the corrupted file
        store.set("k", "true".into()).await.unwrap();
        assert_eq!(FileStore::new(path).get("k").await.unwrap().as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn removing_missing_key_is_ok() {
        let (_dir, store) = temp_store();
        store.remove("nope").await.unwrap();
        assert!(!store.path().exists());
    }
}
