//! Typed access on top of a `KeyValueStore`.

use milim_core::error::StoreError;
use milim_core::store::KeyValueStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Read and decode the value under `key`.
///
/// Missing keys and values that fail to read or decode both yield
/// `T::default()`; failures are logged, never returned.
pub async fn load_or_default<T>(store: &dyn KeyValueStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            warn!(key, error = %e, "Failed to read stored value");
            return T::default();
        }
    };

    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(key, error = %e, "Ignoring unreadable stored value");
        T::default()
    })
}

/// Encode `value` and write it under `key`.
pub async fn save<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value).map_err(|e| StoreError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    store.set(key, raw).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;

    #[tokio::test]
    async fn missing_key_is_default() {
        let store = InMemoryStore::new();
        let v: Vec<String> = load_or_default(&store, "k").await;
        assert!(v.is_empty());
    }

    #[tokio::test]
    async fn unreadable_value_is_default() {
        let store = InMemoryStore::new();
        store.set("k", "[1, 2".into()).await.unwrap();
        let v: Vec<u32> = load_or_default(&store, "k").await;
        assert!(v.is_empty());
    }

    #[tokio::test]
    async fn save_then_load() {
        let store = InMemoryStore::new();
        save(&store, "k", &vec![1u32, 2]).await.unwrap();
        let v: Vec<u32> = load_or_default(&store, "k").await;
        assert_eq!(v, vec![1, 2]);
    }
}
