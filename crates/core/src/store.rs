//! Key-value persistence trait.
//!
//! Values are JSON strings stored under stable string keys. Backends know
//! nothing about histories or preferences; typed access lives in `milim-store`.

use async_trait::async_trait;
use crate::error::StoreError;

/// A string-keyed store of JSON-serialized values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Human-readable name for this backend.
    fn name(&self) -> &str;

    /// Read the raw value under `key`. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
