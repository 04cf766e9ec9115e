//! User preferences, each under its own key.

use std::sync::Arc;

use milim_core::KeyValueStore;
use milim_core::error::StoreError;
use serde::{Deserialize, Serialize};

use crate::json;

pub const API_KEY_KEY: &str = "milim.api_key";
pub const SYSTEM_PROMPT_KEY: &str = "milim.system_prompt";
pub const SAVE_HISTORY_KEY: &str = "milim.save_history";

/// Missing keys read as: no key, no custom prompt, history saving on.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
    pub save_history: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            api_key: None,
            system_prompt: None,
            save_history: true,
        }
    }
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("system_prompt", &self.system_prompt)
            .field("save_history", &self.save_history)
            .finish()
    }
}

/// Save-history is stored as a bare JSON bool; absent means enabled.
#[derive(Deserialize)]
#[serde(transparent)]
struct SaveHistory(bool);

impl Default for SaveHistory {
    fn default() -> Self {
        Self(true)
    }
}

pub struct PreferenceStore {
    store: Arc<dyn KeyValueStore>,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> Preferences {
        let store = self.store.as_ref();
        let api_key: Option<String> = json::load_or_default(store, API_KEY_KEY).await;
        let system_prompt: Option<String> = json::load_or_default(store, SYSTEM_PROMPT_KEY).await;
        let SaveHistory(save_history) = json::load_or_default(store, SAVE_HISTORY_KEY).await;
        Preferences {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            system_prompt: system_prompt.filter(|p| !p.trim().is_empty()),
            save_history,
        }
    }

    pub async fn save(&self, prefs: &Preferences) -> Result<(), StoreError> {
        self.set_api_key(prefs.api_key.as_deref()).await?;
        self.set_system_prompt(prefs.system_prompt.as_deref()).await?;
        self.set_save_history(prefs.save_history).await
    }

    /// `None` (or a blank key) removes the stored credential.
    pub async fn set_api_key(&self, key: Option<&str>) -> Result<(), StoreError> {
        self.set_optional(API_KEY_KEY, key).await
    }

    /// `None` restores the built-in instruction.
    pub async fn set_system_prompt(&self, prompt: Option<&str>) -> Result<(), StoreError> {
        self.set_optional(SYSTEM_PROMPT_KEY, prompt).await
    }

    pub async fn set_save_history(&self, enabled: bool) -> Result<(), StoreError> {
        json::save(self.store.as_ref(), SAVE_HISTORY_KEY, &enabled).await
    }

    async fn set_optional(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => json::save(self.store.as_ref(), key, v).await,
            None => self.store.remove(key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;

    fn prefs_store() -> (Arc<InMemoryStore>, PreferenceStore) {
        let store = Arc::new(InMemoryStore::new());
        (store.clone(), PreferenceStore::new(store))
    }

    #[tokio::test]
    async fn empty_store_reads_defaults() {
        let (_, prefs) = prefs_store();
        assert_eq!(prefs.load().await, Preferences::default());
        assert!(prefs.load().await.save_history);
    }

    #[tokio::test]
    async fn values_live_under_separate_keys() {
        let (store, prefs) = prefs_store();
        prefs
            .save(&Preferences {
                api_key: Some("sk-test".into()),
                system_prompt: Some("הצע מילים".into()),
                save_history: false,
            })
            .await
            .unwrap();

        assert_eq!(store.get(API_KEY_KEY).await.unwrap().as_deref(), Some("\"sk-test\""));
        assert_eq!(store.get(SAVE_HISTORY_KEY).await.unwrap().as_deref(), Some("false"));
        let loaded = prefs.load().await;
        assert_eq!(loaded.system_prompt.as_deref(), Some("הצע מילים"));
        assert!(!loaded.save_history);
    }

    #[tokio::test]
    async fn blank_key_clears_credential() {
        let (store, prefs) = prefs_store();
        prefs.set_api_key(Some("sk-1")).await.unwrap();
        prefs.set_api_key(Some("  ")).await.unwrap();
        assert!(store.get(API_KEY_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreadable_flag_defaults_to_enabled() {
        let (store, prefs) = prefs_store();
        store.set(SAVE_HISTORY_KEY, "\"maybe\"".into()).await.unwrap();
        assert!(prefs.load().await.save_history);
    }

    #[test]
    fn debug_redacts_key() {
        let prefs = Preferences {
            api_key: Some("sk-secret".into()),
            ..Preferences::default()
        };
        assert!(!format!("{prefs:?}").contains("sk-secret"));
    }
}
