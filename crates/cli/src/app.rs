//! Wiring shared by every command: config, store, preferences, clients.

use std::path::Path;
use std::sync::Arc;

use milim_config::AppConfig;
use milim_core::{KeyValueStore, ProviderError};
use milim_providers::OpenAiCompatProvider;
use milim_store::{FileStore, HistoryRepository, InMemoryStore, PreferenceStore, Preferences};
use milim_suggest::{FileSink, Notice, PromptSettings, SuggestionEngine, VoicePlayer, VoiceSettings};
use tracing::debug;

pub struct App {
    pub config: AppConfig,
    pub store: Arc<dyn KeyValueStore>,
    pub prefs: Preferences,
}

impl App {
    pub async fn load(ephemeral: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
        let store: Arc<dyn KeyValueStore> = if ephemeral {
            Arc::new(InMemoryStore::new())
        } else {
            Arc::new(FileStore::new(config.store_path()))
        };
        let prefs = PreferenceStore::new(store.clone()).load().await;
        debug!(store = store.name(), ?prefs, "App loaded");
        Ok(Self {
            config,
            store,
            prefs,
        })
    }

    /// Config (file or environment) wins over the stored preference.
    pub fn api_key(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .or(self.prefs.api_key.as_deref())
    }

    /// Refuses with `MissingCredential` before any network call.
    pub fn provider(&self) -> Result<Arc<OpenAiCompatProvider>, ProviderError> {
        let mut config = self.config.clone();
        config.api_key = self.api_key().map(str::to_string);
        Ok(Arc::new(OpenAiCompatProvider::from_config(&config)?))
    }

    pub fn prompt_settings(&self) -> PromptSettings {
        let settings = PromptSettings::from_config(&self.config);
        match &self.prefs.system_prompt {
            Some(prompt) => settings.with_system_prompt(prompt.clone()),
            None => settings,
        }
    }

    pub fn engine(&self) -> Result<Arc<SuggestionEngine>, ProviderError> {
        Ok(Arc::new(SuggestionEngine::new(
            self.provider()?,
            self.prompt_settings(),
        )))
    }

    pub fn voice(&self, out_dir: &Path) -> Result<VoicePlayer, ProviderError> {
        Ok(VoicePlayer::new(
            self.provider()?,
            Arc::new(FileSink::new(out_dir)),
            VoiceSettings::from_config(&self.config),
        ))
    }

    pub fn histories(&self) -> HistoryRepository {
        HistoryRepository::new(self.store.clone())
    }

    pub fn preferences(&self) -> PreferenceStore {
        PreferenceStore::new(self.store.clone())
    }

    pub fn save_history(&self) -> bool {
        self.config.storage.save_history && self.prefs.save_history
    }
}

/// Print a user-facing notice on stderr.
pub fn report(notice: &Notice) {
    eprintln!("  ⚠️  {notice}");
}

/// Turn a provider failure into a reported notice plus a command error.
pub fn provider_failure(err: ProviderError) -> Box<dyn std::error::Error> {
    report(&Notice::from_provider_error(&err));
    err.into()
}
