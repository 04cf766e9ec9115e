//! Configuration loading, validation, and management for Milim.
//!
//! Loads configuration from `~/.milim/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The root configuration structure.
///
/// Maps directly to `~/.milim/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Chat model used for suggestions and sentences
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Language hint for transcription and prompts
    #[serde(default = "default_language")]
    pub language: String,

    /// Suggestion prompt configuration
    #[serde(default)]
    pub suggestions: SuggestionsConfig,

    /// Transcription and speech configuration
    #[serde(default)]
    pub voice: VoiceConfig,

    /// Persistence configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_language() -> String {
    "he".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("language", &self.language)
            .field("suggestions", &self.suggestions)
            .field("voice", &self.voice)
            .field("storage", &self.storage)
            .finish()
    }
}

/// Overrides for the instructions sent to the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestionsConfig {
    /// Replaces the built-in suggestion instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Replaces the built-in sentence-composition instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    #[serde(default = "default_speech_model")]
    pub speech_model: String,

    #[serde(default = "default_voice")]
    pub voice: String,

    /// Style instruction passed to the speech model
    #[serde(default = "default_voice_instructions")]
    pub instructions: String,

    /// Container for synthesized audio
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
}

fn default_transcription_model() -> String {
    "whisper-1".into()
}
fn default_speech_model() -> String {
    "gpt-4o-mini-tts".into()
}
fn default_voice() -> String {
    "alloy".into()
}
fn default_voice_instructions() -> String {
    "דברו בעברית, בקצב איטי וברור ובטון חם.".into()
}
fn default_audio_format() -> String {
    "mp3".into()
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            transcription_model: default_transcription_model(),
            speech_model: default_speech_model(),
            voice: default_voice(),
            instructions: default_voice_instructions(),
            audio_format: default_audio_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the key-value store file (default: `<config dir>/store.json`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Whether finished conversations are saved to history by default
    #[serde(default = "default_true")]
    pub save_history: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            save_history: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (`~/.milim/config.toml`).
    ///
    /// Also checks environment variables:
    /// - `MILIM_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `MILIM_MODEL`
    /// - `MILIM_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: AppConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using the given lookup.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("MILIM_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(model) = lookup("MILIM_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("MILIM_API_URL") {
            self.api_url = url;
        }
    }

    /// The configuration directory: `$MILIM_HOME` or `~/.milim`.
    pub fn config_dir() -> PathBuf {
        std::env::var("MILIM_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs_home().join(".milim"))
    }

    /// Where the key-value store lives.
    pub fn store_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("store.json"))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.api_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("api_url must not be empty".into()));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError("max_tokens must be > 0".into()));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            language: default_language(),
            suggestions: SuggestionsConfig::default(),
            voice: VoiceConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
