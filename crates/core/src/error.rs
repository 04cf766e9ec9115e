//! Error types for the Milim domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Milim operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Persistence errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Conversation errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Audio errors ---
    #[error("Voice error: {0}")]
    Voice(#[from] VoiceError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures talking to a remote model endpoint.
///
/// Every variant is a transport-level failure: malformed JSON inside a
/// successfully streamed response never becomes a `ProviderError`.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("No API key configured")]
    MissingCredential,

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization failed for key {key}: {reason}")]
    Serialization { key: String, reason: String },
}

/// Rejected conversation/staging transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Nothing is staged")]
    NothingStaged,

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Entry {0} was not written by the user and cannot be removed")]
    NotRemovable(String),

    #[error("Text is empty")]
    EmptyText,
}

#[derive(Debug, Clone, Error)]
pub enum VoiceError {
    #[error("Another playback or transcription is already active")]
    Busy,

    #[error("Voice provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Playback failed: {0}")]
    Playback(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn session_error_displays_correctly() {
        let err = Error::Session(SessionError::NotRemovable("abc".into()));
        assert!(err.to_string().contains("abc"));
        assert!(err.to_string().contains("cannot be removed"));
    }

    #[test]
    fn voice_error_wraps_provider_error() {
        let err: VoiceError = ProviderError::MissingCredential.into();
        assert!(err.to_string().contains("No API key"));
    }
}
