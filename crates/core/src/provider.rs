//! Provider traits — the abstraction over remote model endpoints.
//!
//! A `Provider` knows how to send a system instruction plus a transcript to a
//! language model and get a response back, either as a complete message or as
//! a stream of text deltas. A `VoiceProvider` covers the two audio endpoints:
//! transcription and speech synthesis.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// Shape the model is asked to answer in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free text
    #[default]
    Text,
    /// A single JSON object
    JsonObject,
}

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,

    /// Requested response shape
    #[serde(default)]
    pub response_format: ResponseFormat,
}

fn default_temperature() -> f32 {
    0.7
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// A content delta.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// The terminal chunk.
    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }
}

/// One audio blob to transcribe.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,

    /// Encoded audio bytes
    pub audio: Vec<u8>,

    /// MIME type of `audio` (e.g., "audio/webm")
    pub mime_type: String,

    /// File name reported in the upload
    pub file_name: String,

    /// ISO-639-1 language hint (e.g., "he")
    pub language: Option<String>,
}

/// Text to synthesize into speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRequest {
    /// Speech model (e.g., "gpt-4o-mini-tts")
    pub model: String,

    /// The text to speak
    pub input: String,

    /// Voice name
    pub voice: String,

    /// Voice/style instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Audio container (e.g., "mp3")
    pub format: String,
}

/// The core Provider trait.
///
/// Every text-completion backend implements this trait. The suggestion engine
/// calls `complete()` or `stream()` without knowing which backend is used.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of response chunks.
    ///
    /// Default implementation calls `complete()` and wraps the result as a single chunk.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let response = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        let _ = tx.send(Ok(StreamChunk::text(response.message.content))).await;
        let _ = tx.send(Ok(StreamChunk {
            content: None,
            done: true,
            usage: response.usage,
        })).await;
        Ok(rx)
    }
}

/// Audio endpoints: speech-to-text and text-to-speech.
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Transcribe one audio blob to plain text. Not streamed.
    async fn transcribe(&self, request: TranscriptionRequest) -> std::result::Result<String, ProviderError>;

    /// Synthesize speech, returning the encoded audio bytes.
    async fn synthesize(&self, request: SpeechRequest) -> std::result::Result<Vec<u8>, ProviderError>;
}
