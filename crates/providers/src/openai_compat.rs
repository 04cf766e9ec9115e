//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI and any endpoint exposing the same REST surface.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE, optional JSON-object mode)
//! - Audio transcription (`/audio/transcriptions`, multipart upload)
//! - Speech synthesis (`/audio/speech`, binary audio response)

use async_trait::async_trait;
use futures::StreamExt;
use milim_config::AppConfig;
use milim_core::error::ProviderError;
use milim_core::message::{Message, Role};
use milim_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::sse::{SseBuffer, SseLine};

/// An OpenAI-compatible model provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    ///
    /// Only the connection phase is bounded; streamed responses run until the
    /// server closes them.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingCredential);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Build from configuration, refusing when no credential is available.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let key = config
            .api_key
            .clone()
            .ok_or(ProviderError::MissingCredential)?;
        Self::new("openai", config.api_url.clone(), key)
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                },
                content: Some(m.content.clone()),
            })
            .collect()
    }

    /// Build the `/chat/completions` body.
    fn chat_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if request.response_format == ResponseFormat::JsonObject {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        body
    }

    /// Map a non-success HTTP status to a `ProviderError`.
    async fn check_status(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl milim_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::chat_body(&request, false);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let response = self.check_status(response).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: choice.message.content.unwrap_or_default(),
            timestamp: chrono::Utc::now(),
        };

        let usage = api_response.usage.map(Usage::from);

        Ok(ProviderResponse {
            message,
            usage,
            model: api_response.model,
        })
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::chat_body(&request, true);

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let response = self.check_status(response).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Spawn task to read the SSE byte stream and forward content deltas
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = SseBuffer::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for line in buffer.push(&bytes) {
                    match forward_line(&provider_name, line, &tx).await {
                        Forwarded::Continue => {}
                        Forwarded::Stop => return,
                    }
                }
            }

            if let Some(line) = buffer.finish() {
                if let Forwarded::Stop = forward_line(&provider_name, line, &tx).await {
                    return;
                }
            }

            // Stream ended without [DONE]; send the final chunk
            let _ = tx.send(Ok(StreamChunk::done())).await;
        });

        Ok(rx)
    }
}

enum Forwarded {
    Continue,
    Stop,
}

/// Translate one SSE line into zero or one `StreamChunk`.
async fn forward_line(
    provider_name: &str,
    line: SseLine,
    tx: &tokio::sync::mpsc::Sender<Result<StreamChunk, ProviderError>>,
) -> Forwarded {
    let data = match line {
        SseLine::Done => {
            let _ = tx.send(Ok(StreamChunk::done())).await;
            return Forwarded::Stop;
        }
        SseLine::Data(data) => data,
    };

    let stream_resp = match serde_json::from_str::<StreamResponse>(&data) {
        Ok(r) => r,
        Err(e) => {
            trace!(
                provider = %provider_name,
                data = %data,
                error = %e,
                "Ignoring unparseable SSE chunk"
            );
            return Forwarded::Continue;
        }
    };

    if let Some(content) = stream_resp
        .choices
        .first()
        .and_then(|c| c.delta.content.clone())
        .filter(|c| !c.is_empty())
    {
        if tx.send(Ok(StreamChunk::text(content))).await.is_err() {
            return Forwarded::Stop; // receiver dropped
        }
    }

    // Usage arrives in the last chunk when stream_options.include_usage is set
    if let Some(usage) = stream_resp.usage {
        let _ = tx
            .send(Ok(StreamChunk {
                content: None,
                done: true,
                usage: Some(usage.into()),
            }))
            .await;
        return Forwarded::Stop;
    }

    Forwarded::Continue
}

#[async_trait]
impl VoiceProvider for OpenAiCompatProvider {
    async fn transcribe(
        &self,
        request: TranscriptionRequest,
    ) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        debug!(
            provider = %self.name,
            model = %request.model,
            bytes = request.audio.len(),
            "Sending transcription request"
        );

        let part = reqwest::multipart::Part::bytes(request.audio)
            .file_name(request.file_name)
            .mime_str(&request.mime_type)
            .map_err(|e| ProviderError::NotConfigured(format!("Invalid MIME type: {e}")))?;

        let mut form = reqwest::multipart::Form::new()
            .text("model", request.model)
            .text("response_format", "json")
            .part("file", part);
        if let Some(language) = request.language {
            form = form.text("language", language);
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let response = self.check_status(response).await?;

        let body: TranscriptionResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse transcription: {e}"))
        })?;

        Ok(body.text.trim().to_string())
    }

    async fn synthesize(
        &self,
        request: SpeechRequest,
    ) -> std::result::Result<Vec<u8>, ProviderError> {
        let url = format!("{}/audio/speech", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "input": request.input,
            "voice": request.voice,
            "response_format": request.format,
        });
        if let Some(instructions) = &request.instructions {
            body["instructions"] = serde_json::json!(instructions);
        }

        debug!(provider = %self.name, model = %request.model, "Sending speech request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let response = self.check_status(response).await?;

        let audio = response
            .bytes()
            .await
            .map_err(|e| ProviderError::StreamInterrupted(e.to_string()))?;

        Ok(audio.to_vec())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use milim_core::Provider;

    fn request(format: ResponseFormat) -> ProviderRequest {
        ProviderRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![Message::system("rules"), Message::user("בית")],
            temperature: 0.7,
            max_tokens: Some(256),
            stream: true,
            response_format: format,
        }
    }

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test").unwrap();
        assert_eq!(provider.name(), "openai");
        assert!(provider.base_url.contains("api.openai.com"));
    }

    #[test]
    fn empty_key_is_missing_credential() {
        assert!(matches!(
            OpenAiCompatProvider::openai("  "),
            Err(ProviderError::MissingCredential)
        ));
    }

    #[test]
    fn from_config_without_key_refuses() {
        let config = AppConfig::default();
        assert!(matches!(
            OpenAiCompatProvider::from_config(&config),
            Err(ProviderError::MissingCredential)
        ));
    }

    #[test]
    fn from_config_trims_trailing_slash() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            api_url: "http://localhost:8080/v1/".into(),
            ..AppConfig::default()
        };
        let provider = OpenAiCompatProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn message_conversion() {
        let api_messages = OpenAiCompatProvider::to_api_messages(&request(ResponseFormat::Text).messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn json_mode_body() {
        let body = OpenAiCompatProvider::chat_body(&request(ResponseFormat::JsonObject), true);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_tokens"], 256);
    }

    #[test]
    fn text_mode_body_has_no_response_format() {
        let body = OpenAiCompatProvider::chat_body(&request(ResponseFormat::Text), false);
        assert!(body.get("response_format").is_none());
        assert!(body.get("stream_options").is_none());
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_stream_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"{\"categ"},"finish_reason":null}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.choices[0].delta.content.as_deref(), Some("{\"categ"));
    }

    #[test]
    fn parse_stream_finish_chunk() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("stop"));
        assert!(parsed.choices[0].delta.content.is_none());
    }

    #[test]
    fn parse_stream_usage() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        let usage = parsed.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.total_tokens, 15);
    }

    #[tokio::test]
    async fn forward_line_sends_content_then_done() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let line = SseLine::Data(r#"{"choices":[{"delta":{"content":"שלום"}}]}"#.into());
        assert!(matches!(forward_line("t", line, &tx).await, Forwarded::Continue));
        assert!(matches!(forward_line("t", SseLine::Done, &tx).await, Forwarded::Stop));

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.content.as_deref(), Some("שלום"));
        assert!(rx.recv().await.unwrap().unwrap().done);
    }

    #[tokio::test]
    async fn forward_line_ignores_garbage() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let line = SseLine::Data("not json".into());
        assert!(matches!(forward_line("t", line, &tx).await, Forwarded::Continue));
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn parse_transcription_response() {
        let parsed: TranscriptionResponse = serde_json::from_str(r#"{"text":" אני רוצה מים "}"#).unwrap();
        assert_eq!(parsed.text.trim(), "אני רוצה מים");
    }
}
