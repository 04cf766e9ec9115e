//! Speech playback and transcription.
//!
//! At most one audio operation runs at a time. A request made while another
//! is active fails immediately with [`VoiceError::Busy`] instead of queueing.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use milim_config::AppConfig;
use milim_core::{SpeechRequest, TranscriptionRequest, VoiceError, VoiceProvider};
use tokio::sync::{Semaphore, oneshot};
use tracing::{debug, info, warn};

/// Where synthesized audio goes.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play (or store) the audio, returning once playback has ended.
    async fn play(&self, audio: Vec<u8>, format: &str) -> Result<(), VoiceError>;
}

/// Writes each clip to a file in a directory.
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the most recently written clip for a given format.
    pub fn clip_path(&self, format: &str) -> PathBuf {
        self.dir.join(format!("speech.{format}"))
    }
}

#[async_trait]
impl AudioSink for FileSink {
    async fn play(&self, audio: Vec<u8>, format: &str) -> Result<(), VoiceError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| VoiceError::Playback(e.to_string()))?;
        let path = self.clip_path(format);
        tokio::fs::write(&path, &audio)
            .await
            .map_err(|e| VoiceError::Playback(e.to_string()))?;
        info!(path = %path.display(), bytes = audio.len(), "Speech written");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct VoiceSettings {
    pub transcription_model: String,
    pub speech_model: String,
    pub voice: String,
    pub instructions: Option<String>,
    pub format: String,
    pub language: Option<String>,
}

impl VoiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let v = &config.voice;
        Self {
            transcription_model: v.transcription_model.clone(),
            speech_model: v.speech_model.clone(),
            voice: v.voice.clone(),
            instructions: Some(v.instructions.clone()).filter(|s| !s.trim().is_empty()),
            format: v.audio_format.clone(),
            language: Some(config.language.clone()).filter(|s| !s.is_empty()),
        }
    }
}

/// Completion signal for one stage of playback.
pub struct Signal(oneshot::Receiver<Result<(), VoiceError>>);

impl Signal {
    pub async fn wait(self) -> Result<(), VoiceError> {
        self.0
            .await
            .unwrap_or_else(|_| Err(VoiceError::Playback("playback task dropped".into())))
    }
}

/// Handle to a started playback.
///
/// `ready` resolves once audio is available (or synthesis failed);
/// `finished` resolves after playback ends, with the same error if any stage
/// failed.
pub struct Playback {
    pub ready: Signal,
    pub finished: Signal,
}

pub struct VoicePlayer {
    provider: Arc<dyn VoiceProvider>,
    sink: Arc<dyn AudioSink>,
    settings: VoiceSettings,
    slot: Arc<Semaphore>,
}

impl VoicePlayer {
    pub fn new(
        provider: Arc<dyn VoiceProvider>,
        sink: Arc<dyn AudioSink>,
        settings: VoiceSettings,
    ) -> Self {
        Self {
            provider,
            sink,
            settings,
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }

    /// Synthesize `text` and play it in the background.
    pub fn speak(&self, text: &str) -> Result<Playback, VoiceError> {
        let permit = Arc::clone(&self.slot)
            .try_acquire_owned()
            .map_err(|_| VoiceError::Busy)?;

        let request = SpeechRequest {
            model: self.settings.speech_model.clone(),
            input: text.to_string(),
            voice: self.settings.voice.clone(),
            instructions: self.settings.instructions.clone(),
            format: self.settings.format.clone(),
        };
        let provider = Arc::clone(&self.provider);
        let sink = Arc::clone(&self.sink);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (finished_tx, finished_rx) = oneshot::channel();

        tokio::spawn(async move {
            let format = request.format.clone();
            debug!(chars = request.input.chars().count(), "Synthesizing speech");

            let audio = match provider.synthesize(request).await {
                Ok(audio) => audio,
                Err(e) => {
                    warn!(error = %e, "Speech synthesis failed");
                    let err = VoiceError::Provider(e);
                    drop(permit);
                    let _ = ready_tx.send(Err(err.clone()));
                    let _ = finished_tx.send(Err(err));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            let result = sink.play(audio, &format).await;
            if let Err(ref e) = result {
                warn!(error = %e, "Playback failed");
            }
            drop(permit);
            let _ = finished_tx.send(result);
        });

        Ok(Playback {
            ready: Signal(ready_rx),
            finished: Signal(finished_rx),
        })
    }

    /// Transcribe one recorded clip. Holds the audio slot for the duration.
    pub async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<String, VoiceError> {
        let _permit = self.slot.try_acquire().map_err(|_| VoiceError::Busy)?;
        let request = TranscriptionRequest {
            model: self.settings.transcription_model.clone(),
            file_name: format!("recording.{}", extension_for(mime_type)),
            audio,
            mime_type: mime_type.to_string(),
            language: self.settings.language.clone(),
        };
        let text = self.provider.transcribe(request).await?;
        Ok(text.trim().to_string())
    }
}

/// File extension for an audio MIME type, ignoring codec parameters.
pub fn extension_for(mime_type: &str) -> &str {
    let base = mime_type.split(';').next().unwrap_or_default().trim();
    match base {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/ogg" => "ogg",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/flac" => "flac",
        _ => "webm",
    }
}

/// MIME type for a file extension, the inverse of [`extension_for`].
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" | "mp4" => "audio/mp4",
        "flac" => "audio/flac",
        _ => "audio/webm",
    }
}
