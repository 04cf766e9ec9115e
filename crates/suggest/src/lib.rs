//! Suggestion pipeline for Milim.
//!
//! A query flows through these stages:
//!
//! 1. **Session** records the user's utterance and opens a new generation
//! 2. **Engine** streams the model response for that generation
//! 3. **Decoder** reconstructs categories from the partial JSON as it arrives,
//!    tolerating unquoted keys and values and falling back to pattern
//!    matching when the structure never closes
//! 4. **Merger** lets each category name through once
//! 5. **Lifecycle** filters out words the user already used and files the
//!    result under its generation, superseded or not
//!
//! Voice playback and transcription live alongside in [`voice`].

pub mod decoder;
pub mod engine;
pub mod fallback;
pub mod lifecycle;
pub mod merger;
pub mod notice;
pub mod prompt;
pub mod repair;
pub mod session;
pub mod shape;
pub mod voice;

pub use decoder::SuggestionDecoder;
pub use engine::{QueryEvent, SuggestionEngine};
pub use lifecycle::{Generation, GenerationId, GenerationStatus, TopicGroups};
pub use merger::Merger;
pub use notice::{Notice, NoticeKind};
pub use prompt::PromptSettings;
pub use session::{QueryTicket, Session, SessionState};
pub use voice::{AudioSink, FileSink, Playback, VoicePlayer, VoiceSettings};
