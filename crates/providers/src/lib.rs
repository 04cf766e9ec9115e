//! Remote model endpoints for Milim.
//!
//! `OpenAiCompatProvider` implements both `milim_core::Provider` (chat
//! completions, streamed over SSE) and `milim_core::VoiceProvider`
//! (transcription and speech synthesis). It is constructed explicitly from
//! configuration and passed to whoever needs it; there is no global client.

pub mod openai_compat;
mod sse;

pub use openai_compat::OpenAiCompatProvider;
