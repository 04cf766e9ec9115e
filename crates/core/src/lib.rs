//! # Milim Core
//!
//! Domain types, traits, and error definitions for Milim, a Hebrew
//! word-board (AAC) assistant backed by a remote language model.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here. Implementations
//! live in their respective crates:
//! - `Provider` / `VoiceProvider` — `milim-providers`
//! - `KeyValueStore` — `milim-store`
//!
//! The suggestion pipeline in `milim-suggest` only ever sees these traits,
//! so tests can script a provider without touching the network.

pub mod conversation;
pub mod error;
pub mod message;
pub mod provider;
pub mod store;
pub mod suggestion;

// Re-export key types at crate root for ergonomics
pub use conversation::{ConversationEntry, EntryId, Origin};
pub use error::{Error, ProviderError, Result, SessionError, StoreError, VoiceError};
pub use message::{Message, Role};
pub use provider::{
    Provider, ProviderRequest, ProviderResponse, ResponseFormat, SpeechRequest, StreamChunk,
    TranscriptionRequest, VoiceProvider,
};
pub use store::KeyValueStore;
pub use suggestion::StructuredSuggestion;
