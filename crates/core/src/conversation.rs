//! Conversation entries — the append-only log the user builds on the board.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Selected or typed by the user
    User,
    /// Produced by the model (e.g. a composed sentence)
    System,
}

/// A single entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: EntryId,
    pub text: String,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
}

impl ConversationEntry {
    /// Create a new user entry.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: EntryId::new(),
            text: text.into(),
            origin: Origin::User,
            created_at: Utc::now(),
        }
    }

    /// Create a new system entry.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            id: EntryId::new(),
            text: text.into(),
            origin: Origin::System,
            created_at: Utc::now(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.origin == Origin::User
    }

    /// The individual words of this entry, split on whitespace.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.text.split_whitespace()
    }
}
