//! Saved conversations.
//!
//! All histories live as one JSON array under [`HISTORIES_KEY`], most
//! recently updated first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use milim_core::error::StoreError;
use milim_core::{ConversationEntry, KeyValueStore};
use milim_suggest::{Session, TopicGroups};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::json;

pub const HISTORIES_KEY: &str = "milim.histories";

/// Title used when a conversation has no user entry yet.
pub const UNTITLED: &str = "שיחה חדשה";

const TITLE_MAX_CHARS: usize = 40;

/// One saved conversation with its suggestion snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub entries: Vec<ConversationEntry>,
    #[serde(default)]
    pub topic_groups: TopicGroups,
}

impl ConversationHistory {
    /// Snapshot a session as a brand-new history.
    pub fn from_session(session: &Session) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title_for(session.entries()),
            created_at: now,
            updated_at: now,
            entries: session.entries().to_vec(),
            topic_groups: session.groups().clone(),
        }
    }

    /// Replace this history's content with the session's current state.
    pub fn update_from(&mut self, session: &Session) {
        self.title = title_for(session.entries());
        self.entries = session.entries().to_vec();
        self.topic_groups = session.groups().clone();
        self.updated_at = Utc::now();
    }

    /// Resume the conversation.
    pub fn to_session(&self) -> Session {
        Session::restore(self.entries.clone(), self.topic_groups.clone())
    }

    /// Text of every user entry, in order.
    pub fn selected_words(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.is_user())
            .map(|e| e.text.as_str())
    }
}

/// The first user entry, shortened; falls back to [`UNTITLED`].
pub fn title_for(entries: &[ConversationEntry]) -> String {
    let Some(first) = entries.iter().find(|e| e.is_user()) else {
        return UNTITLED.to_string();
    };
    let text = first.text.trim();
    if text.chars().count() <= TITLE_MAX_CHARS {
        return text.to_string();
    }
    let mut title: String = text.chars().take(TITLE_MAX_CHARS).collect();
    title.push('…');
    title
}

/// Reads and writes histories through a key-value store.
pub struct HistoryRepository {
    store: Arc<dyn KeyValueStore>,
}

impl HistoryRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Most recently updated first. Unreadable data reads as empty.
    pub async fn list(&self) -> Vec<ConversationHistory> {
        json::load_or_default(self.store.as_ref(), HISTORIES_KEY).await
    }

    pub async fn get(&self, id: &str) -> Option<ConversationHistory> {
        self.list().await.into_iter().find(|h| h.id == id)
    }

    /// Insert or replace by id, moving it to the front.
    pub async fn upsert(&self, history: ConversationHistory) -> Result<(), StoreError> {
        let mut all = self.list().await;
        all.retain(|h| h.id != history.id);
        debug!(id = %history.id, entries = history.entries.len(), "Saving history");
        all.insert(0, history);
        json::save(self.store.as_ref(), HISTORIES_KEY, &all).await
    }

    /// Returns whether a history was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut all = self.list().await;
        let before = all.len();
        all.retain(|h| h.id != id);
        if all.len() == before {
            return Ok(false);
        }
        json::save(self.store.as_ref(), HISTORIES_KEY, &all).await?;
        info!(id, "History deleted");
        Ok(true)
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(HISTORIES_KEY).await
    }
}
