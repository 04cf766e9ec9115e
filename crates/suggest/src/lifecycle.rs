//! Topic group lifecycle.
//!
//! Every suggestion query opens a new [`Generation`]. Starting one demotes
//! the currently active generation to `Superseded` in the same `&mut self`
//! call, so exactly one generation is ever active. Superseded generations are
//! kept (rendered collapsed) until [`TopicGroups::reset`].
//!
//! Words the user already used are filtered out of each suggestion against the
//! snapshot taken when the generation began; later user words do not affect
//! suggestions still arriving for it.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use milim_core::StructuredSuggestion;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identifier of one suggestion query cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenerationId(pub u64);

impl std::fmt::Display for GenerationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Active,
    Superseded,
}

/// The suggestions produced by one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub id: GenerationId,
    pub status: GenerationStatus,
    pub started_at: DateTime<Utc>,
    /// User words as of the moment the query was requested
    pub excluded_words: BTreeSet<String>,
    pub suggestions: Vec<StructuredSuggestion>,
    /// The generation this one superseded, restored if this one is abandoned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_active: Option<GenerationId>,
}

impl Generation {
    pub fn is_active(&self) -> bool {
        self.status == GenerationStatus::Active
    }
}

/// All generations of one conversation, oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicGroups {
    generations: Vec<Generation>,
    next_id: u64,
}

impl TopicGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new active generation, superseding the current one.
    pub fn begin(&mut self, excluded_words: BTreeSet<String>) -> GenerationId {
        let mut previous_active = None;
        for generation in &mut self.generations {
            if generation.is_active() {
                generation.status = GenerationStatus::Superseded;
                previous_active = Some(generation.id);
            }
        }

        self.next_id += 1;
        let id = GenerationId(self.next_id);
        self.generations.push(Generation {
            id,
            status: GenerationStatus::Active,
            started_at: Utc::now(),
            excluded_words,
            suggestions: Vec::new(),
            previous_active,
        });
        debug!(generation = %id, superseded = ?previous_active, "Generation started");
        id
    }

    /// Add a suggestion to the generation it was requested for.
    ///
    /// Already-used words are removed first. Returns the stored suggestion, or
    /// `None` when the generation no longer exists, the name is already
    /// present, or no words survive filtering.
    pub fn accept(
        &mut self,
        id: GenerationId,
        suggestion: StructuredSuggestion,
    ) -> Option<&StructuredSuggestion> {
        let generation = self.generations.iter_mut().find(|g| g.id == id)?;
        if generation.suggestions.iter().any(|s| s.name == suggestion.name) {
            return None;
        }

        let filtered = filter_used_words(suggestion, &generation.excluded_words);
        if filtered.words.is_empty() {
            debug!(generation = %id, name = %filtered.name, "Suggestion had no unused words");
            return None;
        }

        generation.suggestions.push(filtered);
        generation.suggestions.last()
    }

    /// Drop a generation whose query failed. If it was the active one, the
    /// generation it superseded becomes active again.
    pub fn abandon(&mut self, id: GenerationId) -> bool {
        let Some(index) = self.generations.iter().position(|g| g.id == id) else {
            return false;
        };
        let removed = self.generations.remove(index);

        if removed.is_active() {
            if let Some(previous) = removed
                .previous_active
                .and_then(|p| self.generations.iter_mut().find(|g| g.id == p))
            {
                previous.status = GenerationStatus::Active;
            }
        }
        true
    }

    /// Discard every generation.
    pub fn reset(&mut self) {
        self.generations.clear();
    }

    pub fn active(&self) -> Option<&Generation> {
        self.generations.iter().find(|g| g.is_active())
    }

    pub fn superseded(&self) -> impl Iterator<Item = &Generation> {
        self.generations.iter().filter(|g| !g.is_active())
    }

    pub fn get(&self, id: GenerationId) -> Option<&Generation> {
        self.generations.iter().find(|g| g.id == id)
    }

    pub fn status_of(&self, id: GenerationId) -> Option<GenerationStatus> {
        self.get(id).map(|g| g.status)
    }

    /// Oldest first.
    pub fn generations(&self) -> &[Generation] {
        &self.generations
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// Every suggested word across all generations, in order.
    pub fn all_words(&self) -> impl Iterator<Item = &str> {
        self.generations
            .iter()
            .flat_map(|g| g.suggestions.iter())
            .flat_map(|s| s.words.iter().map(String::as_str))
    }
}

/// Remove words that exactly match (no case folding) an excluded word.
pub fn filter_used_words(
    mut suggestion: StructuredSuggestion,
    excluded: &BTreeSet<String>,
) -> StructuredSuggestion {
    suggestion.words.retain(|w| !excluded.contains(w));
    suggestion
}
