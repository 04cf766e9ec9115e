//! Conversation and staging state machine.
//!
//! States (derived, never stored):
//! - `AwaitingSuggestions` while the latest query is in flight
//! - `Staging` while the staging buffer holds words
//! - `Idle` otherwise
//!
//! The staging buffer is only emptied by commit, cancel or reset. Submitting a
//! topic in the middle of staging leaves the staged words in place, so the
//! session falls back to `Staging` once that query finishes.
//!
//! Every transition into `AwaitingSuggestions` opens a new generation and
//! returns a [`QueryTicket`]; the caller runs exactly one query for it and
//! reports back with [`Session::apply`] or [`Session::finish_query`].

use std::collections::BTreeSet;

use milim_core::{ConversationEntry, EntryId, ProviderError, SessionError, StructuredSuggestion};
use tracing::{debug, warn};

use crate::engine::QueryEvent;
use crate::lifecycle::{GenerationId, TopicGroups};
use crate::notice::Notice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingSuggestions,
    Staging,
}

/// Everything a suggestion query needs, captured when it was requested.
#[derive(Debug, Clone)]
pub struct QueryTicket {
    pub generation: GenerationId,
    pub transcript: Vec<ConversationEntry>,
    pub used_words: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct Session {
    entries: Vec<ConversationEntry>,
    staging: Vec<String>,
    groups: TopicGroups,
    pending: Option<GenerationId>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a session from a saved history.
    pub fn restore(entries: Vec<ConversationEntry>, groups: TopicGroups) -> Self {
        Self {
            entries,
            staging: Vec::new(),
            groups,
            pending: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.pending.is_some() {
            SessionState::AwaitingSuggestions
        } else if !self.staging.is_empty() {
            SessionState::Staging
        } else {
            SessionState::Idle
        }
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn staging(&self) -> &[String] {
        &self.staging
    }

    pub fn groups(&self) -> &TopicGroups {
        &self.groups
    }

    /// The query currently considered authoritative, if any.
    pub fn pending(&self) -> Option<GenerationId> {
        self.pending
    }

    /// Words the user already put into the conversation: each user entry's
    /// full text and its whitespace-separated words.
    pub fn used_words(&self) -> BTreeSet<String> {
        let mut used = BTreeSet::new();
        for entry in self.entries.iter().filter(|e| e.is_user()) {
            used.insert(entry.text.clone());
            used.extend(entry.words().map(str::to_string));
        }
        used
    }

    /// Submit a typed topic. Staged words are left untouched.
    pub fn submit_topic(&mut self, text: &str) -> Result<QueryTicket, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyText);
        }
        self.entries.push(ConversationEntry::user(text));
        Ok(self.begin_query())
    }

    /// Select a suggested word as a whole utterance.
    pub fn select_word(&mut self, word: &str) -> Result<QueryTicket, SessionError> {
        self.submit_topic(word)
    }

    /// Add a word to the staging buffer.
    pub fn stage_word(&mut self, word: &str) -> Result<(), SessionError> {
        let word = word.trim();
        if word.is_empty() {
            return Err(SessionError::EmptyText);
        }
        self.staging.push(word.to_string());
        Ok(())
    }

    /// Remove the most recently staged word.
    pub fn unstage_last(&mut self) -> Option<String> {
        self.staging.pop()
    }

    /// Commit the staged words as one user entry, joined by single spaces.
    pub fn commit_staging(&mut self) -> Result<QueryTicket, SessionError> {
        if self.staging.is_empty() {
            return Err(SessionError::NothingStaged);
        }
        let text = std::mem::take(&mut self.staging).join(" ");
        self.entries.push(ConversationEntry::user(text));
        Ok(self.begin_query())
    }

    pub fn cancel_staging(&mut self) {
        self.staging.clear();
    }

    /// Remove a user entry. System entries cannot be removed.
    pub fn remove_entry(&mut self, id: &EntryId) -> Result<ConversationEntry, SessionError> {
        let index = self
            .entries
            .iter()
            .position(|e| &e.id == id)
            .ok_or_else(|| SessionError::EntryNotFound(id.to_string()))?;
        if !self.entries[index].is_user() {
            return Err(SessionError::NotRemovable(id.to_string()));
        }
        Ok(self.entries.remove(index))
    }

    /// Append a model-produced entry (e.g. a composed sentence).
    pub fn append_system(&mut self, text: impl Into<String>) -> &ConversationEntry {
        self.entries.push(ConversationEntry::system(text));
        &self.entries[self.entries.len() - 1]
    }

    /// Route a suggestion to the generation it was requested for.
    pub fn accept(
        &mut self,
        generation: GenerationId,
        suggestion: StructuredSuggestion,
    ) -> Option<&StructuredSuggestion> {
        self.groups.accept(generation, suggestion)
    }

    /// Close out a query.
    ///
    /// A failure of the in-flight query drops its generation and returns a
    /// notice. A failure of an already superseded query is only logged; its
    /// generation keeps whatever suggestions it surfaced.
    pub fn finish_query(
        &mut self,
        generation: GenerationId,
        outcome: Result<usize, ProviderError>,
    ) -> Option<Notice> {
        let was_pending = self.pending == Some(generation);
        if was_pending {
            self.pending = None;
        }

        match outcome {
            Ok(count) => {
                debug!(generation = %generation, count, "Suggestion query finished");
                None
            }
            Err(err) => {
                if !was_pending {
                    debug!(generation = %generation, error = %err, "Superseded query failed");
                    return None;
                }
                warn!(generation = %generation, error = %err, "Suggestion query failed");
                self.groups.abandon(generation);
                Some(Notice::from_provider_error(&err))
            }
        }
    }

    /// Apply an event coming from a spawned query.
    pub fn apply(&mut self, event: QueryEvent) -> Option<Notice> {
        match event {
            QueryEvent::Suggestion {
                generation,
                suggestion,
            } => {
                self.accept(generation, suggestion);
                None
            }
            QueryEvent::Finished {
                generation,
                outcome,
            } => self.finish_query(generation, outcome),
        }
    }

    /// Start over: entries, staging and every generation are discarded.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.staging.clear();
        self.groups.reset();
        self.pending = None;
    }

    fn begin_query(&mut self) -> QueryTicket {
        let used_words = self.used_words();
        let generation = self.groups.begin(used_words.clone());
        self.pending = Some(generation);
        QueryTicket {
            generation,
            transcript: self.entries.clone(),
            used_words,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::GenerationStatus;

    fn s(name: &str, words: &[&str]) -> StructuredSuggestion {
        StructuredSuggestion::new(name, words).unwrap()
    }

    #[test]
    fn new_session_is_idle() {
        assert_eq!(Session::new().state(), SessionState::Idle);
    }

    #[test]
    fn submit_topic_awaits_then_returns_to_idle() {
        let mut session = Session::new();
        let ticket = session.submit_topic("אוכל").unwrap();
        assert_eq!(session.state(), SessionState::AwaitingSuggestions);
        assert_eq!(ticket.transcript.len(), 1);
        assert!(ticket.used_words.contains("אוכל"));

        assert!(session.finish_query(ticket.generation, Ok(3)).is_none());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn blank_topic_rejected() {
        let mut session = Session::new();
        assert_eq!(session.submit_topic("   ").unwrap_err(), SessionError::EmptyText);
        assert!(session.entries().is_empty());
    }

    #[test]
    fn commit_joins_staged_words() {
        let mut session = Session::new();
        for w in ["אחד", "שתים", "שלוש"] {
            session.stage_word(w).unwrap();
        }
        assert_eq!(session.state(), SessionState::Staging);

        let ticket = session.commit_staging().unwrap();
        assert_eq!(session.entries().len(), 1);
        assert_eq!(session.entries()[0].text, "אחד שתים שלוש");
        assert!(session.staging().is_empty());
        assert_eq!(session.state(), SessionState::AwaitingSuggestions);
        assert_eq!(ticket.transcript[0].text, "אחד שתים שלוש");
    }

    #[test]
    fn commit_with_nothing_staged_fails() {
        let mut session = Session::new();
        assert_eq!(session.commit_staging().unwrap_err(), SessionError::NothingStaged);
        assert!(session.groups().is_empty());
    }

    #[test]
    fn cancel_staging_appends_nothing() {
        let mut session = Session::new();
        session.stage_word("מים").unwrap();
        session.cancel_staging();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.entries().is_empty());
    }

    #[test]
    fn submit_from_staging_keeps_buffer() {
        let mut session = Session::new();
        session.stage_word("מים").unwrap();
        let ticket = session.submit_topic("טיול").unwrap();
        assert_eq!(session.staging(), ["מים"]);
        assert_eq!(session.state(), SessionState::AwaitingSuggestions);

        session.finish_query(ticket.generation, Ok(0));
        assert_eq!(session.state(), SessionState::Staging);
    }

    #[test]
    fn selecting_a_word_while_staging_keeps_staged_words() {
        let mut session = Session::new();
        session.stage_word("אני").unwrap();
        session.stage_word("רוצה").unwrap();
        session.select_word("מים").unwrap();

        assert_eq!(session.staging(), ["אני", "רוצה"]);
        assert_eq!(session.entries().last().unwrap().text, "מים");
        session.commit_staging().unwrap();
        assert_eq!(session.entries().last().unwrap().text, "אני רוצה");
    }

    #[test]
    fn only_user_entries_removable() {
        let mut session = Session::new();
        session.submit_topic("בית").unwrap();
        let user_id = session.entries()[0].id.clone();
        let system_id = session.append_system("משפט").id.clone();

        assert_eq!(
            session.remove_entry(&system_id).unwrap_err(),
            SessionError::NotRemovable(system_id.to_string())
        );
        assert_eq!(session.remove_entry(&user_id).unwrap().text, "בית");
        assert!(matches!(
            session.remove_entry(&user_id),
            Err(SessionError::EntryNotFound(_))
        ));
    }

    #[test]
    fn removal_is_allowed_while_awaiting() {
        let mut session = Session::new();
        session.submit_topic("בית").unwrap();
        let id = session.entries()[0].id.clone();
        session.remove_entry(&id).unwrap();
        assert_eq!(session.state(), SessionState::AwaitingSuggestions);
    }

    #[test]
    fn used_words_include_split_entries() {
        let mut session = Session::new();
        session.submit_topic("בית").unwrap();
        session.stage_word("ילד").unwrap();
        session.stage_word("קטן").unwrap();
        let ticket = session.commit_staging().unwrap();
        let expected: BTreeSet<String> =
            ["בית", "ילד", "קטן", "ילד קטן"].iter().map(|w| w.to_string()).collect();
        assert_eq!(ticket.used_words, expected);

        session.append_system("משפט מערכת");
        assert!(!session.used_words().contains("משפט"));
    }

    #[test]
    fn accepted_suggestions_filtered_by_ticket_snapshot() {
        let mut session = Session::new();
        session.submit_topic("בית").unwrap();
        let ticket = session.submit_topic("ילד").unwrap();
        let stored = session
            .accept(ticket.generation, s("משפחה", &["בית", "גן", "ילד", "אמא"]))
            .unwrap();
        assert_eq!(stored.words, vec!["גן", "אמא"]);
    }

    #[test]
    fn new_query_supersedes_and_late_results_stay_superseded() {
        let mut session = Session::new();
        let first = session.submit_topic("א").unwrap();
        session.accept(first.generation, s("x", &["1"]));
        let second = session.submit_topic("ב").unwrap();

        // the first query completes late
        session.accept(first.generation, s("y", &["2"]));
        assert!(session.finish_query(first.generation, Ok(2)).is_none());
        assert_eq!(session.state(), SessionState::AwaitingSuggestions);
        assert_eq!(
            session.groups().status_of(first.generation),
            Some(GenerationStatus::Superseded)
        );
        assert_eq!(session.groups().active().unwrap().id, second.generation);
    }

    #[test]
    fn failure_returns_to_idle_with_notice_and_no_suggestions() {
        let mut session = Session::new();
        let first = session.submit_topic("א").unwrap();
        session.accept(first.generation, s("x", &["1"]));
        session.finish_query(first.generation, Ok(1));

        let second = session.submit_topic("ב").unwrap();
        session.accept(second.generation, s("y", &["2"]));
        let notice = session
            .finish_query(second.generation, Err(ProviderError::Network("down".into())))
            .unwrap();
        assert_eq!(notice.kind, crate::notice::NoticeKind::Transport);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.groups().get(second.generation).is_none());
        assert_eq!(session.groups().active().unwrap().id, first.generation);
    }

    #[test]
    fn stale_failure_is_silent() {
        let mut session = Session::new();
        let first = session.submit_topic("א").unwrap();
        let _second = session.submit_topic("ב").unwrap();
        let notice = session.finish_query(first.generation, Err(ProviderError::Network("x".into())));
        assert!(notice.is_none());
        assert_eq!(session.state(), SessionState::AwaitingSuggestions);
    }

    #[test]
    fn stale_failure_keeps_superseded_suggestions() {
        let mut session = Session::new();
        let first = session.submit_topic("א").unwrap();
        session.accept(first.generation, s("x", &["1"]));
        let second = session.submit_topic("ב").unwrap();

        session.finish_query(first.generation, Err(ProviderError::Network("late".into())));
        assert_eq!(
            session.groups().status_of(first.generation),
            Some(GenerationStatus::Superseded)
        );
        assert_eq!(session.groups().get(first.generation).unwrap().suggestions[0].name, "x");
        assert_eq!(session.groups().active().unwrap().id, second.generation);
    }

    #[test]
    fn apply_routes_events() {
        let mut session = Session::new();
        let ticket = session.submit_topic("ים").unwrap();
        session.apply(QueryEvent::Suggestion {
            generation: ticket.generation,
            suggestion: s("חוף", &["חול", "גלים"]),
        });
        session.apply(QueryEvent::Finished {
            generation: ticket.generation,
            outcome: Ok(1),
        });
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.groups().active().unwrap().suggestions.len(), 1);
    }

    #[test]
    fn reset_discards_all_generations() {
        let mut session = Session::new();
        let ticket = session.submit_topic("א").unwrap();
        session.accept(ticket.generation, s("x", &["1"]));
        session.reset();
        assert!(session.entries().is_empty());
        assert!(session.groups().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.accept(ticket.generation, s("late", &["1"])).is_none());
    }
}
