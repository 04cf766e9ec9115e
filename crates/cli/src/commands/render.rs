//! Terminal rendering of board state.

use milim_core::{ConversationEntry, StructuredSuggestion};
use milim_suggest::{Generation, GenerationStatus, TopicGroups};

pub fn suggestion_line(suggestion: &StructuredSuggestion) -> String {
    format!("  • {}: {}", suggestion.name, suggestion.words.join(", "))
}

pub fn entry_line(index: usize, entry: &ConversationEntry) -> String {
    let who = if entry.is_user() { "אני" } else { "מערכת" };
    format!("  {index:>2}. [{who}] {}", entry.text)
}

/// Superseded generations collapse to one line; the active one is expanded.
pub fn generation_block(generation: &Generation) -> Vec<String> {
    match generation.status {
        GenerationStatus::Superseded => {
            let names: Vec<&str> = generation
                .suggestions
                .iter()
                .map(|s| s.name.as_str())
                .collect();
            vec![format!("  ({}) {}", generation.id, names.join(" · "))]
        }
        GenerationStatus::Active => generation.suggestions.iter().map(suggestion_line).collect(),
    }
}

pub fn groups_block(groups: &TopicGroups) -> Vec<String> {
    groups
        .generations()
        .iter()
        .filter(|g| !g.suggestions.is_empty())
        .flat_map(generation_block)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn s(name: &str, words: &[&str]) -> StructuredSuggestion {
        StructuredSuggestion::new(name, words).unwrap()
    }

    #[test]
    fn active_expanded_superseded_collapsed() {
        let mut groups = TopicGroups::new();
        let old = groups.begin(BTreeSet::new());
        groups.accept(old, s("ישן", &["א"]));
        let new = groups.begin(BTreeSet::new());
        groups.accept(new, s("חדש", &["ב", "ג"]));

        let lines = groups_block(&groups);
        assert_eq!(lines, vec!["  (g1) ישן".to_string(), "  • חדש: ב, ג".to_string()]);
    }

    #[test]
    fn entry_marks_origin() {
        assert!(entry_line(1, &ConversationEntry::system("x")).contains("מערכת"));
    }
}
