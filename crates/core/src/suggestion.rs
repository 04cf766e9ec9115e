//! Structured suggestions — a named group of words proposed by the model.

use serde::{Deserialize, Serialize};

/// A "category": a non-empty name plus the words suggested under it.
///
/// Within one generation a name is surfaced at most once; the word order is
/// the order the model produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredSuggestion {
    pub name: String,
    #[serde(default)]
    pub words: Vec<String>,
}

impl StructuredSuggestion {
    /// Build a suggestion, trimming the name and dropping blank words.
    ///
    /// Returns `None` when the name is blank.
    pub fn new<I, S>(name: impl AsRef<str>, words: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return None;
        }
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        Some(Self {
            name: name.to_string(),
            words,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_and_filters() {
        let s = StructuredSuggestion::new(" משפחה ", ["אמא", " ", " אבא "]).unwrap();
        assert_eq!(s.name, "משפחה");
        assert_eq!(s.words, vec!["אמא", "אבא"]);
    }

    #[test]
    fn blank_name_rejected() {
        assert!(StructuredSuggestion::new("  ", ["x"]).is_none());
    }
}
