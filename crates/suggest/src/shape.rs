//! Shape normalization: turn a parsed JSON value into suggestions.
//!
//! Accepted shapes, tried in order:
//!
//! 1. `{"category": "...", "words": [...]}`
//! 2. `{"category3": "...", "words": [...]}`: exactly one category-like key,
//!    optionally suffixed with digits, plus a words array
//! 3. `{"categories": [ <1 or 2>, ... ]}`
//!
//! A top-level array of shape-1/2 objects is accepted as well.

use milim_core::StructuredSuggestion;
use serde_json::{Map, Value};

/// Normalize any accepted shape into zero or more suggestions.
pub fn normalize(value: &Value) -> Vec<StructuredSuggestion> {
    match value {
        Value::Object(obj) => {
            if let Some(single) = normalize_object(obj) {
                return vec![single];
            }
            match obj.get("categories") {
                Some(Value::Array(items)) => items.iter().filter_map(normalize_one).collect(),
                _ => Vec::new(),
            }
        }
        Value::Array(items) => items.iter().filter_map(normalize_one).collect(),
        _ => Vec::new(),
    }
}

/// Normalize a single category object (shapes 1 and 2).
pub fn normalize_one(value: &Value) -> Option<StructuredSuggestion> {
    value.as_object().and_then(normalize_object)
}

fn normalize_object(obj: &Map<String, Value>) -> Option<StructuredSuggestion> {
    direct(obj).or_else(|| numbered(obj))
}

fn direct(obj: &Map<String, Value>) -> Option<StructuredSuggestion> {
    let name = obj.get("category")?.as_str()?;
    let words = words_of(obj.get("words")?)?;
    StructuredSuggestion::new(name, words)
}

fn numbered(obj: &Map<String, Value>) -> Option<StructuredSuggestion> {
    let mut names = obj
        .iter()
        .filter(|(k, _)| is_numbered_key(k, "category"))
        .filter_map(|(_, v)| v.as_str());
    let name = names.next()?;
    if names.next().is_some() {
        return None;
    }

    let words = obj
        .get("words")
        .or_else(|| {
            obj.iter()
                .find(|(k, _)| is_numbered_key(k, "words"))
                .map(|(_, v)| v)
        })
        .and_then(words_of)?;
    StructuredSuggestion::new(name, words)
}

/// `key` is `prefix` followed by zero or more ASCII digits.
pub(crate) fn is_numbered_key(key: &str, prefix: &str) -> bool {
    key.strip_prefix(prefix)
        .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
}

/// Extract word strings from a JSON array. Numbers are stringified; other
/// element kinds are skipped.
pub(crate) fn words_of(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
    )
}
