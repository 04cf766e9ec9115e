//! Pattern-based recovery over the whole accumulated response.
//!
//! Brace matching only yields a suggestion once its object closes cleanly.
//! Some streams never balance until the very end, so on every chunk the full
//! text is also scanned for `"category": "..."` pairs and `"words": [...]`
//! arrays. Each category is paired with the first words array that follows it
//! and starts before the next category.
//!
//! A words array only counts once its closing `]` has arrived; brackets inside
//! quoted items do not close it. Arrays whose items cannot be read, or that hold
//! no words, are skipped so a later chunk can still complete the category.

use std::sync::LazyLock;

use milim_core::StructuredSuggestion;
use regex_lite::Regex;

use crate::repair;
use crate::shape::words_of;

static CATEGORY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""category\d*"\s*:\s*"((?:[^"\\]|\\.)*)""#).ok());

static WORDS_OPEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""words\d*"\s*:\s*\["#).ok());

static QUOTED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).ok());

struct CategoryMatch {
    start: usize,
    end: usize,
    name: String,
}

struct WordsMatch {
    start: usize,
    words: Vec<String>,
}

/// Recover every category/words pairing present in `text`.
pub fn scan(text: &str) -> Vec<StructuredSuggestion> {
    let (Some(category_re), Some(words_re)) = (CATEGORY.as_ref(), WORDS_OPEN.as_ref()) else {
        return Vec::new();
    };

    let categories: Vec<CategoryMatch> = category_re
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(CategoryMatch {
                start: whole.start(),
                end: whole.end(),
                name: unescape(caps.get(1)?.as_str()),
            })
        })
        .collect();

    if categories.is_empty() {
        return Vec::new();
    }

    let words: Vec<WordsMatch> = words_re
        .find_iter(text)
        .filter_map(|open| {
            let inner_end = array_end(&text[open.end()..])?;
            let words = parse_items(&text[open.end()..open.end() + inner_end])?;
            Some(WordsMatch {
                start: open.start(),
                words,
            })
        })
        .collect();

    categories
        .iter()
        .enumerate()
        .filter_map(|(i, cat)| {
            let limit = categories.get(i + 1).map_or(usize::MAX, |next| next.start);
            let list = words
                .iter()
                .find(|w| w.start >= cat.end && w.start < limit)?;
            StructuredSuggestion::new(&cat.name, &list.words)
        })
        .collect()
}

fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}

/// Byte offset of the `]` closing an array whose `[` precedes `rest`.
///
/// Quoted items are skipped whole, so `"[א]"` does not end the array. `None`
/// while the closer has not arrived yet.
fn array_end(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (at, c) in rest.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' if depth == 0 => return Some(at),
            ']' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Parse the inside of a `[...]` literal into words. `None` when nothing
/// usable can be read from it.
fn parse_items(inner: &str) -> Option<Vec<String>> {
    let literal = format!("[{inner}]");
    let parsed = serde_json::from_str::<serde_json::Value>(&literal)
        .ok()
        .or_else(|| serde_json::from_str(&repair::repair(&literal)).ok());

    let words = match parsed.as_ref().and_then(words_of) {
        Some(words) => words,
        None => QUOTED.as_ref().map(|re| {
            re.captures_iter(inner)
                .filter_map(|caps| caps.get(1).map(|m| unescape(m.as_str())))
                .collect::<Vec<_>>()
        })?,
    };
    let words: Vec<String> = words.into_iter().filter(|w| !w.trim().is_empty()).collect();
    (!words.is_empty()).then_some(words)
}
