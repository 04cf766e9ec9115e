//! Resilient stream decoder.
//!
//! Feeds on text deltas of a response that should eventually be one JSON
//! object and yields suggestions as soon as they are recoverable. Two paths
//! run on every chunk:
//!
//! - **Brace path**: brace depth is tracked over the whole accumulated text
//!   (string literals excluded). Whenever an object opened at depth 1 or 2
//!   closes, its span is parsed strictly, then again after [`repair`]; a span
//!   that still fails is dropped. Depth 2 widens the usual root-only rule so
//!   each element of a `categories` array surfaces as soon as it closes.
//! - **Pattern path**: [`fallback::scan`] over the full text.
//!
//! When the stream ends, [`SuggestionDecoder::finish`] parses the whole
//! response once more. Output may repeat names across calls; deduplication is
//! the [`Merger`](crate::merger::Merger)'s job.

use milim_core::StructuredSuggestion;
use serde_json::Value;
use tracing::trace;

use crate::{fallback, repair, shape};

/// Objects opened at this depth or shallower are parse candidates: the root
/// object and its direct children (elements of a `categories` array).
const MAX_CANDIDATE_DEPTH: usize = 2;

/// Per-query decoder state. Not restartable; create one per query.
#[derive(Debug, Default)]
pub struct SuggestionDecoder {
    raw: String,
    scanned: usize,
    open: Vec<usize>,
    in_string: bool,
    escaped: bool,
}

impl SuggestionDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Current brace nesting depth.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Append a chunk and return every suggestion recoverable so far.
    pub fn push(&mut self, chunk: &str) -> Vec<StructuredSuggestion> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.raw.push_str(chunk);

        let mut found: Vec<StructuredSuggestion> = self
            .closed_spans()
            .into_iter()
            .flat_map(|(start, end)| parse_span(&self.raw[start..end]))
            .collect();
        found.extend(fallback::scan(&self.raw));
        found
    }

    /// Final whole-text parse once the stream has ended.
    pub fn finish(self) -> Vec<StructuredSuggestion> {
        let body = strip_code_fence(self.raw.trim());
        if body.is_empty() {
            return Vec::new();
        }

        if let Some(value) = parse_lenient(body) {
            return shape::normalize(&value);
        }

        // Leading or trailing chatter around the object
        match (body.find('{'), body.rfind('}')) {
            (Some(start), Some(end)) if start < end => parse_lenient(&body[start..=end])
                .map(|value| shape::normalize(&value))
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Advance the brace scanner over unseen text, returning the byte ranges
    /// of candidate objects that closed.
    fn closed_spans(&mut self) -> Vec<(usize, usize)> {
        let Self {
            raw,
            scanned,
            open,
            in_string,
            escaped,
        } = self;

        let mut spans = Vec::new();
        for (offset, c) in raw[*scanned..].char_indices() {
            let at = *scanned + offset;

            if *in_string {
                if *escaped {
                    *escaped = false;
                } else if c == '\\' {
                    *escaped = true;
                } else if c == '"' {
                    *in_string = false;
                }
                continue;
            }

            match c {
                '"' => *in_string = true,
                '{' => open.push(at),
                '}' => {
                    // A stray closer with nothing open is ignored
                    if let Some(start) = open.pop() {
                        if open.len() < MAX_CANDIDATE_DEPTH {
                            spans.push((start, at + 1));
                        }
                    }
                }
                _ => {}
            }
        }
        *scanned = raw.len();
        spans
    }
}

/// Strict parse, then parse after the forgiving rewrites.
pub(crate) fn parse_lenient(text: &str) -> Option<Value> {
    serde_json::from_str(text)
        .ok()
        .or_else(|| serde_json::from_str(&repair::repair(text)).ok())
}

fn parse_span(span: &str) -> Vec<StructuredSuggestion> {
    match parse_lenient(span) {
        Some(value) => shape::normalize(&value),
        None => {
            trace!(len = span.len(), "Dropping unparseable object span");
            Vec::new()
        }
    }
}

/// Remove a surrounding Markdown code fence (```json ... ```).
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
