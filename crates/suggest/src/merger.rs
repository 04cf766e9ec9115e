//! Category deduplication.
//!
//! The decoder reconstructs the same category many times (brace path,
//! pattern path, final parse). The merger lets each name through once per
//! generation and invokes its observer synchronously for the first sighting.

use std::collections::HashSet;

use milim_core::StructuredSuggestion;

pub struct Merger<F>
where
    F: FnMut(StructuredSuggestion),
{
    seen: HashSet<String>,
    order: Vec<String>,
    observer: F,
}

impl<F> Merger<F>
where
    F: FnMut(StructuredSuggestion),
{
    pub fn new(observer: F) -> Self {
        Self {
            seen: HashSet::new(),
            order: Vec::new(),
            observer,
        }
    }

    /// Offer a suggestion. Returns `true` and notifies the observer only if
    /// the name has not been emitted before.
    pub fn offer(&mut self, suggestion: StructuredSuggestion) -> bool {
        if !self.seen.insert(suggestion.name.clone()) {
            return false;
        }
        self.order.push(suggestion.name.clone());
        (self.observer)(suggestion);
        true
    }

    /// Emitted names, in emission order.
    pub fn emitted(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
