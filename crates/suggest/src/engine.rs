//! Suggestion engine: one streamed query in, deduplicated suggestions out.

use std::collections::BTreeSet;
use std::sync::Arc;

use milim_core::{ConversationEntry, Provider, ProviderError, StructuredSuggestion};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::decoder::SuggestionDecoder;
use crate::lifecycle::{GenerationId, filter_used_words};
use crate::merger::Merger;
use crate::prompt::{self, PromptSettings};
use crate::session::QueryTicket;

/// Events emitted by a spawned query, tagged with its generation.
#[derive(Debug, Clone)]
pub enum QueryEvent {
    Suggestion {
        generation: GenerationId,
        suggestion: StructuredSuggestion,
    },
    /// Always the last event of a query
    Finished {
        generation: GenerationId,
        outcome: Result<usize, ProviderError>,
    },
}

impl QueryEvent {
    pub fn generation(&self) -> GenerationId {
        match self {
            QueryEvent::Suggestion { generation, .. } | QueryEvent::Finished { generation, .. } => {
                *generation
            }
        }
    }
}

pub struct SuggestionEngine {
    provider: Arc<dyn Provider>,
    settings: PromptSettings,
}

impl SuggestionEngine {
    pub fn new(provider: Arc<dyn Provider>, settings: PromptSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &PromptSettings {
        &self.settings
    }

    /// Stream one suggestion query, calling `on_suggestion` once per distinct
    /// category name as soon as it can be reconstructed.
    ///
    /// Words in `ticket.used_words` are removed before a suggestion reaches
    /// the merger, and one left with no words is not surfaced at all. The
    /// returned count is the number of suggestions `on_suggestion` received.
    /// A transport failure at any point aborts the query; malformed model
    /// output never does.
    pub async fn run<F>(&self, ticket: &QueryTicket, on_suggestion: F) -> Result<usize, ProviderError>
    where
        F: FnMut(StructuredSuggestion),
    {
        let request = prompt::suggestion_request(&self.settings, &ticket.transcript, &ticket.used_words);
        debug!(
            provider = self.provider.name(),
            generation = %ticket.generation,
            entries = ticket.transcript.len(),
            "Starting suggestion query"
        );

        let mut stream = self.provider.stream(request).await?;
        let mut decoder = SuggestionDecoder::new();
        let mut merger = Merger::new(on_suggestion);

        while let Some(chunk) = stream.recv().await {
            let chunk = chunk?;
            if let Some(text) = chunk.content.as_deref()
                && !text.is_empty()
            {
                for suggestion in decoder.push(text) {
                    offer_unused(&mut merger, &ticket.used_words, suggestion);
                }
            }
            if chunk.done {
                break;
            }
        }

        let streamed = merger.len();
        for suggestion in decoder.finish() {
            offer_unused(&mut merger, &ticket.used_words, suggestion);
        }
        if merger.len() > streamed {
            debug!(
                generation = %ticket.generation,
                recovered = merger.len() - streamed,
                "Final parse recovered additional categories"
            );
        }

        info!(generation = %ticket.generation, count = merger.len(), "Suggestion query complete");
        Ok(merger.len())
    }

    /// Run a query on the runtime, forwarding every result to `events`.
    ///
    /// The receiver may be dropped at any time; the query still runs to
    /// completion so the provider connection is closed cleanly.
    pub fn spawn(
        self: &Arc<Self>,
        ticket: QueryTicket,
        events: mpsc::UnboundedSender<QueryEvent>,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let generation = ticket.generation;
            let outcome = engine
                .run(&ticket, |suggestion| {
                    let _ = events.send(QueryEvent::Suggestion {
                        generation,
                        suggestion,
                    });
                })
                .await;
            if let Err(ref e) = outcome {
                warn!(generation = %generation, error = %e, "Suggestion query failed");
            }
            let _ = events.send(QueryEvent::Finished {
                generation,
                outcome,
            });
        })
    }

    /// Ask the model to turn selected words into one sentence.
    pub async fn compose_sentence(
        &self,
        words: &[String],
        transcript: &[ConversationEntry],
    ) -> Result<String, ProviderError> {
        let request = prompt::sentence_request(&self.settings, words, transcript);
        let response = self.provider.complete(request).await?;
        let sentence = response.message.content.trim().to_string();
        if sentence.is_empty() {
            return Err(ProviderError::InvalidResponse("empty sentence".into()));
        }
        Ok(sentence)
    }
}

/// Filter out used words, then offer. A suggestion left empty does not claim
/// its name, so a later fuller reconstruction can still surface it.
fn offer_unused<F>(merger: &mut Merger<F>, used: &BTreeSet<String>, suggestion: StructuredSuggestion)
where
    F: FnMut(StructuredSuggestion),
{
    let suggestion = filter_used_words(suggestion, used);
    if suggestion.words.is_empty() {
        debug!(name = %suggestion.name, "Suggestion had no unused words");
        return;
    }
    merger.offer(suggestion);
}
