//! `milim suggest` — One-shot suggestions for a topic.

use milim_store::ConversationHistory;
use milim_suggest::{QueryEvent, Session};
use tokio::sync::mpsc;
use tracing::warn;

use super::render;
use crate::app::{self, App};

pub async fn run(app: &App, topic: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let engine = app.engine().map_err(app::provider_failure)?;

    let mut session = Session::new();
    let ticket = session.submit_topic(topic)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    engine.spawn(ticket, tx);

    let mut failure = None;
    while let Some(event) = rx.recv().await {
        match event {
            QueryEvent::Suggestion {
                generation,
                suggestion,
            } => {
                let Some(stored) = session.accept(generation, suggestion) else {
                    continue;
                };
                if json {
                    println!("{}", serde_json::to_string(stored)?);
                } else {
                    println!("{}", render::suggestion_line(stored));
                }
            }
            QueryEvent::Finished {
                generation,
                outcome,
            } => {
                if let Err(ref e) = outcome {
                    failure = Some(e.clone());
                }
                if let Some(notice) = session.finish_query(generation, outcome) {
                    app::report(&notice);
                }
            }
        }
    }

    if let Some(err) = failure {
        return Err(err.into());
    }

    if app.save_history() {
        let history = ConversationHistory::from_session(&session);
        if let Err(e) = app.histories().upsert(history).await {
            warn!(error = %e, "Failed to save history");
        }
    }
    Ok(())
}
