//! Session and engine working together over a scripted provider.

use std::sync::Arc;

use async_trait::async_trait;
use milim_core::{
    Message, Provider, ProviderError, ProviderRequest, ProviderResponse, StreamChunk,
};
use milim_suggest::{
    GenerationStatus, NoticeKind, PromptSettings, QueryEvent, Session, SessionState,
    SuggestionEngine,
};
use tokio::sync::mpsc;

/// Replays one scripted response per call; an `Err` chunk fails the stream.
struct ScriptedProvider {
    scripts: std::sync::Mutex<Vec<Vec<Result<String, ProviderError>>>>,
}

impl ScriptedProvider {
    fn new(scripts: Vec<Vec<Result<String, ProviderError>>>) -> Self {
        Self {
            scripts: std::sync::Mutex::new(scripts),
        }
    }

    fn next_script(&self) -> Vec<Result<String, ProviderError>> {
        let mut scripts = self.scripts.lock().unwrap();
        assert!(!scripts.is_empty(), "ScriptedProvider: no more scripts");
        scripts.remove(0)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let text: String = self.next_script().into_iter().collect::<Result<_, _>>()?;
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model: "scripted".into(),
        })
    }

    async fn stream(
        &self,
        _request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        let script = self.next_script();
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            for item in script {
                let failed = item.is_err();
                if tx.send(item.map(StreamChunk::text)).await.is_err() || failed {
                    return;
                }
            }
            let _ = tx.send(Ok(StreamChunk::done())).await;
        });
        Ok(rx)
    }
}

fn ok(chunks: &[&str]) -> Vec<Result<String, ProviderError>> {
    chunks.iter().map(|c| Ok(c.to_string())).collect()
}

fn engine(provider: ScriptedProvider) -> Arc<SuggestionEngine> {
    Arc::new(SuggestionEngine::new(Arc::new(provider), PromptSettings::default()))
}

/// Apply events until a query reports it finished.
async fn drain(session: &mut Session, rx: &mut mpsc::UnboundedReceiver<QueryEvent>) {
    while let Some(event) = rx.recv().await {
        let last = matches!(event, QueryEvent::Finished { .. });
        session.apply(event);
        if last {
            break;
        }
    }
}

#[tokio::test]
async fn topic_to_suggestions_filters_used_words() {
    let engine = engine(ScriptedProvider::new(vec![ok(&[
        r#"{"categories":[{"category":"משפחה","words":["בית","גן","#,
        r#""ילד","אמא"]}]}"#,
    ])]));
    let mut session = Session::new();
    session.submit_topic("בית").unwrap();
    session.finish_query(session.pending().unwrap(), Ok(0));

    let ticket = session.submit_topic("ילד").unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    engine.spawn(ticket.clone(), tx);
    drain(&mut session, &mut rx).await;

    assert_eq!(session.state(), SessionState::Idle);
    let active = session.groups().active().unwrap();
    assert_eq!(active.id, ticket.generation);
    assert_eq!(active.suggestions[0].words, vec!["גן", "אמא"]);
}

#[tokio::test]
async fn transport_error_returns_to_idle_with_notice() {
    let engine = engine(ScriptedProvider::new(vec![vec![
        Ok(r#"{"categories":[{"category":"א","words":["ב"]},"#.into()),
        Err(ProviderError::Network("connection reset".into())),
    ]]));
    let mut session = Session::new();
    let ticket = session.submit_topic("שלום").unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    engine.spawn(ticket.clone(), tx);

    let mut notice = None;
    while let Some(event) = rx.recv().await {
        if let Some(n) = session.apply(event) {
            notice = Some(n);
        }
    }

    assert_eq!(notice.unwrap().kind, NoticeKind::Transport);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.groups().is_empty());
    assert_eq!(session.entries().len(), 1);
}

#[tokio::test]
async fn staged_words_commit_as_one_entry_and_query() {
    let engine = engine(ScriptedProvider::new(vec![ok(&[
        r#"{"category":"מספרים","words":["ארבע","חמש","שלוש"]}"#,
    ])]));
    let mut session = Session::new();
    for word in ["אחד", "שתים", "שלוש"] {
        session.stage_word(word).unwrap();
    }
    let ticket = session.commit_staging().unwrap();
    assert!(session.staging().is_empty());
    assert_eq!(session.entries()[0].text, "אחד שתים שלוש");

    let (tx, mut rx) = mpsc::unbounded_channel();
    engine.spawn(ticket, tx);
    drain(&mut session, &mut rx).await;
    assert_eq!(
        session.groups().active().unwrap().suggestions[0].words,
        vec!["ארבע", "חמש"]
    );
}

#[tokio::test]
async fn late_results_of_superseded_query_stay_superseded() {
    let engine = engine(ScriptedProvider::new(vec![
        ok(&[r#"{"category":"ישן","words":["א"]}"#]),
        ok(&[r#"{"category":"חדש","words":["ב"]}"#]),
    ]));
    let mut session = Session::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    // the first query completes before the session sees any of its events
    let first = session.submit_topic("ראשון").unwrap();
    engine.spawn(first.clone(), tx.clone()).await.unwrap();
    let second = session.submit_topic("שני").unwrap();
    assert_eq!(session.groups().status_of(first.generation), Some(GenerationStatus::Superseded));
    engine.spawn(second.clone(), tx).await.unwrap();

    while let Ok(event) = rx.try_recv() {
        session.apply(event);
    }

    let old = session.groups().get(first.generation).unwrap();
    assert_eq!(old.status, GenerationStatus::Superseded);
    assert_eq!(old.suggestions[0].name, "ישן");
    let active = session.groups().active().unwrap();
    assert_eq!(active.id, second.generation);
    assert_eq!(active.suggestions[0].name, "חדש");
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn missing_credential_notice_prompts_for_key() {
    let mut session = Session::new();
    let ticket = session.submit_topic("שלום").unwrap();
    let notice = session
        .finish_query(ticket.generation, Err(ProviderError::MissingCredential))
        .unwrap();
    assert_eq!(notice.kind, NoticeKind::MissingCredential);
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn composed_sentence_is_a_system_entry() {
    let engine = engine(ScriptedProvider::new(vec![ok(&["אני רוצה ללכת לים."])]));
    let mut session = Session::new();
    session.submit_topic("ים").unwrap();
    let words: Vec<String> = session.entries().iter().map(|e| e.text.clone()).collect();
    let sentence = engine.compose_sentence(&words, session.entries()).await.unwrap();
    session.append_system(sentence);

    let last = session.entries().last().unwrap();
    assert!(!last.is_user());
    assert_eq!(last.text, "אני רוצה ללכת לים.");
    assert!(!session.used_words().contains("אני"));
}
