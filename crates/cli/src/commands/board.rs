//! `milim board` — Interactive word board.
//!
//! Plain text submits a topic. Slash commands pick, stage and commit words,
//! compose a sentence, or speak. Suggestions stream in while the prompt stays
//! responsive.

use std::sync::Arc;

use milim_config::AppConfig;
use milim_core::ProviderError;
use milim_store::ConversationHistory;
use milim_suggest::{
    GenerationStatus, Notice, QueryEvent, QueryTicket, Session, SessionState, SuggestionEngine,
    VoicePlayer,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use super::render;
use crate::app::{self, App};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardCommand {
    Topic(String),
    Pick(String),
    Stage(Vec<String>),
    Unstage,
    Commit,
    Cancel,
    Remove(usize),
    Sentence,
    Speak,
    Show,
    Reset,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Option<BoardCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line == "exit" || line == "quit" {
        return Some(BoardCommand::Quit);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(BoardCommand::Topic(line.to_string()));
    };

    let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let arg = arg.trim();
    let command = match name {
        "pick" | "p" if !arg.is_empty() => BoardCommand::Pick(arg.to_string()),
        "stage" | "s" if !arg.is_empty() => {
            BoardCommand::Stage(arg.split_whitespace().map(str::to_string).collect())
        }
        "unstage" | "u" => BoardCommand::Unstage,
        "commit" | "c" => BoardCommand::Commit,
        "cancel" => BoardCommand::Cancel,
        "remove" | "rm" => match arg.parse() {
            Ok(n) => BoardCommand::Remove(n),
            Err(_) => BoardCommand::Unknown(line.to_string()),
        },
        "sentence" => BoardCommand::Sentence,
        "speak" => BoardCommand::Speak,
        "show" => BoardCommand::Show,
        "reset" => BoardCommand::Reset,
        "help" | "h" => BoardCommand::Help,
        "quit" | "q" => BoardCommand::Quit,
        _ => BoardCommand::Unknown(line.to_string()),
    };
    Some(command)
}

/// Words for sentence composition: user entries after the last system entry.
pub fn sentence_words(session: &Session) -> Vec<String> {
    let entries = session.entries();
    let start = entries
        .iter()
        .rposition(|e| !e.is_user())
        .map_or(0, |i| i + 1);
    entries[start..].iter().map(|e| e.text.clone()).collect()
}

struct Board<'a> {
    app: &'a App,
    engine: Arc<SuggestionEngine>,
    voice: Option<VoicePlayer>,
    session: Session,
    history: Option<ConversationHistory>,
    events: mpsc::UnboundedSender<QueryEvent>,
}

pub async fn run(app: &App, resume: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let engine = app.engine().map_err(app::provider_failure)?;
    let voice = app.voice(&AppConfig::config_dir().join("audio")).ok();

    let (history, session) = match resume {
        Some(id) => {
            let h = app
                .histories()
                .get(&id)
                .await
                .ok_or_else(|| format!("No conversation with id {id}"))?;
            let session = h.to_session();
            (Some(h), session)
        }
        None => (None, Session::new()),
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut board = Board {
        app,
        engine,
        voice,
        session,
        history,
        events: tx,
    };

    println!();
    println!("  ╔══════════════════════════════════════╗");
    println!("  ║        Milim — לוח מילים             ║");
    println!("  ╚══════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", app.config.model);
    println!("  Type a topic and press Enter. /help lists commands.");
    println!();
    board.show();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = rx.recv() => board.on_event(event).await,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(command) = parse_command(&line) else { continue };
                if command == BoardCommand::Quit {
                    break;
                }
                board.on_command(command).await;
            }
        }
    }

    board.save().await;
    println!();
    println!("  להתראות! 👋");
    println!();
    Ok(())
}

impl Board<'_> {
    async fn on_command(&mut self, command: BoardCommand) {
        let result = match command {
            BoardCommand::Topic(text) => self.session.submit_topic(&text).map(|t| self.query(t)),
            BoardCommand::Pick(word) => self.session.select_word(&word).map(|t| self.query(t)),
            BoardCommand::Stage(words) => words
                .iter()
                .try_for_each(|w| self.session.stage_word(w))
                .map(|_| self.show_staging()),
            BoardCommand::Unstage => {
                self.session.unstage_last();
                self.show_staging();
                Ok(())
            }
            BoardCommand::Commit => self.session.commit_staging().map(|t| self.query(t)),
            BoardCommand::Cancel => {
                self.session.cancel_staging();
                Ok(())
            }
            BoardCommand::Remove(n) => match self.session.entries().get(n.wrapping_sub(1)) {
                Some(entry) => {
                    let id = entry.id.clone();
                    self.session.remove_entry(&id).map(|_| self.show_entries())
                }
                None => {
                    eprintln!("  No entry {n}");
                    Ok(())
                }
            },
            BoardCommand::Sentence => {
                self.compose().await;
                Ok(())
            }
            BoardCommand::Speak => {
                self.speak_last();
                Ok(())
            }
            BoardCommand::Show => {
                self.show();
                Ok(())
            }
            BoardCommand::Reset => {
                self.save().await;
                self.session.reset();
                self.history = None;
                println!("  New conversation");
                Ok(())
            }
            BoardCommand::Help => {
                print_help();
                Ok(())
            }
            BoardCommand::Quit => Ok(()),
            BoardCommand::Unknown(line) => {
                eprintln!("  Unknown command: {line} (try /help)");
                Ok(())
            }
        };
        if let Err(e) = result {
            eprintln!("  {e}");
        }
    }

    async fn on_event(&mut self, event: QueryEvent) {
        match event {
            QueryEvent::Suggestion {
                generation,
                suggestion,
            } => {
                let status = self.session.groups().status_of(generation);
                if let Some(stored) = self.session.accept(generation, suggestion) {
                    match status {
                        Some(GenerationStatus::Active) => println!("{}", render::suggestion_line(stored)),
                        _ => println!("  ({generation}) {}", stored.name),
                    }
                }
            }
            QueryEvent::Finished {
                generation,
                outcome,
            } => {
                if let Some(notice) = self.session.finish_query(generation, outcome) {
                    app::report(&notice);
                }
                if self.session.state() == SessionState::Idle {
                    self.save().await;
                }
            }
        }
    }

    fn query(&self, ticket: QueryTicket) {
        println!("  … ({})", ticket.generation);
        self.engine.spawn(ticket, self.events.clone());
    }

    async fn compose(&mut self) {
        let words = sentence_words(&self.session);
        if words.is_empty() {
            eprintln!("  Nothing to compose yet");
            return;
        }
        match self.engine.compose_sentence(&words, self.session.entries()).await {
            Ok(sentence) => {
                println!("  » {sentence}");
                self.session.append_system(sentence);
                self.save().await;
            }
            Err(e) => report_provider(&e),
        }
    }

    fn speak_last(&self) {
        let Some(voice) = &self.voice else {
            report_provider(&ProviderError::MissingCredential);
            return;
        };
        let Some(entry) = self.session.entries().last() else {
            eprintln!("  Nothing to speak yet");
            return;
        };
        match voice.speak(&entry.text) {
            Ok(playback) => {
                tokio::spawn(async move {
                    if let Err(e) = playback.finished.wait().await {
                        app::report(&Notice::from_voice_error(&e));
                    }
                });
            }
            Err(e) => app::report(&Notice::from_voice_error(&e)),
        }
    }

    async fn save(&mut self) {
        if !self.app.save_history() || self.session.entries().is_empty() {
            return;
        }
        let history = match self.history.take() {
            Some(mut h) => {
                h.update_from(&self.session);
                h
            }
            None => ConversationHistory::from_session(&self.session),
        };
        if let Err(e) = self.app.histories().upsert(history.clone()).await {
            warn!(error = %e, "Failed to save history");
        }
        self.history = Some(history);
    }

    fn show(&self) {
        self.show_entries();
        for line in render::groups_block(self.session.groups()) {
            println!("{line}");
        }
        self.show_staging();
    }

    fn show_entries(&self) {
        for (i, entry) in self.session.entries().iter().enumerate() {
            println!("{}", render::entry_line(i + 1, entry));
        }
    }

    fn show_staging(&self) {
        if !self.session.staging().is_empty() {
            println!("  [{}]", self.session.staging().join(" "));
        }
    }
}

fn report_provider(err: &ProviderError) {
    app::report(&Notice::from_provider_error(err));
}

fn print_help() {
    println!("  <text>          submit a topic");
    println!("  /pick <word>    select a suggested word");
    println!("  /stage <words>  add words to the staging line");
    println!("  /unstage        drop the last staged word");
    println!("  /commit         commit the staging line");
    println!("  /cancel         clear the staging line");
    println!("  /remove <n>     remove your entry number n");
    println!("  /sentence       compose a sentence from your latest words");
    println!("  /speak          speak the last entry");
    println!("  /show           show the board");
    println!("  /reset          start a new conversation");
    println!("  /quit           leave");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_topic() {
        assert_eq!(parse_command(" אוכל "), Some(BoardCommand::Topic("אוכל".into())));
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn slash_commands() {
        assert_eq!(
            parse_command("/stage אני רוצה"),
            Some(BoardCommand::Stage(vec!["אני".into(), "רוצה".into()]))
        );
        assert_eq!(parse_command("/rm 2"), Some(BoardCommand::Remove(2)));
        assert_eq!(parse_command("/commit"), Some(BoardCommand::Commit));
        assert_eq!(parse_command("exit"), Some(BoardCommand::Quit));
        assert!(matches!(parse_command("/pick"), Some(BoardCommand::Unknown(_))));
        assert!(matches!(parse_command("/rm x"), Some(BoardCommand::Unknown(_))));
    }

    #[test]
    fn sentence_uses_words_since_last_system_entry() {
        let mut session = Session::new();
        session.submit_topic("ים").unwrap();
        session.append_system("אני אוהב ים");
        session.submit_topic("רוצה").unwrap();
        session.submit_topic("גלידה").unwrap();
        assert_eq!(sentence_words(&session), vec!["רוצה", "גלידה"]);
    }
}
