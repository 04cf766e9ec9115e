//! Milim CLI — the main entry point.
//!
//! Commands:
//! - `suggest`    — One-shot word suggestions for a topic
//! - `board`      — Interactive word board
//! - `transcribe` — Speech to text
//! - `speak`      — Text to speech
//! - `history`    — Saved conversations
//! - `export`     — Histories as CSV or XLSX
//! - `config`     — Show or initialize configuration
//! - `key`        — Store or clear the API key

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod app;
mod commands;

#[derive(Parser)]
#[command(
    name = "milim",
    about = "Milim — Hebrew word board with streamed model suggestions",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Keep everything in memory; nothing is read from or written to the store
    #[arg(long, global = true)]
    ephemeral: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Suggest word categories for a topic
    Suggest {
        /// The topic, e.g. "אוכל"
        #[arg(required = true)]
        topic: Vec<String>,

        /// Print suggestions as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Start the interactive word board
    Board {
        /// Resume a saved conversation
        #[arg(long)]
        resume: Option<String>,
    },

    /// Transcribe an audio file
    Transcribe {
        file: PathBuf,

        /// MIME type (defaults to one derived from the file extension)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Synthesize speech into a directory
    Speak {
        #[arg(required = true)]
        text: Vec<String>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Manage saved conversations
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Export saved conversations
    Export {
        /// Output file ending in `.csv` or `.xlsx`
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// API key management
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List saved conversations
    List,
    /// Show one conversation
    Show { id: String },
    /// Delete one conversation
    Delete { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file path
    Path,
}

#[derive(Subcommand)]
enum KeyAction {
    /// Store the API key
    Set { key: String },
    /// Remove the stored API key
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    // Config commands work even when the config file is broken
    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Show => commands::config_cmd::show().await,
            ConfigAction::Init { force } => commands::config_cmd::init(*force).await,
            ConfigAction::Path => commands::config_cmd::path().await,
        };
    }

    let app = app::App::load(cli.ephemeral).await?;

    match cli.command {
        Commands::Suggest { topic, json } => commands::suggest::run(&app, &topic.join(" "), json).await?,
        Commands::Board { resume } => commands::board::run(&app, resume).await?,
        Commands::Transcribe { file, mime } => commands::voice::transcribe(&app, &file, mime).await?,
        Commands::Speak { text, out } => commands::voice::speak(&app, &text.join(" "), &out).await?,
        Commands::History { action } => match action {
            HistoryAction::List => commands::history::list(&app).await?,
            HistoryAction::Show { id } => commands::history::show(&app, &id).await?,
            HistoryAction::Delete { id } => commands::history::delete(&app, &id).await?,
        },
        Commands::Export { out } => commands::history::export(&app, &out).await?,
        Commands::Key { action } => match action {
            KeyAction::Set { key } => commands::key::set(&app, &key).await?,
            KeyAction::Clear => commands::key::clear(&app).await?,
        },
        Commands::Config { .. } => {}
    }

    Ok(())
}
