//! Persistence for Milim.
//!
//! Two `KeyValueStore` backends:
//! - **FileStore**: JSON file on disk (default, `~/.milim/store.json`)
//! - **InMemoryStore**: for tests and ephemeral sessions
//!
//! On top of them, typed repositories for conversation histories and user
//! preferences, plus CSV and XLSX export. Reads never fail: missing or unreadable
//! values fall back to documented defaults and are logged.

pub mod export;
pub mod file_backend;
pub mod history;
pub mod in_memory;
pub mod json;
pub mod preferences;

pub use export::{ExportError, ExportFormat, export, to_csv, write_csv, write_xlsx};
pub use file_backend::FileStore;
pub use history::{ConversationHistory, HistoryRepository};
pub use in_memory::InMemoryStore;
pub use preferences::{PreferenceStore, Preferences};
