//! Histories persisted through the file backend.

use std::sync::Arc;

use milim_core::StructuredSuggestion;
use milim_store::{
    ConversationHistory, ExportFormat, FileStore, HistoryRepository, PreferenceStore, export, to_csv,
};
use milim_suggest::Session;
use tempfile::TempDir;

#[tokio::test]
async fn history_survives_reopen_and_exports() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");

    let mut session = Session::new();
    let ticket = session.submit_topic("אוכל").unwrap();
    session.accept(
        ticket.generation,
        StructuredSuggestion::new("פירות", ["תפוח", "בננה"]).unwrap(),
    );
    session.finish_query(ticket.generation, Ok(1));
    let history = ConversationHistory::from_session(&session);

    {
        let repo = HistoryRepository::new(Arc::new(FileStore::new(path.clone())));
        repo.upsert(history.clone()).await.unwrap();
    }

    let repo = HistoryRepository::new(Arc::new(FileStore::new(path)));
    let all = repo.list().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, history.id);
    assert_eq!(all[0].title, "אוכל");

    let csv = to_csv(&all);
    assert!(csv.contains(",אוכל,אוכל,תפוח;בננה\r\n"));

    let xlsx_path = dir.path().join("histories.xlsx");
    let format = ExportFormat::from_extension("xlsx").unwrap();
    export(std::fs::File::create(&xlsx_path).unwrap(), &all, format).unwrap();
    let bytes = std::fs::read(&xlsx_path).unwrap();
    assert!(bytes.starts_with(b"PK"));
}

#[tokio::test]
async fn preferences_and_histories_share_one_file() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(dir.path().join("store.json")));
    let prefs = PreferenceStore::new(store.clone());
    let repo = HistoryRepository::new(store.clone());

    prefs.set_save_history(false).await.unwrap();
    repo.upsert(ConversationHistory::from_session(&Session::new()))
        .await
        .unwrap();

    let reopened = Arc::new(FileStore::new(dir.path().join("store.json")));
    assert!(!PreferenceStore::new(reopened.clone()).load().await.save_history);
    assert_eq!(HistoryRepository::new(reopened).list().await.len(), 1);
}
