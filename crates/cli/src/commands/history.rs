//! `milim history` / `milim export` — Saved conversations.

use std::path::Path;

use milim_store::{ExportFormat, export as export_histories};

use super::render;
use crate::app::App;

pub async fn list(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    let histories = app.histories().list().await;
    if histories.is_empty() {
        println!("  No saved conversations.");
        return Ok(());
    }
    for h in &histories {
        println!(
            "  {}  {}  {} ({} entries)",
            h.id,
            h.updated_at.format("%Y-%m-%d %H:%M"),
            h.title,
            h.entries.len()
        );
    }
    Ok(())
}

pub async fn show(app: &App, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let history = app
        .histories()
        .get(id)
        .await
        .ok_or_else(|| format!("No conversation with id {id}"))?;

    println!("  {}", history.title);
    println!("  Created: {}", history.created_at.format("%Y-%m-%d %H:%M"));
    println!();
    for (i, entry) in history.entries.iter().enumerate() {
        println!("{}", render::entry_line(i + 1, entry));
    }
    let groups = render::groups_block(&history.topic_groups);
    if !groups.is_empty() {
        println!();
        for line in groups {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn delete(app: &App, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    if app.histories().delete(id).await? {
        println!("  Deleted {id}");
        Ok(())
    } else {
        Err(format!("No conversation with id {id}").into())
    }
}

pub async fn export(app: &App, out: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let format = out
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ExportFormat::from_extension)
        .ok_or_else(|| format!("Unsupported export file {}: use .csv or .xlsx", out.display()))?;

    let histories = app.histories().list().await;
    let file = std::fs::File::create(out)
        .map_err(|e| format!("Failed to create {}: {e}", out.display()))?;
    export_histories(file, &histories, format)?;
    println!("  Exported {} conversations to {}", histories.len(), out.display());
    Ok(())
}
