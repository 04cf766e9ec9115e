//! `milim key` — Stored API key.

use crate::app::App;

pub async fn set(app: &App, key: &str) -> Result<(), Box<dyn std::error::Error>> {
    if key.trim().is_empty() {
        return Err("API key must not be empty".into());
    }
    app.preferences().set_api_key(Some(key)).await?;
    println!("  ✅ API key saved");
    if app.config.has_api_key() {
        println!("  Note: the key from config.toml or the environment takes precedence.");
    }
    Ok(())
}

pub async fn clear(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    app.preferences().set_api_key(None).await?;
    println!("  API key removed");
    Ok(())
}
