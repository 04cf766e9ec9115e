//! `milim transcribe` / `milim speak` — Audio endpoints.

use std::path::Path;

use milim_suggest::Notice;
use milim_suggest::voice::mime_for_extension;

use crate::app::{self, App};

pub async fn transcribe(
    app: &App,
    file: &Path,
    mime: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let audio = std::fs::read(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let mime = mime.unwrap_or_else(|| {
        let ext = file.extension().and_then(|e| e.to_str()).unwrap_or_default();
        mime_for_extension(ext).to_string()
    });

    let player = app.voice(Path::new(".")).map_err(app::provider_failure)?;
    match player.transcribe(audio, &mime).await {
        Ok(text) => {
            println!("{text}");
            Ok(())
        }
        Err(e) => {
            app::report(&Notice::from_voice_error(&e));
            Err(e.into())
        }
    }
}

pub async fn speak(app: &App, text: &str, out: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let player = app.voice(out).map_err(app::provider_failure)?;

    let playback = player.speak(text).inspect_err(|e| app::report(&Notice::from_voice_error(e)))?;
    eprint!("  Synthesizing...");
    let ready = playback.ready.wait().await;
    eprint!("\r                 \r");
    if let Err(e) = ready {
        app::report(&Notice::from_voice_error(&e));
        return Err(e.into());
    }

    playback
        .finished
        .wait()
        .await
        .inspect_err(|e| app::report(&Notice::from_voice_error(e)))?;
    println!(
        "{}",
        out.join(format!("speech.{}", app.config.voice.audio_format)).display()
    );
    Ok(())
}
