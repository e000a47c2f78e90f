//! Application bootstrap
//!
//! Fetches the corpus once, builds the engine, and offers a console loop
//! that drives the engine from stdin for local use.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use crate::audio::AudioLocator;
use crate::config::Config;
use crate::corpus::Library;
use crate::engine::NavigationEngine;
use crate::render::{render, Reply};
use crate::session::{SessionStore, UserId};
use crate::source;

/// Everything a front end needs to answer commands
pub struct App {
    pub engine: NavigationEngine,
    pub audio: AudioLocator,
}

impl App {
    /// Fetch texts, build the library, and wire up the engine. Any corpus
    /// problem aborts startup.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let sources = source::fetch_all(&config.languages).await?;
        let library = Library::build(sources).context("building verse library")?;
        let audio = config.audio_locator()?;

        let engine = NavigationEngine::new(Arc::new(library), Arc::new(SessionStore::new()))
            .with_search_language(config.search_language);
        info!("Search language: {}", engine.search_language());

        Ok(Self { engine, audio })
    }

    /// Handle one command and render the replies
    pub fn respond(&self, user_id: UserId, text: &str) -> Vec<Reply> {
        let result = self.engine.handle(user_id, text);
        render(&result, &self.audio)
    }
}

/// Read commands from stdin and print replies until EOF
pub async fn run_console(app: &App) -> Result<()> {
    const CONSOLE_USER: UserId = 0;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"Type a command (help for the list), Ctrl-D to quit.\n> ").await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            for reply in app.respond(CONSOLE_USER, &line) {
                let out = match reply {
                    Reply::Text(text) => format!("{}\n\n", text),
                    Reply::Audio { url, caption } => format!("[audio {}] {}\n\n", caption, url),
                };
                stdout.write_all(out.as_bytes()).await?;
            }
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }
    stdout.write_all(b"\n").await?;
    Ok(())
}
