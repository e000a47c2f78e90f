//! Telegram Bot transport
//!
//! Thin long-polling front end: every text message goes through the
//! navigation engine and the rendered replies are sent back as text and
//! audio messages.
//!
//! Features:
//! - Allowed-user filter
//! - Per-user rate limiting
//! - Audio sent by URL, with a text fallback when Telegram rejects it
//!
//! Uses explicit Dispatcher pattern for reliable message polling.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{InputFile, Update},
};
use tokio::sync::RwLock;

use crate::app::App;
use crate::config::Config;
use crate::engine::CommandResult;
use crate::render::{render, Reply};

/// Telegram's message limit is 4096; stay under it
const MAX_MESSAGE_LEN: usize = 4000;

/// Run Telegram bot with explicit Dispatcher for reliable polling
pub async fn run_telegram_bot(config: Config, app: App) -> Result<()> {
    let token = config
        .telegram_token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;

    tracing::info!("===========================================");
    tracing::info!("  Gita Bot Telegram - Starting...");
    tracing::info!("===========================================");
    tracing::info!(
        "Allowed users: {}",
        if config.allowed_users.is_empty() {
            "ALL".to_string()
        } else {
            format!("{:?}", config.allowed_users)
        }
    );

    let bot = Bot::new(token);

    // Verify bot token by calling getMe
    tracing::info!("Verifying bot token...");
    match bot.get_me().await {
        Ok(me) => {
            tracing::info!(
                "Bot authenticated: @{} (ID: {})",
                me.username.as_deref().unwrap_or("unknown"),
                me.id
            );
        }
        Err(e) => {
            tracing::error!("Failed to authenticate bot: {}", e);
            anyhow::bail!("Bot authentication failed: {}", e);
        }
    }

    // Delete any existing webhook to ensure polling works
    if let Err(e) = bot.delete_webhook().await {
        tracing::warn!("Failed to delete webhook: {} (continuing anyway)", e);
    }

    let handler_data = Arc::new(BotData {
        allowed_users: config.allowed_users.clone(),
        app,
        rate_limiter: RateLimiter::new(config.rate_limit_per_min, 60),
        started_at: chrono::Utc::now(),
    });
    tracing::info!("Rate limiter: {} req/min per user", config.rate_limit_per_min);

    let handler = dptree::entry().branch(Update::filter_message().endpoint(message_handler));

    tracing::info!("Starting dispatcher with long polling...");
    tracing::info!(
        "Bot is now LIVE (started {})",
        handler_data.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![handler_data])
        .default_handler(|upd| async move {
            tracing::debug!("Unhandled update: {:?}", upd);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in message handler",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::warn!("Dispatcher stopped");
    Ok(())
}

/// Message handler endpoint for the dispatcher
async fn message_handler(bot: Bot, msg: Message, data: Arc<BotData>) -> ResponseResult<()> {
    let user_id = msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(0);
    let chat_id = msg.chat.id.0;
    let text_preview = msg.text().unwrap_or("<non-text>").chars().take(50).collect::<String>();

    tracing::info!(
        ">>> Message received: user={}, chat={}, text={:?}",
        user_id,
        chat_id,
        text_preview
    );

    if let Err(e) = handle_message(&bot, &msg, &data, user_id).await {
        tracing::error!("Error handling message: {}", e);
    }

    Ok(())
}

struct BotData {
    allowed_users: Vec<i64>,
    app: App,
    rate_limiter: RateLimiter,
    started_at: chrono::DateTime<chrono::Utc>,
}

impl BotData {
    fn is_allowed(&self, user_id: i64) -> bool {
        user_allowed(&self.allowed_users, user_id)
    }
}

/// An empty allow-list admits everyone
fn user_allowed(allowed_users: &[i64], user_id: i64) -> bool {
    allowed_users.is_empty() || allowed_users.contains(&user_id)
}

/// Per-user rate limiting for Telegram requests
struct RateLimiter {
    /// Max requests per window
    max_requests: u32,
    /// Window duration in seconds
    window_secs: u64,
    /// Current window per user id
    entries: RwLock<HashMap<i64, RateLimitEntry>>,
}

struct RateLimitEntry {
    window_start: Instant,
    count: u32,
}

impl RateLimiter {
    fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Check if user is within rate limit. Returns true if allowed.
    async fn check(&self, user_id: i64) -> bool {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let window = Duration::from_secs(self.window_secs);

        let entry = entries.entry(user_id).or_insert(RateLimitEntry {
            window_start: now,
            count: 0,
        });

        if now.duration_since(entry.window_start) >= window {
            entry.window_start = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            return false;
        }

        entry.count += 1;
        true
    }

    /// Seconds until the user's window resets
    async fn retry_after(&self, user_id: i64) -> u64 {
        let entries = self.entries.read().await;
        entries
            .get(&user_id)
            .map(|entry| {
                let window = Duration::from_secs(self.window_secs);
                window.saturating_sub(entry.window_start.elapsed()).as_secs()
            })
            .unwrap_or(0)
    }
}

async fn handle_message(bot: &Bot, msg: &Message, data: &BotData, user_id: i64) -> Result<()> {
    let chat_id = msg.chat.id;

    if !data.is_allowed(user_id) {
        tracing::warn!("Unauthorized user: {}", user_id);
        bot.send_message(chat_id, "Unauthorized.").await?;
        return Ok(());
    }

    if !data.rate_limiter.check(user_id).await {
        let wait = data.rate_limiter.retry_after(user_id).await;
        tracing::warn!("Rate limit exceeded for user {}", user_id);
        bot.send_message(
            chat_id,
            format!("⚠️ Too many requests. Please wait {}s and try again.", wait.max(1)),
        )
        .await?;
        return Ok(());
    }

    let Some(text) = msg.text() else {
        bot.send_message(chat_id, "Please send a text command (help for the list).")
            .await?;
        return Ok(());
    };

    let result = data.app.engine.handle(user_id, text);
    log_outcome(user_id, &result);

    for reply in render(&result, &data.app.audio) {
        send_reply(bot, chat_id, reply).await?;
    }
    Ok(())
}

/// Recoverable outcomes are logged here rather than in the engine
fn log_outcome(user_id: i64, result: &CommandResult) {
    match result {
        CommandResult::Verses(verses) => {
            let keys: Vec<String> = verses.iter().map(|v| v.key().to_string()).collect();
            tracing::info!("user={} verses={:?}", user_id, keys);
        }
        CommandResult::Exhausted { chapter } => {
            tracing::info!("user={} exhausted chapter={:?}", user_id, chapter);
        }
        CommandResult::NotFound { chapter, verse } => {
            tracing::info!("user={} not found chapter={} verse={:?}", user_id, chapter, verse);
        }
        other => tracing::debug!("user={} result={}", user_id, other.kind()),
    }
}

async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> Result<()> {
    match reply {
        Reply::Text(text) => send_long_message(bot, chat_id, &text).await,
        Reply::Audio { url, caption } => {
            let parsed = match reqwest::Url::parse(&url) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!("Invalid audio URL {}: {}", url, e);
                    bot.send_message(chat_id, format!("🔇 Audio for {} is not available.", caption))
                        .await?;
                    return Ok(());
                }
            };
            if let Err(e) = bot
                .send_audio(chat_id, InputFile::url(parsed))
                .caption(caption.clone())
                .await
            {
                // Telegram could not fetch the file itself; hand the link over instead
                tracing::warn!("Failed to send audio {}: {}", url, e);
                bot.send_message(chat_id, format!("🎧 {}: {}", caption, url)).await?;
            }
            Ok(())
        }
    }
}

/// Send text, splitting at character boundaries when it exceeds the limit
async fn send_long_message(bot: &Bot, chat_id: ChatId, text: &str) -> Result<()> {
    for chunk in chunk_message(text, MAX_MESSAGE_LEN) {
        bot.send_message(chat_id, chunk).await?;
    }
    Ok(())
}

fn chunk_message(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let split_at = remaining
            .char_indices()
            .take_while(|(i, _)| *i < max)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(remaining.len());
        let (chunk, rest) = remaining.split_at(split_at);
        chunks.push(chunk.to_string());
        remaining = rest;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_short_message() {
        assert_eq!(chunk_message("2.47", MAX_MESSAGE_LEN), vec!["2.47".to_string()]);
        assert!(chunk_message("", MAX_MESSAGE_LEN).is_empty());
    }

    #[test]
    fn test_chunk_keeps_multibyte_intact() {
        let msg = "कर्म".repeat(600);
        let chunks = chunk_message(&msg, MAX_MESSAGE_LEN);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= MAX_MESSAGE_LEN + 3));
        assert_eq!(chunks.concat(), msg);
    }

    #[tokio::test]
    async fn test_rate_limiter_window() {
        let limiter = RateLimiter::new(2, 60);
        assert!(limiter.check(1).await);
        assert!(limiter.check(1).await);
        assert!(!limiter.check(1).await);
        // Other users have their own window
        assert!(limiter.check(2).await);
        assert!(limiter.retry_after(1).await <= 60);
    }

    #[test]
    fn test_allowed_users() {
        assert!(user_allowed(&[], 5));
        assert!(user_allowed(&[1, 5], 5));
        assert!(!user_allowed(&[1, 2], 5));
    }
}
