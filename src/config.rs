//! Configuration management

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::audio::AudioLocator;
use crate::corpus::Language;
use crate::source::LanguageLocation;

const DEFAULT_TEXT_BASE: &str = "https://raw.githubusercontent.com/pubsaroja/bhagavad-gita-bot/main";
const DEFAULT_AUDIO_FULL_URL: &str = "https://raw.githubusercontent.com/pubsaroja/bhagavad-gita-bot/main/AudioFull";
const DEFAULT_AUDIO_QUARTER_URL: &str =
    "https://raw.githubusercontent.com/pubsaroja/bhagavad-gita-bot/main/AudioQuarterAll";

/// Bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token (required for Telegram mode only)
    pub telegram_token: Option<String>,

    /// Users allowed to talk to the bot (empty = everyone)
    pub allowed_users: Vec<i64>,

    /// Corpus locations, primary language first
    pub languages: Vec<LanguageLocation>,

    /// Base URL of full recitations
    pub audio_full_url: String,

    /// Base URL of quarter clips (per-chapter folders)
    pub audio_quarter_url: Option<String>,

    /// JSON audio index; overrides the base URLs when set
    pub audio_index_path: Option<PathBuf>,

    /// Language scanned by syllable search
    pub search_language: Language,

    /// Requests per minute per user
    pub rate_limit_per_min: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let telegram_token = std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|t| !t.is_empty());

        let allowed_users = parse_user_list(&std::env::var("TELEGRAM_ALLOWED_USERS").unwrap_or_default());

        // Telugu is first so its corpus drives the index, matching the reply order
        let languages = Language::ALL
            .iter()
            .map(|lang| {
                let name = lang.as_str().to_uppercase();
                LanguageLocation {
                    language: *lang,
                    full: std::env::var(format!("GITA_{}_FULL", name)).unwrap_or_else(|_| default_text_url(*lang)),
                    short: std::env::var(format!("GITA_{}_SHORT", name)).ok().filter(|s| !s.is_empty()),
                }
            })
            .collect();

        let audio_full_url =
            std::env::var("GITA_AUDIO_FULL_URL").unwrap_or_else(|_| DEFAULT_AUDIO_FULL_URL.to_string());

        let audio_quarter_url = match std::env::var("GITA_AUDIO_QUARTER_URL") {
            Ok(url) if url.is_empty() => None,
            Ok(url) => Some(url),
            Err(_) => Some(DEFAULT_AUDIO_QUARTER_URL.to_string()),
        };

        let audio_index_path = std::env::var("GITA_AUDIO_INDEX").ok().map(PathBuf::from);

        let search_language = match std::env::var("GITA_SEARCH_LANGUAGE") {
            Ok(value) => Language::parse(&value)
                .with_context(|| format!("GITA_SEARCH_LANGUAGE: unknown language {:?}", value))?,
            Err(_) => Language::Hindi,
        };

        let rate_limit_per_min = std::env::var("GITA_RATE_LIMIT_PER_MIN")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            telegram_token,
            allowed_users,
            languages,
            audio_full_url,
            audio_quarter_url,
            audio_index_path,
            search_language,
            rate_limit_per_min,
        })
    }

    /// Audio locator from the index file or the base URLs
    pub fn audio_locator(&self) -> Result<AudioLocator> {
        match &self.audio_index_path {
            Some(path) => AudioLocator::load_index(path)
                .with_context(|| format!("loading audio index {}", path.display())),
            None => Ok(AudioLocator::base_url(
                self.audio_full_url.clone(),
                self.audio_quarter_url.clone(),
            )),
        }
    }
}

/// Published "with Uvacha" text for a language
fn default_text_url(language: Language) -> String {
    format!("{}/BG%20{}%20with%20Uvacha.txt", DEFAULT_TEXT_BASE, language.as_str())
}

fn parse_user_list(raw: &str) -> Vec<i64> {
    raw.split(',').filter_map(|s| s.trim().parse().ok()).collect()
}
