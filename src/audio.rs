//! Audio References
//!
//! The core only names audio files (`<chapter>.<verse>.mp3`). Turning a name
//! into something playable is the locator's job:
//! - base URLs: full recitations under one folder, quarter clips under
//!   `Chapter <n>/` folders
//! - a JSON audio index listing explicit URLs per verse

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::corpus::{Detail, VerseKey};

/// Audio clip for one verse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioRef {
    pub chapter: u8,
    pub verse: u32,
    /// Short draws use the quarter clip, everything else the full recitation
    pub detail: Detail,
}

impl AudioRef {
    pub fn new(key: VerseKey, detail: Detail) -> Self {
        Self {
            chapter: key.chapter,
            verse: key.verse,
            detail,
        }
    }

    /// File name of the clip
    pub fn file_name(&self) -> String {
        format!("{}.{}.mp3", self.chapter, self.verse)
    }
}

#[derive(Debug, Error)]
pub enum AudioIndexError {
    #[error("failed to read audio index: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid audio index JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One entry of the JSON audio index
#[derive(Debug, Clone, Deserialize)]
pub struct AudioIndexEntry {
    pub chapter: u8,
    pub verse: u32,
    #[serde(default)]
    pub quarter_part: Option<u8>,
    pub quarter: Option<String>,
    pub full: String,
}

/// Maps audio references to URLs
#[derive(Debug, Clone)]
pub enum AudioLocator {
    BaseUrl {
        full: String,
        quarter: Option<String>,
    },
    Index(HashMap<VerseKey, AudioIndexEntry>),
}

impl AudioLocator {
    pub fn base_url(full: impl Into<String>, quarter: Option<String>) -> Self {
        AudioLocator::BaseUrl {
            full: full.into(),
            quarter,
        }
    }

    /// Build from index entries; the first entry per verse wins
    pub fn from_entries(entries: Vec<AudioIndexEntry>) -> Self {
        let mut map = HashMap::new();
        for entry in entries {
            map.entry(VerseKey::new(entry.chapter, entry.verse))
                .or_insert(entry);
        }
        AudioLocator::Index(map)
    }

    pub fn from_json(json: &str) -> Result<Self, AudioIndexError> {
        let entries: Vec<AudioIndexEntry> = serde_json::from_str(json)?;
        Ok(Self::from_entries(entries))
    }

    pub fn load_index(path: &Path) -> Result<Self, AudioIndexError> {
        let json = std::fs::read_to_string(path)?;
        let locator = Self::from_json(&json)?;
        if let AudioLocator::Index(map) = &locator {
            info!("Audio index loaded: {} verses from {}", map.len(), path.display());
        }
        Ok(locator)
    }

    /// URL for a clip, if one is known
    pub fn url(&self, audio: &AudioRef) -> Option<String> {
        match self {
            AudioLocator::BaseUrl { full, quarter } => {
                let file = audio.file_name();
                match (audio.detail, quarter) {
                    (Detail::Short, Some(quarter)) => Some(format!(
                        "{}/Chapter {}/{}",
                        quarter.trim_end_matches('/'),
                        audio.chapter,
                        file
                    )),
                    _ => Some(format!("{}/{}", full.trim_end_matches('/'), file)),
                }
            }
            AudioLocator::Index(map) => {
                let entry = map.get(&VerseKey::new(audio.chapter, audio.verse))?;
                match audio.detail {
                    Detail::Short => entry.quarter.clone().or_else(|| Some(entry.full.clone())),
                    Detail::Full => Some(entry.full.clone()),
                }
            }
        }
    }
}
