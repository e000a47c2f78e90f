//! Verse Corpus
//!
//! Parses raw `chapter.verse<TAB>text` feeds into a chapter-indexed corpus and
//! assembles the parallel per-language corpora into a [`Library`].
//!
//! Line format:
//! - `1.1\tधृतराष्ट्र उवाच` starts verse 1.1
//! - `1.1.2\t...` also starts verse 1.1 (sub-part number is dropped)
//! - any line without a number prefix continues the current verse

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use crate::index::VerseIndex;

/// Last chapter of the Gita; chapter numbers run 1..=18
pub const FINAL_CHAPTER: u8 = 18;

/// A first field made only of digits and dots is a verse key attempt
static KEY_LIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d*)*$").unwrap());

/// `chapter.verse[.subpart]`
static VERSE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,3})(?:\.\d+)?$").unwrap());

/// Errors raised while parsing a single corpus text
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorpusParseError {
    #[error("line {line}: malformed verse line {content:?}")]
    MalformedLine { line: usize, content: String },

    #[error("line {line}: chapter {chapter} outside 1..={max}", max = FINAL_CHAPTER)]
    ChapterOutOfRange { line: usize, chapter: u32 },

    #[error("line {line}: verse number must be at least 1")]
    ZeroVerse { line: usize },

    #[error("line {line}: continuation text before any verse")]
    OrphanContinuation { line: usize },

    #[error("line {line}: verse {chapter}.{verse} does not follow {chapter}.{previous}")]
    OutOfOrder {
        line: usize,
        chapter: u8,
        verse: u32,
        previous: u32,
    },

    #[error("line {line}: chapter {chapter} reappears after chapter {current}")]
    ChapterReopened { line: usize, chapter: u8, current: u8 },

    #[error("chapter {0} is missing (chapters must run from 1 without gaps)")]
    MissingChapter(u8),

    #[error("corpus contains no verses")]
    Empty,
}

/// Errors raised while assembling the multi-language library
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("{language} ({detail}) corpus: {source}")]
    Parse {
        language: Language,
        detail: Detail,
        #[source]
        source: CorpusParseError,
    },

    #[error("{language} ({detail}) corpus does not match {primary}: {reason}")]
    Misaligned {
        language: Language,
        detail: Detail,
        primary: Language,
        reason: String,
    },

    #[error("no language sources supplied")]
    NoSources,

    #[error("{0} supplied more than once")]
    DuplicateLanguage(Language),
}

/// Verse key: chapter and verse number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VerseKey {
    pub chapter: u8,
    pub verse: u32,
}

impl VerseKey {
    pub fn new(chapter: u8, verse: u32) -> Self {
        Self { chapter, verse }
    }
}

impl fmt::Display for VerseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.chapter, self.verse)
    }
}

/// A single verse in one language/variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verse {
    pub chapter: u8,
    pub verse: u32,
    pub text: String,
}

impl Verse {
    pub fn key(&self) -> VerseKey {
        VerseKey::new(self.chapter, self.verse)
    }
}

/// Chapter-indexed verses of one language/variant, immutable once loaded
#[derive(Debug, Clone, Default)]
pub struct VerseCorpus {
    chapters: BTreeMap<u8, Vec<Verse>>,
}

impl VerseCorpus {
    /// Parse a raw feed into a corpus
    pub fn load(raw: &str) -> Result<Self, CorpusParseError> {
        let mut chapters: BTreeMap<u8, Vec<Verse>> = BTreeMap::new();
        let mut current: Option<u8> = None;

        for (i, line) in raw.lines().enumerate() {
            let line_no = i + 1;
            let line = line.trim_start_matches('\u{feff}').trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            let (head, rest) = match line.split_once('\t') {
                Some((head, rest)) => (head.trim(), Some(rest)),
                // Without a tab, a leading key still marks a verse line
                None => (line.split_whitespace().next().unwrap_or_default(), None),
            };

            if !KEY_LIKE.is_match(head) {
                // Continuation of the current verse
                let chapter = current.ok_or(CorpusParseError::OrphanContinuation { line: line_no })?;
                if let Some(verse) = chapters.get_mut(&chapter).and_then(|v| v.last_mut()) {
                    verse.text.push('\n');
                    verse.text.push_str(line.trim());
                }
                continue;
            }

            let (Some(caps), Some(text)) = (VERSE_KEY.captures(head), rest) else {
                return Err(CorpusParseError::MalformedLine {
                    line: line_no,
                    content: line.to_string(),
                });
            };

            let chapter: u32 = caps[1].parse().map_err(|_| CorpusParseError::MalformedLine {
                line: line_no,
                content: line.to_string(),
            })?;
            let verse: u32 = caps[2].parse().map_err(|_| CorpusParseError::MalformedLine {
                line: line_no,
                content: line.to_string(),
            })?;

            if chapter == 0 || chapter > FINAL_CHAPTER as u32 {
                return Err(CorpusParseError::ChapterOutOfRange { line: line_no, chapter });
            }
            if verse == 0 {
                return Err(CorpusParseError::ZeroVerse { line: line_no });
            }
            let chapter = chapter as u8;

            if let Some(cur) = current {
                if chapter != cur && chapters.contains_key(&chapter) {
                    return Err(CorpusParseError::ChapterReopened {
                        line: line_no,
                        chapter,
                        current: cur,
                    });
                }
            }

            let verses = chapters.entry(chapter).or_default();
            match verses.last().map(|v| v.verse) {
                // Sub-parts of one verse share its key: fold them into one entry
                Some(previous) if previous == verse => {
                    if let Some(last) = verses.last_mut() {
                        last.text.push('\n');
                        last.text.push_str(text.trim());
                    }
                }
                Some(previous) if previous > verse => {
                    return Err(CorpusParseError::OutOfOrder {
                        line: line_no,
                        chapter,
                        verse,
                        previous,
                    });
                }
                _ => verses.push(Verse {
                    chapter,
                    verse,
                    text: text.trim().to_string(),
                }),
            }
            current = Some(chapter);
        }

        let max = match chapters.keys().next_back() {
            Some(max) => *max,
            None => return Err(CorpusParseError::Empty),
        };
        if let Some(missing) = (1..=max).find(|c| !chapters.contains_key(c)) {
            return Err(CorpusParseError::MissingChapter(missing));
        }

        let corpus = Self { chapters };
        debug!(
            "Corpus loaded: {} chapters, {} verses",
            corpus.chapter_count(),
            corpus.len()
        );
        Ok(corpus)
    }

    /// Verses of a chapter in source order
    pub fn chapter(&self, chapter: u8) -> Option<&[Verse]> {
        self.chapters.get(&chapter).map(|v| v.as_slice())
    }

    /// Chapter numbers present, ascending
    pub fn chapters(&self) -> impl Iterator<Item = u8> + '_ {
        self.chapters.keys().copied()
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// Total number of verses
    pub fn len(&self) -> usize {
        self.chapters.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// All verses in corpus order
    pub fn iter(&self) -> impl Iterator<Item = &Verse> {
        self.chapters.values().flatten()
    }

    /// Look up a verse by key (linear within the chapter)
    pub fn get(&self, key: VerseKey) -> Option<&Verse> {
        self.chapter(key.chapter)?.iter().find(|v| v.verse == key.verse)
    }
}

// ============ Languages ============

/// Corpus languages, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Telugu,
    Hindi,
    English,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Telugu, Language::Hindi, Language::English];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Telugu => "Telugu",
            Language::Hindi => "Hindi",
            Language::English => "English",
        }
    }

    /// Parse a configuration value (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "telugu" | "te" => Some(Language::Telugu),
            "hindi" | "hi" | "sanskrit" | "devanagari" => Some(Language::Hindi),
            "english" | "en" => Some(Language::English),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Textual variant of a verse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Detail {
    /// Without the speaker preamble
    Short,
    /// With the speaker preamble
    #[default]
    Full,
}

impl fmt::Display for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detail::Short => f.write_str("short"),
            Detail::Full => f.write_str("full"),
        }
    }
}

// ============ Library ============

/// Raw texts for one language
#[derive(Debug, Clone)]
pub struct LanguageSource {
    pub language: Language,
    pub full: String,
    pub short: Option<String>,
}

impl LanguageSource {
    pub fn new(language: Language, full: impl Into<String>) -> Self {
        Self {
            language,
            full: full.into(),
            short: None,
        }
    }

    pub fn with_short(mut self, short: impl Into<String>) -> Self {
        self.short = Some(short.into());
        self
    }
}

#[derive(Debug)]
struct LanguageCorpora {
    language: Language,
    full: VerseCorpus,
    short: Option<VerseCorpus>,
}

/// Parallel corpora for every configured language plus the shared index
#[derive(Debug)]
pub struct Library {
    index: VerseIndex,
    languages: Vec<LanguageCorpora>,
}

impl Library {
    /// Parse and align all sources; the first source is the primary corpus
    pub fn build(sources: Vec<LanguageSource>) -> Result<Self, LibraryError> {
        let mut languages: Vec<LanguageCorpora> = Vec::with_capacity(sources.len());

        for source in sources {
            if languages.iter().any(|l| l.language == source.language) {
                return Err(LibraryError::DuplicateLanguage(source.language));
            }
            let parse = |raw: &str, detail: Detail| {
                VerseCorpus::load(raw).map_err(|source_err| LibraryError::Parse {
                    language: source.language,
                    detail,
                    source: source_err,
                })
            };
            let full = parse(&source.full, Detail::Full)?;
            let short = source
                .short
                .as_deref()
                .map(|raw| parse(raw, Detail::Short))
                .transpose()?;
            languages.push(LanguageCorpora {
                language: source.language,
                full,
                short,
            });
        }

        let primary = languages.first().ok_or(LibraryError::NoSources)?;
        let primary_language = primary.language;

        for lang in &languages {
            let variants = std::iter::once((Detail::Full, &lang.full))
                .chain(lang.short.as_ref().map(|s| (Detail::Short, s)));
            for (detail, corpus) in variants {
                if let Some(reason) = misalignment(&primary.full, corpus) {
                    return Err(LibraryError::Misaligned {
                        language: lang.language,
                        detail,
                        primary: primary_language,
                        reason,
                    });
                }
            }
        }

        let index = VerseIndex::build(&primary.full);
        info!(
            "Library built: {} languages, {} chapters, {} verses",
            languages.len(),
            index.chapter_count(),
            index.len()
        );

        Ok(Self { index, languages })
    }

    pub fn index(&self) -> &VerseIndex {
        &self.index
    }

    /// Languages in the order they were supplied
    pub fn languages(&self) -> Vec<Language> {
        self.languages.iter().map(|l| l.language).collect()
    }

    /// Corpus for a language and variant; Short falls back to Full when no
    /// short text was supplied for that language
    pub fn corpus(&self, language: Language, detail: Detail) -> Option<&VerseCorpus> {
        let lang = self.languages.iter().find(|l| l.language == language)?;
        match detail {
            Detail::Short => Some(lang.short.as_ref().unwrap_or(&lang.full)),
            Detail::Full => Some(&lang.full),
        }
    }

    /// Per-language text at a corpus position, in display order
    pub fn texts(&self, chapter: u8, index: usize, detail: Detail) -> Vec<(Language, String)> {
        Language::ALL
            .iter()
            .filter_map(|lang| {
                let verses = self.corpus(*lang, detail)?.chapter(chapter)?;
                verses.get(index).map(|v| (*lang, v.text.clone()))
            })
            .collect()
    }
}

/// Describe the first key difference between two corpora, if any
fn misalignment(primary: &VerseCorpus, other: &VerseCorpus) -> Option<String> {
    let mut a = primary.iter().map(Verse::key);
    let mut b = other.iter().map(Verse::key);
    loop {
        match (a.next(), b.next()) {
            (None, None) => return None,
            (Some(x), Some(y)) if x == y => continue,
            (Some(x), Some(y)) => return Some(format!("expected {}, found {}", x, y)),
            (Some(x), None) => return Some(format!("missing {} and later verses", x)),
            (None, Some(y)) => return Some(format!("extra verse {}", y)),
        }
    }
}
