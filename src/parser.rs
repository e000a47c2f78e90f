//! Command Parser
//!
//! Turns a compact chat command into a [`ParsedCommand`].
//!
//! Parsing is two-phase:
//! 1. Split off one trailing audio modifier, longest first (`ao`, then `a`).
//!    A modifier is only split off when something remains in front of it.
//! 2. Match the rules in order. Rules for commands that take a modifier
//!    (`18.1`, `3`, `f`, `n2`, `p`) match the stripped base; the rest
//!    (`o`, syllables, `more`/`all`, `reset`, ...) match the whole token, so
//!    `aa` is a syllable search and never `a` + audio.

use once_cell::sync::Lazy;
use regex::Regex;

/// Largest accepted `n<count>`
pub const MAX_NEXT_COUNT: usize = 10;

static SPECIFIC_VERSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\.(\d+)$").unwrap());
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());
static NEXT_N: Lazy<Regex> = Lazy::new(|| Regex::new(r"^n(\d*)$").unwrap());
static RESET_CHAPTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^r(\d+)$").unwrap());

/// Latin syllable → Devanagari prefix. `o`, `na` and `pa` are listed for
/// completeness but the commands `o`, `n`+audio and `p`+audio take
/// precedence over them.
pub static SYLLABLES: &[(&str, &str)] = &[
    // Vowels
    ("a", "अ"),
    ("aa", "आ"),
    ("i", "इ"),
    ("ii", "ई"),
    ("ee", "ई"),
    ("u", "उ"),
    ("uu", "ऊ"),
    ("oo", "ऊ"),
    ("ri", "ऋ"),
    ("e", "ए"),
    ("ai", "ऐ"),
    ("o", "ओ"),
    ("au", "औ"),
    // Consonants with inherent vowel
    ("ka", "क"),
    ("kha", "ख"),
    ("ga", "ग"),
    ("gha", "घ"),
    ("cha", "च"),
    ("chha", "छ"),
    ("ja", "ज"),
    ("jha", "झ"),
    ("ta", "त"),
    ("tha", "थ"),
    ("da", "द"),
    ("dha", "ध"),
    ("na", "न"),
    ("pa", "प"),
    ("pha", "फ"),
    ("ba", "ब"),
    ("bha", "भ"),
    ("ma", "म"),
    ("ya", "य"),
    ("ra", "र"),
    ("la", "ल"),
    ("va", "व"),
    ("sha", "श"),
    ("sa", "स"),
    ("ha", "ह"),
    // Conjuncts
    ("ksha", "क्ष"),
    ("tra", "त्र"),
    ("jna", "ज्ञ"),
    ("gya", "ज्ञ"),
    ("shra", "श्र"),
];

/// Look up the Devanagari prefix for a Latin syllable
pub fn transliterate(syllable: &str) -> Option<&'static str> {
    SYLLABLES
        .iter()
        .find(|(latin, _)| *latin == syllable)
        .map(|(_, script)| *script)
}

/// How audio accompanies a verse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioMode {
    #[default]
    None,
    /// Text plus audio (`a` suffix)
    WithAudio,
    /// Audio without text (`ao` suffix)
    AudioOnly,
}

impl AudioMode {
    pub fn with_audio(&self) -> bool {
        matches!(self, AudioMode::WithAudio)
    }

    pub fn audio_only(&self) -> bool {
        matches!(self, AudioMode::AudioOnly)
    }
}

/// Chapter operand of a random draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterChoice {
    /// `0`: any verse in the corpus
    Any,
    Chapter(u32),
}

/// Paging request for a pending search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    More,
    All,
}

/// Parser input beyond the text itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseContext {
    /// The user has search results waiting to be paged or selected
    pub pending_search: bool,
}

/// Result of parsing one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    SpecificVerse { chapter: u32, verse: u32, audio: AudioMode },
    RandomVerse { chapter: ChapterChoice, audio: AudioMode },
    LastVerseFull { audio: AudioMode },
    NextN { count: usize, audio: AudioMode },
    Context { audio: AudioMode },
    LastVerseAudioOnly,
    SearchByPrefix { syllable: String, prefix: String },
    SearchPaginate(PageMode),
    /// 1-based selection from the current search page
    SearchSelect(usize),
    Reset,
    /// `r<chapter>`; 0 clears every chapter
    ResetChapter(u32),
    Help,
    /// Not a command; carries the original text for the help reply
    Invalid(String),
}

impl ParsedCommand {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ParsedCommand::SpecificVerse { .. } => "specific_verse",
            ParsedCommand::RandomVerse { .. } => "random_verse",
            ParsedCommand::LastVerseFull { .. } => "last_verse_full",
            ParsedCommand::NextN { .. } => "next_n",
            ParsedCommand::Context { .. } => "context",
            ParsedCommand::LastVerseAudioOnly => "last_verse_audio_only",
            ParsedCommand::SearchByPrefix { .. } => "search_by_prefix",
            ParsedCommand::SearchPaginate(_) => "search_paginate",
            ParsedCommand::SearchSelect(_) => "search_select",
            ParsedCommand::Reset => "reset",
            ParsedCommand::ResetChapter(_) => "reset_chapter",
            ParsedCommand::Help => "help",
            ParsedCommand::Invalid(_) => "invalid",
        }
    }
}

/// Split one trailing audio modifier off `token`
fn split_audio(token: &str) -> (&str, AudioMode) {
    if let Some(base) = token.strip_suffix("ao").filter(|b| !b.is_empty()) {
        return (base, AudioMode::AudioOnly);
    }
    if let Some(base) = token.strip_suffix('a').filter(|b| !b.is_empty()) {
        return (base, AudioMode::WithAudio);
    }
    (token, AudioMode::None)
}

/// Stateless command parser
pub struct CommandParser;

impl CommandParser {
    /// Parse a raw command. Case-insensitive; surrounding whitespace is
    /// trimmed, inner whitespace makes the input invalid.
    pub fn parse(input: &str, ctx: ParseContext) -> ParsedCommand {
        let token = input.trim().to_lowercase();
        if token.is_empty() {
            return ParsedCommand::Invalid(input.to_string());
        }

        let (base, audio) = split_audio(&token);

        if let Some(cmd) = Self::parse_modified(base, audio, ctx) {
            return cmd;
        }
        if let Some(cmd) = Self::parse_plain(&token) {
            return cmd;
        }
        ParsedCommand::Invalid(input.to_string())
    }

    /// Rules for commands that accept an audio modifier
    fn parse_modified(base: &str, audio: AudioMode, ctx: ParseContext) -> Option<ParsedCommand> {
        if let Some(caps) = SPECIFIC_VERSE.captures(base) {
            let chapter = caps[1].parse().ok()?;
            let verse = caps[2].parse().ok()?;
            return Some(ParsedCommand::SpecificVerse { chapter, verse, audio });
        }

        if DIGITS.is_match(base) {
            let n: u32 = base.parse().ok()?;
            // Bare digits pick from pending search results
            if ctx.pending_search && audio == AudioMode::None {
                return Some(ParsedCommand::SearchSelect(n as usize));
            }
            let chapter = if n == 0 {
                ChapterChoice::Any
            } else {
                ChapterChoice::Chapter(n)
            };
            return Some(ParsedCommand::RandomVerse { chapter, audio });
        }

        if base == "f" {
            return Some(ParsedCommand::LastVerseFull { audio });
        }

        if let Some(caps) = NEXT_N.captures(base) {
            let count = match &caps[1] {
                "" => 1,
                digits => digits.parse::<usize>().ok()?,
            };
            if !(1..=MAX_NEXT_COUNT).contains(&count) {
                return None;
            }
            return Some(ParsedCommand::NextN { count, audio });
        }

        if base == "p" {
            return Some(ParsedCommand::Context { audio });
        }

        None
    }

    /// Rules matched against the whole token
    fn parse_plain(token: &str) -> Option<ParsedCommand> {
        if token == "o" {
            return Some(ParsedCommand::LastVerseAudioOnly);
        }

        if let Some(prefix) = transliterate(token) {
            return Some(ParsedCommand::SearchByPrefix {
                syllable: token.to_string(),
                prefix: prefix.to_string(),
            });
        }

        match token {
            "more" => return Some(ParsedCommand::SearchPaginate(PageMode::More)),
            "all" => return Some(ParsedCommand::SearchPaginate(PageMode::All)),
            "reset" => return Some(ParsedCommand::Reset),
            "help" | "h" | "?" | "/start" | "/help" => return Some(ParsedCommand::Help),
            _ => {}
        }

        RESET_CHAPTER
            .captures(token)
            .and_then(|caps| caps[1].parse().ok())
            .map(ParsedCommand::ResetChapter)
    }
}
