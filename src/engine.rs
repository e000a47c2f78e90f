//! Navigation Engine
//!
//! Resolves parsed commands against the library and the user's session.
//!
//! ```text
//! raw text ──► CommandParser ──► ParsedCommand
//!                                    │
//!          SessionStore (per-user) ◄─┼─► Library / VerseIndex (read-only)
//!                                    ▼
//!                              CommandResult
//! ```
//!
//! Every relative move (`n`, `p`) goes through [`VerseIndex::offset`].
//! Lookup misses come back as `NotFound`; the engine never substitutes a
//! different verse.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::audio::AudioRef;
use crate::corpus::{Detail, Language, Library, VerseCorpus, VerseKey};
use crate::index::Position;
use crate::parser::{AudioMode, ChapterChoice, CommandParser, PageMode, ParseContext, ParsedCommand};
use crate::session::{PendingSearch, SessionState, SessionStore, UserId};

/// Search results shown per page
pub const SEARCH_PAGE_SIZE: usize = 10;

/// Verses shown on each side of the cursor by `p`
const CONTEXT_RADIUS: i64 = 2;

const VIRAMA: char = '\u{094D}';

/// "says" closing a speaker line, in Devanagari and Telugu
const UVACHA: [&str; 2] = ["उवाच", "ఉవాచ"];

/// Text of one verse in every loaded language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerseText {
    pub chapter: u8,
    pub verse: u32,
    pub detail: Detail,
    pub texts: Vec<(Language, String)>,
}

impl VerseText {
    pub fn key(&self) -> VerseKey {
        VerseKey::new(self.chapter, self.verse)
    }
}

/// One resolved verse as it should be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerseOutput {
    Text(VerseText),
    TextWithAudio(VerseText, AudioRef),
    AudioOnly(AudioRef),
}

impl VerseOutput {
    pub fn key(&self) -> VerseKey {
        match self {
            VerseOutput::Text(text) | VerseOutput::TextWithAudio(text, _) => text.key(),
            VerseOutput::AudioOnly(audio) => VerseKey::new(audio.chapter, audio.verse),
        }
    }

    pub fn text(&self) -> Option<&VerseText> {
        match self {
            VerseOutput::Text(text) | VerseOutput::TextWithAudio(text, _) => Some(text),
            VerseOutput::AudioOnly(_) => None,
        }
    }

    pub fn audio(&self) -> Option<&AudioRef> {
        match self {
            VerseOutput::TextWithAudio(_, audio) | VerseOutput::AudioOnly(audio) => Some(audio),
            VerseOutput::Text(_) => None,
        }
    }
}

/// A search result line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub key: VerseKey,
    /// First line of the matched text
    pub preview: String,
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    pub prefix: String,
    /// Numbered 1.. for selection
    pub hits: Vec<SearchHit>,
    pub total: usize,
    /// Results after this page
    pub remaining: usize,
}

/// Outcome of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Resolved verses in order (may be empty when `n` cannot move)
    Verses(Vec<VerseOutput>),
    SearchResults(SearchPage),
    /// No undrawn verse left; `None` means the whole corpus
    Exhausted { chapter: Option<u8> },
    NotFound { chapter: u32, verse: Option<u32> },
    NoPriorContext,
    NoPendingSearch,
    OutOfRange { selection: usize, page_len: usize },
    InvalidInput(String),
    SessionReset,
    /// 0 means every chapter
    ChapterReset(u8),
    Help,
}

impl CommandResult {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            CommandResult::Verses(_) => "verses",
            CommandResult::SearchResults(_) => "search_results",
            CommandResult::Exhausted { .. } => "exhausted",
            CommandResult::NotFound { .. } => "not_found",
            CommandResult::NoPriorContext => "no_prior_context",
            CommandResult::NoPendingSearch => "no_pending_search",
            CommandResult::OutOfRange { .. } => "out_of_range",
            CommandResult::InvalidInput(_) => "invalid_input",
            CommandResult::SessionReset => "session_reset",
            CommandResult::ChapterReset(_) => "chapter_reset",
            CommandResult::Help => "help",
        }
    }
}

/// Resolves commands for all users
pub struct NavigationEngine {
    library: Arc<Library>,
    sessions: Arc<SessionStore>,
    search_language: Language,
}

impl NavigationEngine {
    pub fn new(library: Arc<Library>, sessions: Arc<SessionStore>) -> Self {
        let search_language = library
            .languages()
            .into_iter()
            .find(|l| *l == Language::Hindi)
            .or_else(|| library.languages().first().copied())
            .unwrap_or(Language::Hindi);
        Self {
            library,
            sessions,
            search_language,
        }
    }

    /// Scan `language` for syllable searches (ignored if it is not loaded)
    pub fn with_search_language(mut self, language: Language) -> Self {
        if self.library.languages().contains(&language) {
            self.search_language = language;
        } else {
            warn!(
                "Search language {} not loaded, keeping {}",
                language, self.search_language
            );
        }
        self
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn search_language(&self) -> Language {
        self.search_language
    }

    /// Parse and resolve one command for a user
    pub fn handle(&self, user_id: UserId, raw: &str) -> CommandResult {
        self.handle_with_rng(user_id, raw, &mut rand::thread_rng())
    }

    /// [`handle`](Self::handle) with a caller-supplied random source
    pub fn handle_with_rng<R: Rng + ?Sized>(&self, user_id: UserId, raw: &str, rng: &mut R) -> CommandResult {
        self.sessions.with_session(user_id, |state| {
            let ctx = ParseContext {
                pending_search: state.pending_search.is_some(),
            };
            let command = CommandParser::parse(raw, ctx);
            let result = self.execute(command.clone(), state, rng);
            debug!(
                "user={} command={} result={} cursor={:?}",
                user_id,
                command.kind(),
                result.kind(),
                state.cursor
            );
            result
        })
    }

    /// Resolve an already parsed command against a session
    pub fn execute<R: Rng + ?Sized>(
        &self,
        command: ParsedCommand,
        state: &mut SessionState,
        rng: &mut R,
    ) -> CommandResult {
        if clears_pending_search(&command) {
            state.pending_search = None;
        }

        match command {
            ParsedCommand::RandomVerse { chapter, audio } => self.random_verse(chapter, audio, state, rng),
            ParsedCommand::SpecificVerse { chapter, verse, audio } => {
                self.specific_verse(chapter, verse, audio, state)
            }
            ParsedCommand::NextN { count, audio } => self.next_n(count, audio, state),
            ParsedCommand::Context { audio } => self.context(audio, state),
            ParsedCommand::LastVerseFull { audio } => self.last_verse(audio, state),
            ParsedCommand::LastVerseAudioOnly => self.last_verse(AudioMode::AudioOnly, state),
            ParsedCommand::SearchByPrefix { prefix, .. } => self.search(&prefix, state),
            ParsedCommand::SearchPaginate(mode) => self.paginate(mode, state),
            ParsedCommand::SearchSelect(selection) => self.select(selection, state),
            ParsedCommand::Reset => {
                *state = SessionState::default();
                CommandResult::SessionReset
            }
            ParsedCommand::ResetChapter(chapter) => self.reset_chapter(chapter, state),
            ParsedCommand::Help => CommandResult::Help,
            ParsedCommand::Invalid(original) => CommandResult::InvalidInput(original),
        }
    }

    // ============ Verse commands ============

    fn random_verse<R: Rng + ?Sized>(
        &self,
        choice: ChapterChoice,
        audio: AudioMode,
        state: &mut SessionState,
        rng: &mut R,
    ) -> CommandResult {
        let index = self.library.index();

        let (candidates, scope): (Vec<Position>, Option<u8>) = match choice {
            ChapterChoice::Any => (
                index
                    .positions()
                    .filter(|p| !state.is_used(p.chapter, p.index))
                    .collect(),
                None,
            ),
            ChapterChoice::Chapter(n) => {
                let Some((chapter, len)) = self.chapter_with_len(n) else {
                    return CommandResult::NotFound { chapter: n, verse: None };
                };
                let available = state
                    .available_indices(chapter, len)
                    .into_iter()
                    .map(|i| Position::new(chapter, i))
                    .collect();
                (available, Some(chapter))
            }
        };

        let Some(pos) = candidates.choose(rng).copied() else {
            return CommandResult::Exhausted { chapter: scope };
        };

        state.mark_used(pos.chapter, pos.index);
        state.cursor = Some(pos);
        self.single(pos, Detail::Short, audio)
    }

    fn specific_verse(&self, chapter: u32, verse: u32, audio: AudioMode, state: &mut SessionState) -> CommandResult {
        let pos = u8::try_from(chapter)
            .ok()
            .and_then(|c| self.library.index().position_of(c, verse));
        let Some(pos) = pos else {
            return CommandResult::NotFound {
                chapter,
                verse: Some(verse),
            };
        };
        state.cursor = Some(pos);
        self.single(pos, Detail::Full, audio)
    }

    fn next_n(&self, count: usize, audio: AudioMode, state: &mut SessionState) -> CommandResult {
        let Some(mut cursor) = state.cursor else {
            return CommandResult::NoPriorContext;
        };

        let mut verses = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(next) = self.library.index().offset_from(cursor, 1) else {
                break;
            };
            let Some(output) = self.output(next, Detail::Full, audio) else {
                break;
            };
            verses.push(output);
            cursor = next;
            state.cursor = Some(next);
        }
        CommandResult::Verses(verses)
    }

    fn context(&self, audio: AudioMode, state: &SessionState) -> CommandResult {
        let Some(cursor) = state.cursor else {
            return CommandResult::NoPriorContext;
        };
        let verses = (-CONTEXT_RADIUS..=CONTEXT_RADIUS)
            .filter_map(|delta| self.library.index().offset_from(cursor, delta))
            .filter_map(|pos| self.output(pos, Detail::Full, audio))
            .collect();
        CommandResult::Verses(verses)
    }

    fn last_verse(&self, audio: AudioMode, state: &SessionState) -> CommandResult {
        match state.cursor {
            Some(cursor) => self.single(cursor, Detail::Full, audio),
            None => CommandResult::NoPriorContext,
        }
    }

    fn reset_chapter(&self, chapter: u32, state: &mut SessionState) -> CommandResult {
        if chapter == 0 {
            state.used.clear();
            return CommandResult::ChapterReset(0);
        }
        match self.chapter_with_len(chapter) {
            Some((c, _)) => {
                state.reset_chapter(c);
                CommandResult::ChapterReset(c)
            }
            None => CommandResult::NotFound { chapter, verse: None },
        }
    }

    // ============ Search ============

    fn search(&self, prefix: &str, state: &mut SessionState) -> CommandResult {
        let corpus = self.search_corpus();
        let results: Vec<VerseKey> = corpus
            .iter()
            .filter(|v| starts_with_syllable(verse_opening(&v.text), prefix))
            .map(|v| v.key())
            .collect();

        debug!("Search {:?}: {} matches in {}", prefix, results.len(), self.search_language);

        let mut pending = PendingSearch::new(prefix, results);
        pending.advance(Some(SEARCH_PAGE_SIZE));
        let page = self.page(&pending, true);
        state.pending_search = (!pending.results.is_empty()).then_some(pending);
        CommandResult::SearchResults(page)
    }

    fn paginate(&self, mode: PageMode, state: &mut SessionState) -> CommandResult {
        let Some(pending) = state.pending_search.as_mut() else {
            return CommandResult::NoPendingSearch;
        };
        let size = match mode {
            PageMode::More => Some(SEARCH_PAGE_SIZE),
            PageMode::All => None,
        };
        let advanced = pending.advance(size);
        CommandResult::SearchResults(self.page(pending, advanced))
    }

    fn select(&self, selection: usize, state: &mut SessionState) -> CommandResult {
        let Some(pending) = state.pending_search.as_ref() else {
            return CommandResult::NoPendingSearch;
        };
        let page = pending.current_page();
        let Some(key) = selection.checked_sub(1).and_then(|i| page.get(i)).copied() else {
            return CommandResult::OutOfRange {
                selection,
                page_len: page.len(),
            };
        };
        state.pending_search = None;
        self.specific_verse(key.chapter as u32, key.verse, AudioMode::None, state)
    }

    /// Current page of a pending search; `fresh` false yields an empty page
    fn page(&self, pending: &PendingSearch, fresh: bool) -> SearchPage {
        let hits = if fresh {
            pending
                .current_page()
                .iter()
                .map(|key| SearchHit {
                    key: *key,
                    preview: self.preview(*key),
                })
                .collect()
        } else {
            Vec::new()
        };
        SearchPage {
            prefix: pending.prefix.clone(),
            hits,
            total: pending.results.len(),
            remaining: pending.remaining(),
        }
    }

    fn preview(&self, key: VerseKey) -> String {
        self.search_corpus()
            .chapter(key.chapter)
            .and_then(|verses| {
                let pos = self.library.index().position_of(key.chapter, key.verse)?;
                verses.get(pos.index)
            })
            .and_then(|v| verse_opening(&v.text).lines().next())
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    fn search_corpus(&self) -> &VerseCorpus {
        self.library
            .corpus(self.search_language, Detail::Short)
            .or_else(|| {
                let first = *self.library.languages().first()?;
                self.library.corpus(first, Detail::Short)
            })
            .unwrap_or_else(|| &*EMPTY_CORPUS)
    }

    // ============ Output ============

    fn chapter_with_len(&self, chapter: u32) -> Option<(u8, usize)> {
        let chapter = u8::try_from(chapter).ok()?;
        let len = self.library.index().chapter_len(chapter)?;
        Some((chapter, len))
    }

    fn single(&self, pos: Position, detail: Detail, audio: AudioMode) -> CommandResult {
        match self.output(pos, detail, audio) {
            Some(output) => CommandResult::Verses(vec![output]),
            None => CommandResult::NotFound {
                chapter: pos.chapter as u32,
                verse: None,
            },
        }
    }

    fn output(&self, pos: Position, detail: Detail, audio: AudioMode) -> Option<VerseOutput> {
        let key = self.library.index().key_at(pos)?;
        let audio_ref = AudioRef::new(key, detail);
        if audio.audio_only() {
            return Some(VerseOutput::AudioOnly(audio_ref));
        }
        let text = VerseText {
            chapter: key.chapter,
            verse: key.verse,
            detail,
            texts: self.library.texts(pos.chapter, pos.index, detail),
        };
        if audio.with_audio() {
            Some(VerseOutput::TextWithAudio(text, audio_ref))
        } else {
            Some(VerseOutput::Text(text))
        }
    }
}

static EMPTY_CORPUS: Lazy<VerseCorpus> = Lazy::new(VerseCorpus::default);

/// Commands other than search browsing drop any pending search
fn clears_pending_search(command: &ParsedCommand) -> bool {
    !matches!(
        command,
        ParsedCommand::SearchByPrefix { .. }
            | ParsedCommand::SearchPaginate(_)
            | ParsedCommand::SearchSelect(_)
            | ParsedCommand::Help
            | ParsedCommand::Invalid(_)
    )
}

/// Verse text without a leading speaker line ("संजय उवाच"), which the
/// full texts carry
fn verse_opening(text: &str) -> &str {
    let text = text.trim_start();
    match text.split_once('\n') {
        Some((first, rest)) if UVACHA.iter().any(|u| first.trim_end().ends_with(u)) => rest.trim_start(),
        _ => text,
    }
}

/// Prefix match at syllable granularity: a bare consonant prefix does not
/// match the start of a conjunct (क does not match क्ष)
fn starts_with_syllable(text: &str, prefix: &str) -> bool {
    let Some(rest) = text.strip_prefix(prefix) else {
        return false;
    };
    let consonant_final = prefix.chars().last().is_some_and(is_consonant);
    !(consonant_final && rest.starts_with(VIRAMA))
}

fn is_consonant(c: char) -> bool {
    ('\u{0915}'..='\u{0939}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::LanguageSource;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn engine(hindi: &str, english: &str) -> NavigationEngine {
        let library = Library::build(vec![
            LanguageSource::new(Language::Hindi, hindi),
            LanguageSource::new(Language::English, english),
        ])
        .unwrap();
        NavigationEngine::new(Arc::new(library), Arc::new(SessionStore::new()))
    }

    fn small() -> NavigationEngine {
        engine(
            "1.1\tधर्मक्षेत्रे\n1.2\tसञ्जय उवाच\n2.1\tतं तथा\n",
            "1.1\tOn the field\n1.2\tSanjaya said\n2.1\tTo him thus\n",
        )
    }

    fn keys(result: &CommandResult) -> Vec<VerseKey> {
        match result {
            CommandResult::Verses(v) => v.iter().map(VerseOutput::key).collect(),
            other => panic!("expected verses, got {:?}", other),
        }
    }

    #[test]
    fn test_specific_verse_sets_cursor() {
        let engine = small();
        let result = engine.handle(1, "1.2");
        assert_eq!(keys(&result), vec![VerseKey::new(1, 2)]);
        assert_eq!(engine.sessions().get(1).cursor, Some(Position::new(1, 1)));
    }

    #[test]
    fn test_specific_verse_not_found() {
        let engine = small();
        assert_eq!(
            engine.handle(1, "1.9"),
            CommandResult::NotFound { chapter: 1, verse: Some(9) }
        );
        assert_eq!(
            engine.handle(1, "300.1"),
            CommandResult::NotFound { chapter: 300, verse: Some(1) }
        );
        assert_eq!(engine.sessions().get(1).cursor, None);
    }

    #[test]
    fn test_audio_modes() {
        let engine = small();
        match engine.handle(1, "2.1a") {
            CommandResult::Verses(v) => match &v[0] {
                VerseOutput::TextWithAudio(text, audio) => {
                    assert_eq!(text.texts.len(), 2);
                    assert_eq!(audio.file_name(), "2.1.mp3");
                    assert_eq!(audio.detail, Detail::Full);
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
        match engine.handle(1, "o") {
            CommandResult::Verses(v) => assert!(matches!(v[0], VerseOutput::AudioOnly(_))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_random_draw_is_short_and_marks_used() {
        let engine = small();
        let mut rng = StdRng::seed_from_u64(7);
        match engine.handle_with_rng(1, "2", &mut rng) {
            CommandResult::Verses(v) => {
                assert_eq!(v[0].key(), VerseKey::new(2, 1));
                assert_eq!(v[0].text().unwrap().detail, Detail::Short);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(engine.sessions().get(1).is_used(2, 0));
        assert_eq!(
            engine.handle_with_rng(1, "2", &mut rng),
            CommandResult::Exhausted { chapter: Some(2) }
        );
    }

    #[test]
    fn test_random_unknown_chapter() {
        let engine = small();
        assert_eq!(
            engine.handle(1, "7"),
            CommandResult::NotFound { chapter: 7, verse: None }
        );
    }

    #[test]
    fn test_relative_commands_need_cursor() {
        let engine = small();
        assert_eq!(engine.handle(1, "n"), CommandResult::NoPriorContext);
        assert_eq!(engine.handle(1, "p"), CommandResult::NoPriorContext);
        assert_eq!(engine.handle(1, "f"), CommandResult::NoPriorContext);
        assert_eq!(engine.handle(1, "o"), CommandResult::NoPriorContext);
    }

    #[test]
    fn test_context_skips_missing_neighbours() {
        let engine = small();
        engine.handle(1, "1.1");
        // 1.1 has nothing before it (chapter 18 is absent)
        let result = engine.handle(1, "p");
        assert_eq!(
            keys(&result),
            vec![VerseKey::new(1, 1), VerseKey::new(1, 2), VerseKey::new(2, 1)]
        );
        assert_eq!(engine.sessions().get(1).cursor, Some(Position::new(1, 0)));
    }

    #[test]
    fn test_reset_commands() {
        let engine = small();
        let mut rng = StdRng::seed_from_u64(1);
        engine.handle_with_rng(1, "2", &mut rng);
        assert_eq!(engine.handle(1, "r2"), CommandResult::ChapterReset(2));
        assert!(!engine.sessions().get(1).is_used(2, 0));
        assert_eq!(engine.handle(1, "r9"), CommandResult::NotFound { chapter: 9, verse: None });

        engine.handle(1, "1.1");
        assert_eq!(engine.handle(1, "reset"), CommandResult::SessionReset);
        assert_eq!(engine.sessions().get(1), SessionState::default());
    }

    #[test]
    fn test_search_virama_boundary() {
        assert!(starts_with_syllable("कर्म", "क"));
        assert!(starts_with_syllable("कि", "क"));
        assert!(!starts_with_syllable("क्षेत्र", "क"));
        assert!(starts_with_syllable("क्षेत्र", "क्ष"));
        assert!(starts_with_syllable("अर्जुन", "अ"));
        assert!(!starts_with_syllable("आत्मा", "अ"));
    }

    #[test]
    fn test_search_skips_speaker_line() {
        let engine = engine(
            "1.1\tधर्मक्षेत्रे\n1.2\tसंजय उवाच\n\tदृष्ट्वा तु\n1.3\tसंजय\n",
            "1.1\tOn the field\n1.2\tSanjaya said\n1.3\tSanjaya\n",
        );

        // Only 1.3 actually opens with स
        match engine.handle(1, "sa") {
            CommandResult::SearchResults(page) => {
                let keys: Vec<VerseKey> = page.hits.iter().map(|h| h.key).collect();
                assert_eq!(keys, vec![VerseKey::new(1, 3)]);
            }
            other => panic!("unexpected {:?}", other),
        }

        match engine.handle(1, "da") {
            CommandResult::SearchResults(page) => {
                assert_eq!(page.hits.len(), 1);
                assert_eq!(page.hits[0].key, VerseKey::new(1, 2));
                assert_eq!(page.hits[0].preview, "दृष्ट्वा तु");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_verse_opening() {
        assert_eq!(verse_opening("संजय उवाच\nदृष्ट्वा तु"), "दृष्ट्वा तु");
        assert_eq!(verse_opening("సంజయ ఉవాచ\nదృష్ట్వా"), "దృష్ట్వా");
        assert_eq!(verse_opening("धर्मक्षेत्रे\nकुरुक्षेत्रे"), "धर्मक्षेत्रे\nकुरुक्षेत्रे");
        assert_eq!(verse_opening("संजय उवाच"), "संजय उवाच");
    }

    #[test]
    fn test_search_and_select() {
        let engine = small();
        let result = engine.handle(1, "dha");
        match &result {
            CommandResult::SearchResults(page) => {
                assert_eq!(page.total, 1);
                assert_eq!(page.hits[0].key, VerseKey::new(1, 1));
                assert_eq!(page.hits[0].preview, "धर्मक्षेत्रे");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            engine.handle(1, "2"),
            CommandResult::OutOfRange { selection: 2, page_len: 1 }
        );
        assert_eq!(keys(&engine.handle(1, "1")), vec![VerseKey::new(1, 1)]);
        assert_eq!(engine.sessions().get(1).pending_search, None);
    }

    #[test]
    fn test_empty_search_leaves_no_pending() {
        let engine = small();
        match engine.handle(1, "gha") {
            CommandResult::SearchResults(page) => assert!(page.hits.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(engine.handle(1, "more"), CommandResult::NoPendingSearch);
    }

    #[test]
    fn test_other_commands_drop_pending_search() {
        let engine = small();
        engine.handle(1, "dha");
        engine.handle(1, "2.1");
        assert_eq!(engine.sessions().get(1).pending_search, None);
    }
}
