//! Navigation Engine Integration Tests
//!
//! End-to-end command handling: raw text in, CommandResult out.

use gita_bot::corpus::{Detail, Language, LanguageSource, Library, VerseKey};
use gita_bot::engine::{CommandResult, NavigationEngine, VerseOutput};
use gita_bot::parser::{AudioMode, CommandParser, ParseContext, ParsedCommand};
use gita_bot::session::SessionStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;

/// Build a feed with `lens[i]` verses in chapter i+1; text comes from `text`
fn feed(lens: &[u32], text: impl Fn(u8, u32) -> String) -> String {
    let mut out = String::new();
    for (i, len) in lens.iter().enumerate() {
        let chapter = (i + 1) as u8;
        for verse in 1..=*len {
            out.push_str(&format!("{}.{}\t{}\n", chapter, verse, text(chapter, verse)));
        }
    }
    out
}

fn engine_with(lens: &[u32]) -> NavigationEngine {
    let hindi = feed(lens, |c, v| format!("श्लोक {}.{}", c, v));
    let english = feed(lens, |c, v| format!("Verse {}.{}", c, v));
    let library = Library::build(vec![
        LanguageSource::new(Language::Hindi, hindi),
        LanguageSource::new(Language::English, english),
    ])
    .expect("Failed to build library");
    NavigationEngine::new(Arc::new(library), Arc::new(SessionStore::new()))
}

fn keys(result: &CommandResult) -> Vec<VerseKey> {
    match result {
        CommandResult::Verses(verses) => verses.iter().map(VerseOutput::key).collect(),
        other => panic!("expected verses, got {:?}", other),
    }
}

fn key(chapter: u8, verse: u32) -> VerseKey {
    VerseKey::new(chapter, verse)
}

#[test]
fn test_random_draws_exhaust_per_chapter() {
    // Chapter 1 has verses 1-2, chapter 2 has verse 1
    let engine = engine_with(&[2, 1]);
    let mut rng = StdRng::seed_from_u64(7);

    let first = keys(&engine.handle_with_rng(1, "1", &mut rng));
    let second = keys(&engine.handle_with_rng(1, "1", &mut rng));
    assert_ne!(first, second);
    assert!(first.iter().chain(&second).all(|k| k.chapter == 1));

    assert_eq!(
        engine.handle_with_rng(1, "1", &mut rng),
        CommandResult::Exhausted { chapter: Some(1) }
    );

    // Chapter 2 is tracked separately
    assert_eq!(keys(&engine.handle_with_rng(1, "2", &mut rng)), vec![key(2, 1)]);
    assert_eq!(
        engine.handle_with_rng(1, "0", &mut rng),
        CommandResult::Exhausted { chapter: None }
    );
}

#[test]
fn test_whole_book_draws_exhaust_one_chapter_first() {
    // Chapter 1 has verses 1-2, chapter 2 has verse 1
    let lens = [2usize, 1];
    for seed in 0..16 {
        let engine = engine_with(&[2, 1]);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut drawn: Vec<VerseKey> = Vec::new();
        let (exhausted, other) = loop {
            let result = keys(&engine.handle_with_rng(1, "0", &mut rng));
            assert_eq!(result.len(), 1);
            assert!(!drawn.contains(&result[0]), "verse {} drawn twice", result[0]);
            drawn.push(result[0]);

            let used = |c: u8| drawn.iter().filter(|k| k.chapter == c).count();
            if used(1) == lens[0] && used(2) < lens[1] {
                break (1u8, 2u8);
            }
            if used(2) == lens[1] && used(1) < lens[0] {
                break (2, 1);
            }
        };

        assert_eq!(
            engine.handle_with_rng(1, &exhausted.to_string(), &mut rng),
            CommandResult::Exhausted {
                chapter: Some(exhausted)
            }
        );
        let next = keys(&engine.handle_with_rng(1, &other.to_string(), &mut rng));
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].chapter, other);
        assert!(!drawn.contains(&next[0]));
    }
}

#[test]
fn test_whole_book_draws_never_repeat() {
    let engine = engine_with(&[4, 3, 5]);
    let mut rng = StdRng::seed_from_u64(42);

    let mut seen = HashSet::new();
    for _ in 0..12 {
        let drawn = keys(&engine.handle_with_rng(9, "0", &mut rng));
        assert_eq!(drawn.len(), 1);
        assert!(seen.insert(drawn[0]), "verse {} drawn twice", drawn[0]);
    }
    assert_eq!(seen.len(), 12);
    assert_eq!(
        engine.handle_with_rng(9, "0", &mut rng),
        CommandResult::Exhausted { chapter: None }
    );

    // r0 makes everything available again
    assert_eq!(engine.handle(9, "r0"), CommandResult::ChapterReset(0));
    assert_eq!(keys(&engine.handle_with_rng(9, "0", &mut rng)).len(), 1);
}

#[test]
fn test_random_draw_renders_short_with_audio() {
    let engine = engine_with(&[3]);
    let result = engine.handle(1, "1a");
    match result {
        CommandResult::Verses(verses) => match &verses[0] {
            VerseOutput::TextWithAudio(text, audio) => {
                assert_eq!(text.detail, Detail::Short);
                assert_eq!(audio.detail, Detail::Short);
            }
            other => panic!("expected text with audio, got {:?}", other),
        },
        other => panic!("expected verses, got {:?}", other),
    }
}

#[test]
fn test_next_stops_at_missing_chapter() {
    // Cursor on the last verse of chapter 1; chapter 2 has one verse
    let engine = engine_with(&[2, 1]);
    assert_eq!(keys(&engine.handle(1, "1.2")), vec![key(1, 2)]);
    assert_eq!(keys(&engine.handle(1, "n2")), vec![key(2, 1)]);

    // Nothing further: empty, cursor stays
    assert_eq!(engine.handle(1, "n"), CommandResult::Verses(Vec::new()));
    assert_eq!(keys(&engine.handle(1, "f")), vec![key(2, 1)]);
}

#[test]
fn test_next_wraps_final_chapter_to_first() {
    let engine = engine_with(&[3; 18]);
    engine.handle(1, "18.2");
    assert_eq!(
        keys(&engine.handle(1, "n3")),
        vec![key(18, 3), key(1, 1), key(1, 2)]
    );
    assert_eq!(keys(&engine.handle(1, "f")), vec![key(1, 2)]);
}

#[test]
fn test_context_is_symmetric_and_wraps_backwards() {
    let engine = engine_with(&[3; 18]);

    engine.handle(1, "5.2");
    assert_eq!(
        keys(&engine.handle(1, "p")),
        vec![key(4, 3), key(5, 1), key(5, 2), key(5, 3), key(6, 1)]
    );

    engine.handle(1, "1.1");
    assert_eq!(
        keys(&engine.handle(1, "p")),
        vec![key(18, 2), key(18, 3), key(1, 1), key(1, 2), key(1, 3)]
    );

    // Context does not move the cursor
    assert_eq!(keys(&engine.handle(1, "f")), vec![key(1, 1)]);
}

#[test]
fn test_full_text_is_idempotent() {
    let engine = engine_with(&[3, 3]);
    engine.handle(1, "2.3");
    let before = engine.sessions().get(1);
    let first = engine.handle(1, "f");
    let second = engine.handle(1, "f");
    assert_eq!(first, second);
    assert_eq!(engine.sessions().get(1), before);
}

#[test]
fn test_lookup_miss_is_not_found() {
    let engine = engine_with(&[3]);
    assert_eq!(
        engine.handle(1, "1.99"),
        CommandResult::NotFound {
            chapter: 1,
            verse: Some(99)
        }
    );
    assert_eq!(
        engine.handle(1, "7"),
        CommandResult::NotFound {
            chapter: 7,
            verse: None
        }
    );
    // A miss never sets a cursor
    assert_eq!(engine.handle(1, "n"), CommandResult::NoPriorContext);
}

#[test]
fn test_search_pages_through_twelve_matches() {
    // Twelve verses open with अ, three do not
    let hindi = feed(&[15], |_, v| {
        if v <= 12 {
            format!("अर्जुन उवाच {}", v)
        } else {
            format!("संजय उवाच {}", v)
        }
    });
    let library = Library::build(vec![LanguageSource::new(Language::Hindi, hindi)])
        .expect("Failed to build library");
    let engine = NavigationEngine::new(Arc::new(library), Arc::new(SessionStore::new()));

    let page = match engine.handle(1, "a") {
        CommandResult::SearchResults(page) => page,
        other => panic!("expected search results, got {:?}", other),
    };
    assert_eq!(page.prefix, "अ");
    assert_eq!(page.total, 12);
    assert_eq!(page.hits.len(), 10);
    assert_eq!(page.remaining, 2);
    assert_eq!(page.hits[0].preview, "अर्जुन उवाच 1");

    let page = match engine.handle(1, "more") {
        CommandResult::SearchResults(page) => page,
        other => panic!("expected search results, got {:?}", other),
    };
    let hit_keys: Vec<VerseKey> = page.hits.iter().map(|h| h.key).collect();
    assert_eq!(hit_keys, vec![key(1, 11), key(1, 12)]);
    assert_eq!(page.remaining, 0);

    // Exhausted: empty page, selection still refers to the last page
    let page = match engine.handle(1, "more") {
        CommandResult::SearchResults(page) => page,
        other => panic!("expected search results, got {:?}", other),
    };
    assert!(page.hits.is_empty());
    assert_eq!(page.total, 12);
    assert_eq!(page.remaining, 0);

    assert_eq!(
        engine.handle(1, "3"),
        CommandResult::OutOfRange {
            selection: 3,
            page_len: 2
        }
    );
    assert_eq!(keys(&engine.handle(1, "2")), vec![key(1, 12)]);

    // Selection consumed the search
    assert_eq!(engine.handle(1, "more"), CommandResult::NoPendingSearch);
}

#[test]
fn test_all_returns_every_remaining_result() {
    let hindi = feed(&[25], |_, v| format!("धर्मक्षेत्रे {}", v));
    let library = Library::build(vec![LanguageSource::new(Language::Hindi, hindi)])
        .expect("Failed to build library");
    let engine = NavigationEngine::new(Arc::new(library), Arc::new(SessionStore::new()));

    assert!(matches!(engine.handle(1, "dha"), CommandResult::SearchResults(_)));
    match engine.handle(1, "all") {
        CommandResult::SearchResults(page) => {
            assert_eq!(page.hits.len(), 15);
            assert_eq!(page.remaining, 0);
        }
        other => panic!("expected search results, got {:?}", other),
    }
}

#[test]
fn test_audio_suffix_parsing() {
    let ctx = ParseContext::default();
    assert_eq!(
        CommandParser::parse("18.1a", ctx),
        ParsedCommand::SpecificVerse {
            chapter: 18,
            verse: 1,
            audio: AudioMode::WithAudio
        }
    );
    assert_eq!(
        CommandParser::parse("18.1ao", ctx),
        ParsedCommand::SpecificVerse {
            chapter: 18,
            verse: 1,
            audio: AudioMode::AudioOnly
        }
    );
}

#[test]
fn test_parser_is_deterministic() {
    let inputs = ["0", "18.1ao", "n10", "n11", "ka", "more", "3", "r2", "xyz", "  2.47 ", "1 8"];
    for pending in [false, true] {
        let ctx = ParseContext { pending_search: pending };
        for input in inputs {
            assert_eq!(CommandParser::parse(input, ctx), CommandParser::parse(input, ctx));
        }
    }
}

#[test]
fn test_reset_forgets_everything() {
    let engine = engine_with(&[2]);
    engine.handle(1, "1");
    engine.handle(1, "1");
    assert_eq!(engine.handle(1, "1"), CommandResult::Exhausted { chapter: Some(1) });

    assert_eq!(engine.handle(1, "reset"), CommandResult::SessionReset);
    assert_eq!(engine.handle(1, "f"), CommandResult::NoPriorContext);
    assert_eq!(keys(&engine.handle(1, "1")).len(), 1);
}

#[test]
fn test_concurrent_users_are_isolated() {
    let engine = Arc::new(engine_with(&[20, 20]));

    let handles: Vec<_> = (0..8)
        .map(|user| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let mut seen = HashSet::new();
                for _ in 0..20 {
                    let drawn = keys(&engine.handle(user, "2"));
                    assert!(seen.insert(drawn[0]));
                }
                assert_eq!(
                    engine.handle(user, "2"),
                    CommandResult::Exhausted { chapter: Some(2) }
                );
                seen.len()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().expect("worker panicked"), 20);
    }
    assert_eq!(engine.sessions().len(), 8);
}
