//! Reply Rendering
//!
//! Turns a [`CommandResult`] into plain-text and audio replies shared by the
//! Telegram and console front ends.

use crate::audio::{AudioLocator, AudioRef};
use crate::corpus::FINAL_CHAPTER;
use crate::engine::{CommandResult, SearchPage, VerseOutput, VerseText, SEARCH_PAGE_SIZE};

/// A single outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Audio { url: String, caption: String },
}

pub const HELP: &str = "\
🙏 Bhagavad Gita verse bot

Commands:
• 0 - random verse from the whole Gita
• 1-18 - random verse from that chapter (no repeats)
• 2.47 - a specific verse
• f - full text of the last verse
• n, n2..n10 - next verse(s), continuing into the next chapter
• p - two verses before and after the last verse
• o - audio of the last verse
• ka, ma, dha, ... - verses starting with that syllable
• more / all - further search results; a number opens one
• r3 - start chapter 3 over, r0 - every chapter
• reset - forget everything

Add a for audio (2.47a, 3a, n2a) or ao for audio only (2.47ao).";

/// Render a result; audio URLs come from `locator`
pub fn render(result: &CommandResult, locator: &AudioLocator) -> Vec<Reply> {
    match result {
        CommandResult::Verses(verses) if verses.is_empty() => {
            vec![Reply::Text("ℹ️ No further verses.".to_string())]
        }
        CommandResult::Verses(verses) => verses.iter().flat_map(|v| render_verse(v, locator)).collect(),
        CommandResult::SearchResults(page) => vec![Reply::Text(format_search_page(page))],
        CommandResult::Exhausted { chapter: Some(chapter) } => vec![Reply::Text(format!(
            "✅ All verses of chapter {} have been shown.\nSend r{} to start the chapter again.",
            chapter, chapter
        ))],
        CommandResult::Exhausted { chapter: None } => vec![Reply::Text(
            "✅ Every verse has been shown.\nSend r0 to start again.".to_string(),
        )],
        CommandResult::NotFound {
            chapter,
            verse: Some(verse),
        } => vec![Reply::Text(format!("❌ Shloka {}.{} not found!", chapter, verse))],
        CommandResult::NotFound { chapter, verse: None } => vec![Reply::Text(format!(
            "❌ Invalid chapter number {}. Please enter a number between 0-{}.",
            chapter, FINAL_CHAPTER
        ))],
        CommandResult::NoPriorContext => vec![Reply::Text(format!(
            "ℹ️ No verse yet. Send a chapter number (0-{}) or a verse like 2.47 first.",
            FINAL_CHAPTER
        ))],
        CommandResult::NoPendingSearch => vec![Reply::Text(
            "ℹ️ No search in progress. Send a syllable such as ka to search.".to_string(),
        )],
        CommandResult::OutOfRange { selection, page_len } => vec![Reply::Text(format!(
            "❌ {} is not on the current page (choose 1-{}).",
            selection, page_len
        ))],
        CommandResult::InvalidInput(original) => vec![Reply::Text(format!(
            "❓ Unrecognized command: {}\n\n{}",
            original.trim(),
            HELP
        ))],
        CommandResult::SessionReset => vec![Reply::Text("🔄 Session cleared.".to_string())],
        CommandResult::ChapterReset(0) => vec![Reply::Text("🔄 All chapters start over.".to_string())],
        CommandResult::ChapterReset(chapter) => {
            vec![Reply::Text(format!("🔄 Chapter {} starts over.", chapter))]
        }
        CommandResult::Help => vec![Reply::Text(HELP.to_string())],
    }
}

fn render_verse(output: &VerseOutput, locator: &AudioLocator) -> Vec<Reply> {
    let mut replies = Vec::with_capacity(2);
    if let Some(text) = output.text() {
        replies.push(Reply::Text(format_verse(text)));
    }
    if let Some(audio) = output.audio() {
        replies.push(audio_reply(audio, locator));
    }
    replies
}

fn audio_reply(audio: &AudioRef, locator: &AudioLocator) -> Reply {
    match locator.url(audio) {
        Some(url) => Reply::Audio {
            url,
            caption: format!("{}.{}", audio.chapter, audio.verse),
        },
        None => Reply::Text(format!(
            "🔇 Audio for {}.{} is not available.",
            audio.chapter, audio.verse
        )),
    }
}

/// Verse header followed by each language's text
pub fn format_verse(text: &VerseText) -> String {
    let mut out = format!("{}.{}", text.chapter, text.verse);
    for (i, (language, body)) in text.texts.iter().enumerate() {
        out.push_str(if i == 0 { "\n" } else { "\n\n" });
        out.push_str(&format!("{}:\n{}", language, body));
    }
    out
}

pub fn format_search_page(page: &SearchPage) -> String {
    if page.total == 0 {
        return format!("🔍 No verses start with {}.", page.prefix);
    }
    if page.hits.is_empty() {
        return format!("🔍 No more results for {}.", page.prefix);
    }

    let mut out = format!("🔍 {} verses start with {}:\n", page.total, page.prefix);
    for (i, hit) in page.hits.iter().enumerate() {
        out.push_str(&format!("\n{}. {} {}", i + 1, hit.key, hit.preview));
    }
    if page.remaining > 0 {
        out.push_str(&format!(
            "\n\nSend more for the next {} or all for the remaining {}.",
            page.remaining.min(SEARCH_PAGE_SIZE),
            page.remaining
        ));
    }
    out.push_str("\nSend a number to open a verse.");
    out
}
