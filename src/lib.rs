//! Gita Bot
//!
//! Verse-navigation engine for the Bhagavad Gita, served over Telegram or
//! an interactive console.
//!
//! # Features
//!
//! - **Random draws**: per-chapter or whole-book, never repeating a verse
//!   until the user resets
//! - **Navigation**: specific verses, next-N with chapter wrap, surrounding
//!   context
//! - **Syllable search**: Latin syllables transliterated to Devanagari and
//!   matched against verse openings, paginated ten at a time
//! - **Audio**: full recitations and quarter clips located by base URL or a
//!   JSON index
//! - **Multi-language**: Telugu, Hindi and English texts kept aligned
//!
//! # Architecture
//!
//! ```text
//! Telegram / Console ──► App ──► NavigationEngine ──► CommandResult ──► render
//!                                   │
//!                                   ├── CommandParser (text → command)
//!                                   ├── SessionStore (cursor, used, search)
//!                                   ├── VerseIndex (positions + wrap)
//!                                   └── Library (aligned corpora)
//! ```

pub mod app;
pub mod audio;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod index;
pub mod parser;
pub mod render;
pub mod session;
pub mod source;
pub mod telegram;

pub use app::App;
pub use audio::{AudioLocator, AudioRef};
pub use config::Config;
pub use corpus::{Detail, Language, LanguageSource, Library, VerseCorpus, VerseKey};
pub use engine::{CommandResult, NavigationEngine, VerseOutput};
pub use index::{Position, VerseIndex};
pub use parser::{CommandParser, ParseContext, ParsedCommand};
pub use render::Reply;
pub use session::{SessionState, SessionStore, UserId};
