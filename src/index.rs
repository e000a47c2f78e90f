//! Verse Index
//!
//! Addressable view over the primary corpus: (chapter, verse) ↔ position
//! lookups and the chapter-wrapping offset walk that every relative
//! navigation command goes through.

use std::collections::{BTreeMap, HashMap};

use crate::corpus::{VerseCorpus, VerseKey, FINAL_CHAPTER};

/// Position of a verse inside its chapter (0-based index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub chapter: u8,
    pub index: usize,
}

impl Position {
    pub fn new(chapter: u8, index: usize) -> Self {
        Self { chapter, index }
    }
}

/// O(1) chapter/verse addressing over one corpus
#[derive(Debug, Clone, Default)]
pub struct VerseIndex {
    /// chapter -> verse numbers in corpus order
    chapters: BTreeMap<u8, Vec<u32>>,
    positions: HashMap<VerseKey, Position>,
}

impl VerseIndex {
    pub fn build(corpus: &VerseCorpus) -> Self {
        let mut chapters = BTreeMap::new();
        let mut positions = HashMap::new();

        for chapter in corpus.chapters() {
            let verses: Vec<u32> = corpus
                .chapter(chapter)
                .unwrap_or_default()
                .iter()
                .map(|v| v.verse)
                .collect();
            for (index, verse) in verses.iter().enumerate() {
                positions.insert(VerseKey::new(chapter, *verse), Position::new(chapter, index));
            }
            chapters.insert(chapter, verses);
        }

        Self { chapters, positions }
    }

    /// Position of a verse number within its chapter
    pub fn position_of(&self, chapter: u8, verse: u32) -> Option<Position> {
        self.positions.get(&VerseKey::new(chapter, verse)).copied()
    }

    /// Verse key at a position
    pub fn verse_at(&self, chapter: u8, index: usize) -> Option<VerseKey> {
        let verse = self.chapters.get(&chapter)?.get(index)?;
        Some(VerseKey::new(chapter, *verse))
    }

    pub fn key_at(&self, pos: Position) -> Option<VerseKey> {
        self.verse_at(pos.chapter, pos.index)
    }

    /// Number of verses in a chapter (None if the chapter is absent)
    pub fn chapter_len(&self, chapter: u8) -> Option<usize> {
        self.chapters.get(&chapter).map(Vec::len)
    }

    pub fn chapters(&self) -> impl Iterator<Item = u8> + '_ {
        self.chapters.keys().copied()
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn contains_chapter(&self, chapter: u8) -> bool {
        self.chapters.contains_key(&chapter)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Walk `delta` verses from `(chapter, index)`, crossing chapter
    /// boundaries. Chapter 18 continues into chapter 1 and chapter 1 backs
    /// into chapter 18. Returns None when the start is invalid, the walk
    /// needs a chapter the corpus lacks, or it comes back around to the
    /// starting chapter without landing.
    pub fn offset(&self, chapter: u8, index: usize, delta: i64) -> Option<Position> {
        let start_len = self.chapter_len(chapter)?;
        if index >= start_len {
            return None;
        }

        let start = chapter;
        let mut chapter = chapter;
        let mut len = start_len as i64;
        let mut cursor = index as i64 + delta;
        let mut moved = false;

        loop {
            if (0..len).contains(&cursor) {
                return Some(Position::new(chapter, cursor as usize));
            }
            if moved && chapter == start {
                return None;
            }

            if cursor < 0 {
                chapter = previous_chapter(chapter);
                len = self.chapter_len(chapter)? as i64;
                cursor += len;
            } else {
                cursor -= len;
                chapter = next_chapter(chapter);
                len = self.chapter_len(chapter)? as i64;
            }
            moved = true;
        }
    }

    /// Convenience form of [`offset`](Self::offset) over a [`Position`]
    pub fn offset_from(&self, pos: Position, delta: i64) -> Option<Position> {
        self.offset(pos.chapter, pos.index, delta)
    }

    /// Every position in corpus order
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.chapters
            .iter()
            .flat_map(|(chapter, verses)| (0..verses.len()).map(move |i| Position::new(*chapter, i)))
    }
}

fn next_chapter(chapter: u8) -> u8 {
    if chapter >= FINAL_CHAPTER {
        1
    } else {
        chapter + 1
    }
}

fn previous_chapter(chapter: u8) -> u8 {
    if chapter <= 1 {
        FINAL_CHAPTER
    } else {
        chapter - 1
    }
}
