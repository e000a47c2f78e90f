//! Session Store
//!
//! Per-user navigation state: the cursor, per-chapter used sets for
//! no-repeat random draws, and any pending search being paged through.
//!
//! Each user's state sits behind its own mutex so one command runs to
//! completion before the next one for that user touches the state, while
//! different users proceed in parallel.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::corpus::VerseKey;
use crate::index::Position;

/// Telegram user id (or any caller-chosen key)
pub type UserId = i64;

/// Search results being browsed page by page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSearch {
    /// Target-script prefix that produced the results
    pub prefix: String,
    pub results: Vec<VerseKey>,
    /// Start of the page most recently shown
    pub page_start: usize,
    /// Length of the page most recently shown
    pub page_len: usize,
}

impl PendingSearch {
    pub fn new(prefix: impl Into<String>, results: Vec<VerseKey>) -> Self {
        Self {
            prefix: prefix.into(),
            results,
            page_start: 0,
            page_len: 0,
        }
    }

    /// Entries on the page most recently shown
    pub fn current_page(&self) -> &[VerseKey] {
        &self.results[self.page_start..self.page_start + self.page_len]
    }

    /// Entries not yet shown
    pub fn remaining(&self) -> usize {
        self.results.len() - (self.page_start + self.page_len)
    }

    /// Show the next `size` entries (`None` = all that remain). Returns
    /// false and leaves the current page untouched when nothing remains.
    pub fn advance(&mut self, size: Option<usize>) -> bool {
        let remaining = self.remaining();
        if remaining == 0 {
            return false;
        }
        self.page_start += self.page_len;
        self.page_len = size.map_or(remaining, |s| s.min(remaining));
        true
    }
}

/// Navigation state of one user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub cursor: Option<Position>,
    pub used: HashMap<u8, HashSet<usize>>,
    pub pending_search: Option<PendingSearch>,
}

impl SessionState {
    pub fn mark_used(&mut self, chapter: u8, index: usize) {
        self.used.entry(chapter).or_default().insert(index);
    }

    pub fn is_used(&self, chapter: u8, index: usize) -> bool {
        self.used.get(&chapter).is_some_and(|s| s.contains(&index))
    }

    /// Clear one chapter's used set
    pub fn reset_chapter(&mut self, chapter: u8) {
        self.used.remove(&chapter);
    }

    /// Indices of a `chapter_len`-verse chapter not drawn yet, ascending
    pub fn available_indices(&self, chapter: u8, chapter_len: usize) -> Vec<usize> {
        (0..chapter_len).filter(|i| !self.is_used(chapter, *i)).collect()
    }
}

/// Concurrent per-user session map
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<UserId, Arc<Mutex<SessionState>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session slot for a user, created on first use
    fn slot(&self, user_id: UserId) -> Arc<Mutex<SessionState>> {
        if let Some(slot) = self.sessions.read().get(&user_id) {
            return Arc::clone(slot);
        }
        let mut sessions = self.sessions.write();
        let slot = sessions.entry(user_id).or_insert_with(|| {
            debug!("Session created for user {}", user_id);
            Arc::new(Mutex::new(SessionState::default()))
        });
        Arc::clone(slot)
    }

    /// Run `f` with exclusive access to the user's state
    pub fn with_session<R>(&self, user_id: UserId, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let slot = self.slot(user_id);
        let mut state = slot.lock();
        f(&mut state)
    }

    /// Snapshot of a user's state (created with defaults if absent)
    pub fn get(&self, user_id: UserId) -> SessionState {
        self.with_session(user_id, |state| state.clone())
    }

    pub fn mark_used(&self, user_id: UserId, chapter: u8, index: usize) {
        self.with_session(user_id, |state| state.mark_used(chapter, index));
    }

    pub fn reset_chapter(&self, user_id: UserId, chapter: u8) {
        self.with_session(user_id, |state| state.reset_chapter(chapter));
    }

    /// Clear a user's session in place under its lock, so a command
    /// already holding the slot keeps writing to the live state. Returns
    /// whether the user had a session.
    pub fn reset(&self, user_id: UserId) -> bool {
        let Some(slot) = self.sessions.read().get(&user_id).map(Arc::clone) else {
            return false;
        };
        *slot.lock() = SessionState::default();
        debug!("Session reset for user {}", user_id);
        true
    }

    pub fn available_indices(&self, user_id: UserId, chapter: u8, chapter_len: usize) -> Vec<usize> {
        self.with_session(user_id, |state| state.available_indices(chapter, chapter_len))
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
