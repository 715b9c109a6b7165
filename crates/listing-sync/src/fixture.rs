//! Deterministic in-memory page source for tests.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::entry::Entry;
use crate::sorting::{SortMode, sort_entries};
use crate::source::{FetchError, Page, PageSource};

/// In-memory `PageSource` over a mutable dataset.
///
/// Continuation tokens are the id of a page's last entry; a token whose entry
/// no longer exists in the dataset is rejected as stale, mirroring a real
/// backend's treatment of cursors anchored to deleted rows. Every fetch is
/// logged so tests can assert which boundaries were requested.
pub struct FixtureSource {
    data: Mutex<Vec<Entry>>,
    tokens_seen: Mutex<Vec<Option<String>>>,
    fail_next: Mutex<Option<FetchError>>,
}

impl FixtureSource {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            data: Mutex::new(entries),
            tokens_seen: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
        }
    }

    /// Adds or replaces an entry in the remote dataset.
    pub fn insert_remote(&self, entry: Entry) {
        let mut data = self.lock_data();
        if let Some(existing) = data.iter_mut().find(|existing| existing.id == entry.id) {
            *existing = entry;
        } else {
            data.push(entry);
        }
    }

    /// Deletes an entry from the remote dataset.
    pub fn remove_remote(&self, id: &str) {
        self.lock_data().retain(|entry| entry.id != id);
    }

    /// Renames an entry in the remote dataset.
    pub fn rename_remote(&self, id: &str, name: &str) {
        if let Some(entry) = self.lock_data().iter_mut().find(|entry| entry.id == id) {
            entry.name = name.to_string();
        }
    }

    /// Makes the next fetch fail with the given error.
    pub fn fail_next_with(&self, error: FetchError) {
        *self.fail_next.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Number of fetches issued so far (including failed ones).
    pub fn fetch_count(&self) -> usize {
        self.lock_tokens().len()
    }

    /// The continuation tokens of every fetch issued so far, in order.
    pub fn tokens_seen(&self) -> Vec<Option<String>> {
        self.lock_tokens().clone()
    }

    fn lock_data(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tokens(&self) -> std::sync::MutexGuard<'_, Vec<Option<String>>> {
        self.tokens_seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PageSource for FixtureSource {
    async fn fetch_page(&self, sort: SortMode, token: Option<&str>, page_size: usize) -> Result<Page, FetchError> {
        self.lock_tokens().push(token.map(String::from));

        if let Some(error) = self.fail_next.lock().unwrap_or_else(PoisonError::into_inner).take() {
            return Err(error);
        }

        let mut sorted = self.lock_data().clone();
        sort_entries(&mut sorted, sort);

        let start = match token {
            None => 0,
            Some(token) => match sorted.iter().position(|entry| entry.id == token) {
                Some(position) => position + 1,
                None => return Err(FetchError::StaleCursor(format!("unknown boundary '{}'", token))),
            },
        };

        let end = (start + page_size).min(sorted.len());
        let entries: Vec<Entry> = sorted[start..end].to_vec();
        let next_token = if end < sorted.len() {
            entries.last().map(|entry| entry.id.clone())
        } else {
            None
        };

        Ok(Page { entries, next_token })
    }
}
