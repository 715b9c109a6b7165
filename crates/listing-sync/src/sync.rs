//! Per-list synchronizer facade: fetch orchestration, the materialized view,
//! and change-event dispatch.
//!
//! Each `ListingSync` is owned by the caller that mounted the list and is
//! passed by reference; there is no process-wide registry. The state sits
//! behind a mutex with short critical sections, so the suspended fetch holds
//! no lock and local mutations keep flowing while a page is in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entry::{Entry, EntryPatch};
use crate::reconciler::{CommitResult, ListingChange, MutationOutcome, Reconciler};
use crate::sorting::SortMode;
use crate::source::{FetchError, PageSource};
use crate::store::Correction;

/// Default number of entries requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Construction-time configuration for a list instance.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub sort: SortMode,
    pub page_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sort: SortMode::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Change notification delivered to the registered listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEvent {
    pub listing_id: String,
    /// Monotonic per list instance.
    pub sequence: u64,
    pub changes: Vec<ListingChange>,
}

/// Callback receiving listing events after each settled change set.
pub type Listener = Box<dyn Fn(&ListingEvent) + Send + Sync>;

/// Read-only snapshot of the externally visible sequence: the ordered prefix
/// followed by the unordered tail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedListing {
    pub listing_id: String,
    pub entries: Vec<Entry>,
    pub has_more: bool,
}

/// Aggregate statistics over the materialized entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListingStats {
    pub total_files: usize,
    pub total_folders: usize,
    pub total_file_size: u64,
}

/// Result of a successful `fetch_next_page` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum FetchOutcome {
    /// The page was committed.
    Committed {
        appended: usize,
        snapped: usize,
        exhausted: bool,
    },
    /// The response arrived for a list that was reset while the fetch was
    /// suspended; nothing was applied.
    Discarded,
}

/// One synchronized, cursor-paginated listing.
pub struct ListingSync {
    listing_id: String,
    source: Arc<dyn PageSource>,
    state: Mutex<Reconciler>,
    listener: Mutex<Option<Listener>>,
    sequence: AtomicU64,
    /// Cached materialized snapshot, keyed by (partition version, exhausted).
    snapshot: Mutex<Option<(u64, bool, Arc<MaterializedListing>)>>,
}

impl ListingSync {
    /// Creates a list instance backed by the given page source.
    pub fn new(source: Arc<dyn PageSource>, config: SyncConfig) -> Self {
        let listing_id = Uuid::new_v4().to_string();
        log::info!("Listing {} mounted (page size {})", listing_id, config.page_size);
        Self {
            listing_id,
            source,
            state: Mutex::new(Reconciler::new(config.sort, config.page_size)),
            listener: Mutex::new(None),
            sequence: AtomicU64::new(0),
            snapshot: Mutex::new(None),
        }
    }

    pub fn listing_id(&self) -> &str {
        &self.listing_id
    }

    /// Registers the change listener, replacing any previous one.
    pub fn set_listener(&self, listener: Listener) {
        *self.lock_listener() = Some(listener);
    }

    pub fn clear_listener(&self) {
        *self.lock_listener() = None;
    }

    // ========================================================================
    // Read API
    // ========================================================================

    /// The externally visible sequence plus the can-load-more flag.
    ///
    /// The snapshot is rebuilt at most once per state version and shared
    /// behind an `Arc`; repeated calls are O(1).
    pub fn materialize(&self) -> Arc<MaterializedListing> {
        let state = self.lock_state();
        let version = state.partition().version();
        let has_more = !state.exhausted();

        let mut cache = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached_version, cached_has_more, cached)) = cache.as_ref()
            && *cached_version == version
            && *cached_has_more == has_more
        {
            return Arc::clone(cached);
        }

        let listing = Arc::new(MaterializedListing {
            listing_id: self.listing_id.clone(),
            entries: state.partition().iter().cloned().collect(),
            has_more,
        });
        *cache = Some((version, has_more, Arc::clone(&listing)));
        listing
    }

    /// Index of an entry in the materialized order.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        let state = self.lock_state();
        state
            .partition()
            .find(id)
            .map(|(region, index)| state.partition().global_index(region, index))
    }

    /// File/folder counts and total file size over materialized entries.
    pub fn stats(&self) -> ListingStats {
        let state = self.lock_state();
        let mut stats = ListingStats {
            total_files: 0,
            total_folders: 0,
            total_file_size: 0,
        };
        for entry in state.partition().iter() {
            if entry.is_folder() {
                stats.total_folders += 1;
            } else {
                stats.total_files += 1;
                if let Some(size) = entry.size {
                    stats.total_file_size += size;
                }
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.lock_state().partition().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_more(&self) -> bool {
        !self.lock_state().exhausted()
    }

    pub fn sort_mode(&self) -> SortMode {
        self.lock_state().sort()
    }

    /// The corrective fetch the next `fetch_next_page` call will perform, if
    /// any. Consumed by whatever orchestrates fetching.
    pub fn pending_correction(&self) -> Option<Correction> {
        self.lock_state().pending_correction()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Materializes a new entry (a create or an inbound move).
    pub fn insert(&self, entry: Entry) -> MutationOutcome {
        let (outcome, changes) = self.lock_state().insert(entry);
        self.emit(changes);
        outcome
    }

    /// Applies attribute changes (rename, size/timestamp change, flag toggle).
    pub fn update(&self, id: &str, patch: EntryPatch) -> MutationOutcome {
        let (outcome, changes) = self.lock_state().update(id, patch);
        self.emit(changes);
        outcome
    }

    /// Deletes an entry.
    pub fn remove(&self, id: &str) -> MutationOutcome {
        let (outcome, changes) = self.lock_state().remove(id);
        self.emit(changes);
        outcome
    }

    /// Removes an entry that left this collection (moved elsewhere).
    pub fn move_out(&self, id: &str) -> MutationOutcome {
        let (outcome, changes) = self.lock_state().move_out(id);
        self.emit(changes);
        outcome
    }

    /// Deletes a batch of entries in one step.
    pub fn remove_many(&self, ids: &[String]) -> MutationOutcome {
        let (outcome, changes) = self.lock_state().remove_many(ids);
        self.emit(changes);
        outcome
    }

    /// Switches the sort mode. The ordering invariant is sort-mode-specific,
    /// so changing it resets the list; any in-flight fetch is discarded on
    /// arrival.
    pub fn set_sort_mode(&self, mode: SortMode) {
        let changes = self.lock_state().set_sort(mode);
        self.emit(changes);
    }

    /// Clears all state and starts over, keeping the sort mode.
    pub fn reset(&self) {
        let changes = self.lock_state().reset();
        self.emit(changes);
    }

    // ========================================================================
    // Fetching
    // ========================================================================

    /// Fetches and applies the next page (or a pending corrective refetch).
    ///
    /// Only one fetch may be in flight per list; a second call while one is
    /// pending returns `FetchError::AlreadyInFlight` rather than queueing.
    /// Local mutations are accepted while the fetch is suspended; the commit
    /// runs against whatever state exists when the response arrives, and a
    /// response addressed to a since-reset list is discarded.
    pub async fn fetch_next_page(&self) -> Result<FetchOutcome, FetchError> {
        let (request, ticket, changes) = self.lock_state().begin_fetch()?;
        self.emit(changes);

        let result = self
            .source
            .fetch_page(request.sort, request.token.as_deref(), request.page_size)
            .await;

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                self.lock_state().abort_fetch(&ticket);
                log::warn!("Listing {}: page fetch failed: {}", self.listing_id, err);
                return Err(err);
            }
        };

        let (commit, changes) = self.lock_state().commit_page(ticket, page);
        self.emit(changes);

        match commit {
            CommitResult::Committed {
                appended,
                snapped,
                exhausted,
            } => Ok(FetchOutcome::Committed {
                appended,
                snapped,
                exhausted,
            }),
            CommitResult::Discarded => Ok(FetchOutcome::Discarded),
            CommitResult::OrderViolation => Err(FetchError::OrderInvariantViolated),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Reconciler> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listener(&self) -> std::sync::MutexGuard<'_, Option<Listener>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dispatches a settled change set to the listener. Never called while
    /// the state lock is held.
    fn emit(&self, changes: Vec<ListingChange>) {
        if changes.is_empty() {
            return;
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let event = ListingEvent {
            listing_id: self.listing_id.clone(),
            sequence,
            changes,
        };
        let listener = self.lock_listener();
        if let Some(listener) = listener.as_ref() {
            listener(&event);
        }
    }
}
