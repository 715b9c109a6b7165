//! Mutation application against the partition, and the change sets it
//! produces.
//!
//! Every operation here is synchronous and performs no I/O. Corrective
//! refetches are signaled through the page store, never executed; the facade
//! in `sync.rs` owns the suspending fetch path and event dispatch.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::entry::{Entry, EntryPatch};
use crate::partition::{Partition, Placement, Region};
use crate::sorting::{SortMode, compare_entries};
use crate::source::{FetchError, Page};
use crate::store::{Correction, CursorAnchor, FetchRequest, FetchTicket, PageStore};

// ============================================================================
// Public result types
// ============================================================================

/// Result of one mutation call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    /// Externally visible entry count after the mutation.
    pub visible_count: usize,
    /// The corrective fetch now pending, if any.
    pub correction_pending: Option<Correction>,
}

/// One visible change applied to the listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ListingChange {
    /// New entry materialized at `index`.
    Added { entry: Entry, index: usize },
    /// Attributes changed in place; no reposition.
    Modified { entry: Entry, index: usize },
    /// Sortable attributes changed and the entry moved to `index`.
    Moved { entry: Entry, index: usize },
    /// Entry deleted from the collection.
    Removed { id: String },
    /// Entry left the collection (moved elsewhere, not deleted).
    MovedOut { id: String },
    /// Entry snapped from the unordered tail into its confirmed position.
    Snapped { id: String, index: usize },
    /// The list was reset (sort-mode change, corrective full refetch, or
    /// order-invariant recovery).
    Reset,
}

/// Internal page-commit result; the facade maps it to `FetchOutcome` or a
/// `FetchError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CommitResult {
    Committed {
        appended: usize,
        snapped: usize,
        exhausted: bool,
    },
    Discarded,
    OrderViolation,
}

// ============================================================================
// Reconciler
// ============================================================================

/// Applies normalized mutations and fetched pages to the partitioned state.
pub(crate) struct Reconciler {
    sort: SortMode,
    page_size: usize,
    partition: Partition,
    store: PageStore,
}

impl Reconciler {
    pub fn new(sort: SortMode, page_size: usize) -> Self {
        Self {
            sort,
            page_size,
            partition: Partition::new(),
            store: PageStore::new(),
        }
    }

    pub fn sort(&self) -> SortMode {
        self.sort
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn exhausted(&self) -> bool {
        self.store.exhausted()
    }

    pub fn pending_correction(&self) -> Option<Correction> {
        self.store.pending_correction().cloned()
    }

    fn outcome(&self) -> MutationOutcome {
        MutationOutcome {
            visible_count: self.partition.len(),
            correction_pending: self.store.pending_correction().cloned(),
        }
    }

    /// Clears all state, keeping the sort mode. Any in-flight response is
    /// discarded on arrival via the store's epoch bump.
    pub fn reset(&mut self) -> Vec<ListingChange> {
        self.partition.clear();
        self.store.reset();
        vec![ListingChange::Reset]
    }

    /// Switches the sort mode. The ordering invariant is sort-mode-specific,
    /// so a change forces a full reset.
    pub fn set_sort(&mut self, mode: SortMode) -> Vec<ListingChange> {
        if mode == self.sort {
            return Vec::new();
        }
        self.sort = mode;
        self.reset()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Materializes a new entry. Inserting an id that is already present
    /// degrades to an update with the entry's attributes.
    pub fn insert(&mut self, entry: Entry) -> (MutationOutcome, Vec<ListingChange>) {
        if self.partition.find(&entry.id).is_some() {
            let id = entry.id.clone();
            let patch = EntryPatch {
                name: Some(entry.name),
                size: entry.size,
                modified_at: entry.modified_at,
                flagged: Some(entry.flagged),
            };
            return self.update(&id, patch);
        }

        let event_entry = entry.clone();
        let placement = self.partition.place(entry, self.sort, self.store.exhausted());
        let index = self.placement_index(placement);
        (self.outcome(), vec![ListingChange::Added { entry: event_entry, index }])
    }

    /// Applies attribute changes. Sortable-attribute changes reposition the
    /// entry (remove-then-reinsert under the placement rules); flag toggles
    /// and no-op patches never do.
    pub fn update(&mut self, id: &str, patch: EntryPatch) -> (MutationOutcome, Vec<ListingChange>) {
        let Some((region, index)) = self.partition.find(id) else {
            log::debug!("Ignoring update for unknown entry '{}'", id);
            return (self.outcome(), Vec::new());
        };
        let Some(current) = self.partition.get(region, index).cloned() else {
            return (self.outcome(), Vec::new());
        };

        if !patch.changes_sort_key(&current) {
            let mut updated = current.clone();
            patch.apply(&mut updated);
            if updated == current {
                return (self.outcome(), Vec::new());
            }
            if let Some(entry) = self.partition.get_mut(region, index) {
                *entry = updated.clone();
            }
            let global = self.partition.global_index(region, index);
            return (
                self.outcome(),
                vec![ListingChange::Modified { entry: updated, index: global }],
            );
        }

        let was_anchor = self.store.cursor().is_some_and(|anchor| anchor.id == id);
        let mut updated = current.clone();
        patch.apply(&mut updated);
        let moved_earlier = compare_entries(&updated, &current, self.sort) == Ordering::Less;

        self.partition.remove(id);
        let placement = self.partition.place(updated.clone(), self.sort, self.store.exhausted());
        let index = self.placement_index(placement);

        // The continuation token was derived against the boundary's old sort
        // key; once the boundary moves earlier, advancing with it may skip or
        // repeat entries.
        if was_anchor && moved_earlier && !self.store.exhausted() {
            let correction = self.store.correction_for_current_page();
            self.store.flag_correction(correction);
        }

        (self.outcome(), vec![ListingChange::Moved { entry: updated, index }])
    }

    /// Deletes an entry.
    pub fn remove(&mut self, id: &str) -> (MutationOutcome, Vec<ListingChange>) {
        let mut changes = Vec::new();
        self.remove_impl(id, false, &mut changes);
        (self.outcome(), changes)
    }

    /// Removes an entry that left this collection (moved elsewhere).
    pub fn move_out(&mut self, id: &str) -> (MutationOutcome, Vec<ListingChange>) {
        let mut changes = Vec::new();
        self.remove_impl(id, true, &mut changes);
        (self.outcome(), changes)
    }

    /// Deletes a batch of entries in one step. A batch that wipes every
    /// materialized entry of a fetched page while more pages remain leaves a
    /// full refetch pending instead of attempting incremental repair.
    pub fn remove_many(&mut self, ids: &[String]) -> (MutationOutcome, Vec<ListingChange>) {
        let mut changes = Vec::new();
        let mut emptied = false;
        for id in ids {
            emptied |= self.remove_impl(id, false, &mut changes);
        }
        if emptied && !self.store.exhausted() {
            log::info!("Batch removal emptied a fetched page; full refetch pending");
            self.store.flag_correction(Correction::FullRefetch);
        }
        (self.outcome(), changes)
    }

    /// Shared removal path. Returns whether this removal emptied a page.
    fn remove_impl(&mut self, id: &str, moved_out: bool, changes: &mut Vec<ListingChange>) -> bool {
        if self.partition.remove(id).is_none() {
            log::debug!("Ignoring removal of unknown entry '{}'", id);
            return false;
        }

        let was_anchor = self.store.cursor().is_some_and(|anchor| anchor.id == id);
        let emptied_page = self.store.note_removed(id);

        if !self.store.exhausted() {
            // Continuing from a token derived against a now-deleted boundary
            // is undefined on the server.
            if was_anchor {
                let correction = self.store.correction_for_current_page();
                self.store.flag_correction(correction);
            }
            // The boundary a pending rewind targets is itself gone; nothing
            // is left to rewind to.
            let rewind_target_gone = matches!(
                self.store.pending_correction(),
                Some(Correction::RefetchCurrentPage { boundary_id: Some(boundary) }) if boundary == id
            );
            if rewind_target_gone {
                self.store.flag_correction(Correction::FullRefetch);
            }
        }

        changes.push(if moved_out {
            ListingChange::MovedOut { id: id.to_string() }
        } else {
            ListingChange::Removed { id: id.to_string() }
        });
        emptied_page
    }

    fn placement_index(&self, placement: Placement) -> usize {
        match placement {
            Placement::Prefix(index) => index,
            Placement::Tail(index) => self.partition.global_index(Region::Tail, index),
        }
    }

    // ========================================================================
    // Fetch plumbing
    // ========================================================================

    /// Starts a page fetch: resolves a pending full refetch by resetting,
    /// consumes a pending current-page correction, and reserves the single
    /// in-flight slot.
    pub fn begin_fetch(&mut self) -> Result<(FetchRequest, FetchTicket, Vec<ListingChange>), FetchError> {
        if self.store.in_flight() {
            return Err(FetchError::AlreadyInFlight);
        }

        let mut changes = Vec::new();
        if matches!(self.store.pending_correction(), Some(Correction::FullRefetch)) {
            log::info!("Executing pending full refetch");
            changes.extend(self.reset());
        }

        // Stale-anchor backstop: the cursor snapshot was taken when its page
        // committed; a generation mismatch means the boundary's sort key has
        // changed since the continuation token was issued.
        if let Some(anchor) = self.store.cursor()
            && let Some((region, index)) = self.partition.find(&anchor.id)
            && let Some(live) = self.partition.get(region, index)
            && live.generation != anchor.generation
        {
            let correction = self.store.correction_for_current_page();
            self.store.flag_correction(correction);
        }

        let (request, ticket) = self.store.begin_fetch(self.sort, self.page_size)?;
        Ok((request, ticket, changes))
    }

    /// Releases the in-flight slot after a failed fetch; state untouched.
    pub fn abort_fetch(&mut self, ticket: &FetchTicket) {
        self.store.abort_fetch(ticket);
    }

    /// Applies a fetched page against whatever local state exists now.
    ///
    /// Fetched entries are merged by id: unknown ids append in server order,
    /// tail entries with an unchanged sort key are confirmed into the prefix,
    /// and entries whose local key has diverged keep their local position
    /// (the local mutation is newer than the snapshot the server serialized).
    /// Afterwards the whole tail is re-evaluated for snap-in.
    pub fn commit_page(&mut self, ticket: FetchTicket, page: Page) -> (CommitResult, Vec<ListingChange>) {
        if !self.store.finish_fetch(&ticket) {
            return (CommitResult::Discarded, Vec::new());
        }

        let mut changes = Vec::new();

        // Sanity check: the page's first entry must not sort before the last
        // trusted entry it extends. A violation means the remote's order
        // changed between pages; the only safe recovery is a fresh start.
        let trusted = if ticket.corrective {
            ticket
                .prev_boundary_id
                .as_deref()
                .and_then(|id| self.partition.prefix_index_of(id))
                .and_then(|index| self.partition.get(Region::Prefix, index))
                .cloned()
        } else {
            self.partition.last_prefix().cloned()
        };
        if let (Some(first), Some(trusted)) = (page.entries.first(), trusted.as_ref())
            && compare_entries(first, trusted, self.sort) == Ordering::Less
        {
            log::warn!("Fetched page contradicts trusted ordering; resetting list");
            changes.extend(self.reset());
            return (CommitResult::OrderViolation, changes);
        }

        // A corrective refetch replaces the current page: displace everything
        // after the rewind boundary and re-merge it below.
        let mut displaced: Vec<Entry> = Vec::new();
        if ticket.corrective {
            let cut = ticket
                .prev_boundary_id
                .as_deref()
                .and_then(|id| self.partition.prefix_index_of(id))
                .map(|index| index + 1)
                .unwrap_or(0);
            displaced = self.partition.split_off_prefix(cut);
        }

        let exhausted_after = page.next_token.is_none();
        let server_last = page.entries.last().cloned();
        let mut appended = 0usize;
        let mut live_ids = Vec::new();
        let mut last_pushed: Option<CursorAnchor> = None;

        for fetched in &page.entries {
            if let Some(pos) = displaced.iter().position(|local| local.id == fetched.id) {
                if compare_entries(&displaced[pos], fetched, self.sort) == Ordering::Equal {
                    let local = displaced.remove(pos);
                    last_pushed = Some(CursorAnchor {
                        id: local.id.clone(),
                        generation: local.generation,
                    });
                    live_ids.push(local.id.clone());
                    self.partition.push_fetched(local);
                }
                // Diverged key: the local copy is re-placed after the merge.
                continue;
            }

            match self.partition.find(&fetched.id) {
                None => {
                    let index = self.partition.push_fetched(fetched.clone());
                    last_pushed = Some(CursorAnchor {
                        id: fetched.id.clone(),
                        generation: fetched.generation,
                    });
                    live_ids.push(fetched.id.clone());
                    appended += 1;
                    changes.push(ListingChange::Added {
                        entry: fetched.clone(),
                        index,
                    });
                }
                Some((Region::Tail, index)) => {
                    let Some(local) = self.partition.get(Region::Tail, index).cloned() else {
                        continue;
                    };
                    if compare_entries(&local, fetched, self.sort) == Ordering::Equal {
                        let entry = self.partition.remove_tail_at(index);
                        let prefix_index = self.partition.push_fetched(entry);
                        last_pushed = Some(CursorAnchor {
                            id: local.id.clone(),
                            generation: local.generation,
                        });
                        live_ids.push(local.id.clone());
                        changes.push(ListingChange::Snapped {
                            id: local.id,
                            index: prefix_index,
                        });
                    }
                    // Diverged key: the local reposition already reflects the
                    // newest attributes; skip the server copy.
                }
                Some((Region::Prefix, _)) => {
                    // Already materialized in trusted order; skip the overlap.
                }
            }
        }

        self.store.record_page(&ticket, last_pushed.clone(), live_ids, page.next_token.clone());

        // Displaced entries the server no longer returned in this range keep
        // their local attributes and go through standard placement.
        for local in displaced {
            let placement = self.partition.place(local.clone(), self.sort, exhausted_after);
            let index = self.placement_index(placement);
            changes.push(ListingChange::Moved { entry: local, index });
        }

        // The new continuation token is derived against the server's key for
        // the page's last entry; if a local rename already moved that entry
        // earlier, the token cannot be trusted to advance.
        if let Some(server_last) = server_last.as_ref()
            && !exhausted_after
        {
            let anchored = last_pushed.as_ref().is_some_and(|anchor| anchor.id == server_last.id);
            if !anchored
                && let Some((region, index)) = self.partition.find(&server_last.id)
                && let Some(local) = self.partition.get(region, index)
                && compare_entries(local, server_last, self.sort) == Ordering::Less
            {
                let correction = self.store.correction_for_current_page();
                self.store.flag_correction(correction);
            }
        }

        let snapped_entries = self.partition.snap_in(self.sort, exhausted_after);
        let snapped = snapped_entries.len();
        for (id, index) in snapped_entries {
            changes.push(ListingChange::Snapped { id, index });
        }

        log::debug!(
            "Committed page: {} appended, {} snapped, {} trusted / {} total",
            appended,
            snapped,
            self.partition.prefix_len(),
            self.partition.len(),
        );

        (
            CommitResult::Committed {
                appended,
                snapped,
                exhausted: exhausted_after,
            },
            changes,
        )
    }
}
