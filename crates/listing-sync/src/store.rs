//! Cursor pagination bookkeeping: fetched pages, continuation tokens, and the
//! corrective-refetch signal.
//!
//! The store never touches entries itself; it tracks which pages were fetched
//! with which tokens so that a corrective refetch can rewind to the last
//! boundary a real server token exists for.

use serde::{Deserialize, Serialize};

use crate::sorting::SortMode;
use crate::source::FetchError;

/// Pending corrective action, consumed by the next `fetch_next_page` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Correction {
    /// Re-issue the current page fetch from the previous trusted boundary
    /// instead of advancing. `boundary_id` names the last unchanged ordered
    /// entry; `None` means the rewind goes to the start of the list.
    #[serde(rename_all = "camelCase")]
    RefetchCurrentPage { boundary_id: Option<String> },
    /// Reset and reload from the first page.
    FullRefetch,
}

/// The (id, generation) snapshot of a page's last fetched entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CursorAnchor {
    pub id: String,
    pub generation: u64,
}

/// Bookkeeping for one fetched page.
#[derive(Debug, Clone)]
struct PageRecord {
    /// Token this page was fetched with (`None` for the first page).
    begin_token: Option<String>,
    /// Last fetched entry of the page at fetch time.
    boundary: Option<CursorAnchor>,
    /// Ids fetched in this page that are still materialized.
    live_ids: Vec<String>,
}

/// Request parameters for one page fetch.
#[derive(Debug, Clone)]
pub(crate) struct FetchRequest {
    pub sort: SortMode,
    pub token: Option<String>,
    pub page_size: usize,
}

/// Pairs an issued fetch with the state it was issued against. A ticket whose
/// epoch is stale by commit time belongs to a list that was reset while the
/// fetch was in flight; its page is discarded, never applied.
#[derive(Debug, Clone)]
pub(crate) struct FetchTicket {
    pub epoch: u64,
    pub corrective: bool,
    pub token: Option<String>,
    /// Boundary of the page before the one being (re)fetched; the commit cut
    /// point for corrective refetches.
    pub prev_boundary_id: Option<String>,
}

/// Owns the fetched-page sequence metadata, the live continuation token, the
/// exhausted flag, and the single-fetch-in-flight guard.
#[derive(Debug, Default)]
pub(crate) struct PageStore {
    pages: Vec<PageRecord>,
    next_token: Option<String>,
    exhausted: bool,
    in_flight: bool,
    epoch: u64,
    pending_correction: Option<Correction>,
}

impl PageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// The current cursor: the boundary of the most recent page that fetched
    /// any entries.
    pub fn cursor(&self) -> Option<&CursorAnchor> {
        self.pages.iter().rev().find_map(|page| page.boundary.as_ref())
    }

    /// Boundary of the page before the current one; the anchor a corrective
    /// current-page refetch rewinds to.
    pub fn prev_boundary_id(&self) -> Option<String> {
        let len = self.pages.len();
        if len < 2 {
            return None;
        }
        self.pages[..len - 1]
            .iter()
            .rev()
            .find_map(|page| page.boundary.as_ref().map(|anchor| anchor.id.clone()))
    }

    pub fn pending_correction(&self) -> Option<&Correction> {
        self.pending_correction.as_ref()
    }

    /// The corrective signal for re-fetching the current page.
    pub fn correction_for_current_page(&self) -> Correction {
        Correction::RefetchCurrentPage {
            boundary_id: self.prev_boundary_id(),
        }
    }

    /// Records a pending correction. `FullRefetch` always wins; a second
    /// `RefetchCurrentPage` never replaces an existing signal.
    pub fn flag_correction(&mut self, correction: Correction) {
        match (&self.pending_correction, &correction) {
            (Some(Correction::FullRefetch), _) => {}
            (Some(_), Correction::RefetchCurrentPage { .. }) => {}
            _ => {
                log::info!("Cursor correction pending: {:?}", correction);
                self.pending_correction = Some(correction);
            }
        }
    }

    /// Starts a fetch: yields the request parameters and a ticket for the
    /// eventual commit. A pending `RefetchCurrentPage` is consumed here and
    /// rewrites the request to the current page's begin token.
    ///
    /// The caller must resolve a pending `FullRefetch` (by resetting) before
    /// delegating here.
    pub fn begin_fetch(&mut self, sort: SortMode, page_size: usize) -> Result<(FetchRequest, FetchTicket), FetchError> {
        if self.in_flight {
            return Err(FetchError::AlreadyInFlight);
        }

        let (token, corrective, prev_boundary_id) = match self.pending_correction.clone() {
            Some(Correction::RefetchCurrentPage { boundary_id }) if !self.pages.is_empty() => {
                self.pending_correction = None;
                let begin_token = self.pages.last().and_then(|page| page.begin_token.clone());
                log::info!("Re-issuing current page fetch from boundary {:?}", boundary_id);
                (begin_token, true, boundary_id)
            }
            _ => {
                // A correction recorded before any page exists has nothing to
                // rewind; a fresh first fetch covers it.
                self.pending_correction = None;
                if self.exhausted {
                    return Err(FetchError::Exhausted);
                }
                (self.next_token.clone(), false, None)
            }
        };

        self.in_flight = true;
        let request = FetchRequest {
            sort,
            token: token.clone(),
            page_size,
        };
        let ticket = FetchTicket {
            epoch: self.epoch,
            corrective,
            token,
            prev_boundary_id,
        };
        Ok((request, ticket))
    }

    /// Clears the in-flight guard. Returns false when the ticket's epoch is
    /// stale (the list was reset while the fetch was suspended) and the
    /// response must be discarded.
    pub fn finish_fetch(&mut self, ticket: &FetchTicket) -> bool {
        if ticket.epoch != self.epoch {
            log::info!("Discarding page response for a reset list (epoch {} != {})", ticket.epoch, self.epoch);
            return false;
        }
        self.in_flight = false;
        true
    }

    /// Releases the in-flight guard after a failed fetch; state untouched.
    pub fn abort_fetch(&mut self, ticket: &FetchTicket) {
        if ticket.epoch == self.epoch {
            self.in_flight = false;
        }
    }

    /// Commits the bookkeeping for a fetched page. A corrective fetch replaces
    /// the record of the page it re-fetched.
    pub fn record_page(
        &mut self,
        ticket: &FetchTicket,
        boundary: Option<CursorAnchor>,
        live_ids: Vec<String>,
        next_token: Option<String>,
    ) {
        if ticket.corrective {
            self.pages.pop();
        }
        self.pages.push(PageRecord {
            begin_token: ticket.token.clone(),
            boundary,
            live_ids,
        });
        self.exhausted = next_token.is_none();
        self.next_token = next_token;
        if self.exhausted {
            log::info!("Listing exhausted after {} page(s)", self.pages.len());
        }
    }

    /// Prunes a removed entry from its page record. Returns true when this
    /// removal emptied a previously non-empty page.
    pub fn note_removed(&mut self, id: &str) -> bool {
        for page in &mut self.pages {
            if let Some(pos) = page.live_ids.iter().position(|live| live == id) {
                page.live_ids.remove(pos);
                return page.live_ids.is_empty();
            }
        }
        false
    }

    /// Clears all pagination state and bumps the epoch so that any in-flight
    /// response is discarded on arrival.
    pub fn reset(&mut self) {
        self.pages.clear();
        self.next_token = None;
        self.exhausted = false;
        self.in_flight = false;
        self.pending_correction = None;
        self.epoch += 1;
    }
}
