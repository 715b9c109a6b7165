//! The seam to the remote listing backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::sorting::SortMode;

/// One fetched page of entries.
///
/// `next_token` is the opaque, server-issued continuation token for the page
/// after this one; `None` means the listing is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub entries: Vec<Entry>,
    pub next_token: Option<String>,
}

/// Errors from the pagination and fetch path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// A fetch is already in flight for this list.
    AlreadyInFlight,
    /// No more pages exist and no correction is pending.
    Exhausted,
    /// The remote rejected the continuation token as stale.
    StaleCursor(String),
    /// Network or remote error.
    Source(String),
    /// A fetched page contradicted the trusted ordering; the list was reset
    /// and must be reloaded from scratch.
    OrderInvariantViolated,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyInFlight => write!(f, "A page fetch is already in flight for this list"),
            Self::Exhausted => write!(f, "The listing is exhausted; no further pages exist"),
            Self::StaleCursor(msg) => write!(f, "Continuation token rejected as stale: {}", msg),
            Self::Source(msg) => write!(f, "Page fetch failed: {}", msg),
            Self::OrderInvariantViolated => {
                write!(f, "Fetched page contradicted the trusted ordering; the list was reset")
            }
        }
    }
}

impl std::error::Error for FetchError {}

/// Trait for remote page-fetch backends.
///
/// Implementations yield entries in `sort` order, in fixed-size pages
/// addressed by opaque continuation tokens. Retry policy belongs to the
/// caller; implementations report failures as-is.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches one page of at most `page_size` entries.
    ///
    /// `token == None` requests the first page. Entries must be sorted by
    /// `sort`, and the returned token must continue after the page's last
    /// entry.
    async fn fetch_page(&self, sort: SortMode, token: Option<&str>, page_size: usize) -> Result<Page, FetchError>;
}
