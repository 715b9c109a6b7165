//! Ordered, cursor-paginated listing synchronizer.
//!
//! Keeps a locally cached, incrementally loaded, sorted list of container
//! entries (files/folders) consistent with a remote paginated source while
//! local mutations (create, rename, move, delete, flag) happen out of band.
//! Materialized entries are partitioned into a trusted ordered prefix and an
//! unordered tail; entries snap from the tail into their confirmed position
//! as pages come in, and boundary-invalidating mutations leave a corrective
//! refetch signal for the next fetch instead of forcing a full reload.
//!
//! The environment supplies a [`PageSource`]; the application owns one
//! [`ListingSync`] per mounted list and feeds it normalized
//! insert/update/remove calls.

mod entry;
mod fixture;
mod partition;
mod reconciler;
mod sorting;
mod source;
mod store;
mod sync;

#[cfg(test)]
mod partition_test;
#[cfg(test)]
mod store_test;

pub use entry::{Entry, EntryKind, EntryPatch};
pub use fixture::FixtureSource;
pub use reconciler::{ListingChange, MutationOutcome};
pub use sorting::{SortColumn, SortMode, SortOrder, compare_entries, sort_entries};
pub use source::{FetchError, Page, PageSource};
pub use store::Correction;
pub use sync::{
    DEFAULT_PAGE_SIZE, FetchOutcome, Listener, ListingEvent, ListingStats, ListingSync, MaterializedListing,
    SyncConfig,
};
