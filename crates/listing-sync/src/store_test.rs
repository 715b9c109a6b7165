//! Tests for the cursor pagination store.

use crate::sorting::SortMode;
use crate::source::FetchError;
use crate::store::{Correction, CursorAnchor, PageStore};

const PAGE_SIZE: usize = 25;

fn anchor(id: &str) -> Option<CursorAnchor> {
    Some(CursorAnchor {
        id: id.to_string(),
        generation: 0,
    })
}

/// Drives one full begin/commit cycle.
fn fetch_page(store: &mut PageStore, boundary: &str, live: &[&str], next: Option<&str>) {
    let (_request, ticket) = store.begin_fetch(SortMode::default(), PAGE_SIZE).unwrap();
    assert!(store.finish_fetch(&ticket));
    store.record_page(
        &ticket,
        anchor(boundary),
        live.iter().map(|id| id.to_string()).collect(),
        next.map(String::from),
    );
}

#[test]
fn first_fetch_has_no_token() {
    let mut store = PageStore::new();

    let (request, ticket) = store.begin_fetch(SortMode::default(), PAGE_SIZE).unwrap();

    assert_eq!(request.token, None);
    assert!(!ticket.corrective);
    assert!(store.in_flight());
}

#[test]
fn commit_advances_cursor_and_token() {
    let mut store = PageStore::new();

    fetch_page(&mut store, "n25", &["n24", "n25"], Some("t1"));

    assert_eq!(store.cursor().map(|cursor| cursor.id.as_str()), Some("n25"));
    assert!(!store.exhausted());

    let (request, _ticket) = store.begin_fetch(SortMode::default(), PAGE_SIZE).unwrap();
    assert_eq!(request.token.as_deref(), Some("t1"));
}

#[test]
fn null_token_exhausts_the_listing() {
    let mut store = PageStore::new();

    fetch_page(&mut store, "n10", &["n10"], None);

    assert!(store.exhausted());
    assert_eq!(
        store.begin_fetch(SortMode::default(), PAGE_SIZE).unwrap_err(),
        FetchError::Exhausted
    );
}

#[test]
fn second_begin_while_in_flight_is_rejected() {
    let mut store = PageStore::new();

    let (_request, ticket) = store.begin_fetch(SortMode::default(), PAGE_SIZE).unwrap();
    assert_eq!(
        store.begin_fetch(SortMode::default(), PAGE_SIZE).unwrap_err(),
        FetchError::AlreadyInFlight
    );

    store.abort_fetch(&ticket);
    assert!(store.begin_fetch(SortMode::default(), PAGE_SIZE).is_ok());
}

#[test]
fn reset_discards_the_in_flight_response() {
    let mut store = PageStore::new();

    let (_request, ticket) = store.begin_fetch(SortMode::default(), PAGE_SIZE).unwrap();
    store.reset();

    assert!(!store.finish_fetch(&ticket));
    // The reset list can start a fresh fetch immediately.
    assert!(store.begin_fetch(SortMode::default(), PAGE_SIZE).is_ok());
}

#[test]
fn full_refetch_outranks_current_page_correction() {
    let mut store = PageStore::new();
    fetch_page(&mut store, "a", &["a"], Some("t1"));

    store.flag_correction(Correction::RefetchCurrentPage { boundary_id: None });
    store.flag_correction(Correction::FullRefetch);
    assert_eq!(store.pending_correction(), Some(&Correction::FullRefetch));

    // A later current-page signal never downgrades the pending full refetch.
    store.flag_correction(Correction::RefetchCurrentPage { boundary_id: None });
    assert_eq!(store.pending_correction(), Some(&Correction::FullRefetch));
}

#[test]
fn corrective_begin_reuses_the_current_pages_token() {
    let mut store = PageStore::new();
    fetch_page(&mut store, "b", &["a", "b"], Some("t1"));
    fetch_page(&mut store, "d", &["c", "d"], Some("t2"));

    let correction = store.correction_for_current_page();
    assert_eq!(
        correction,
        Correction::RefetchCurrentPage {
            boundary_id: Some("b".to_string())
        }
    );
    store.flag_correction(correction);

    let (request, ticket) = store.begin_fetch(SortMode::default(), PAGE_SIZE).unwrap();
    assert_eq!(request.token.as_deref(), Some("t1"));
    assert!(ticket.corrective);
    assert_eq!(ticket.prev_boundary_id.as_deref(), Some("b"));

    // Committing the corrective page replaces the old record instead of
    // stacking a third page.
    assert!(store.finish_fetch(&ticket));
    store.record_page(&ticket, anchor("e"), vec!["c".to_string(), "e".to_string()], Some("t3".to_string()));
    assert_eq!(store.cursor().map(|cursor| cursor.id.as_str()), Some("e"));
    assert_eq!(store.prev_boundary_id().as_deref(), Some("b"));

    let (request, _ticket) = store.begin_fetch(SortMode::default(), PAGE_SIZE).unwrap();
    assert_eq!(request.token.as_deref(), Some("t3"));
}

#[test]
fn correction_before_any_page_falls_back_to_a_fresh_fetch() {
    let mut store = PageStore::new();

    store.flag_correction(Correction::RefetchCurrentPage { boundary_id: None });
    let (request, ticket) = store.begin_fetch(SortMode::default(), PAGE_SIZE).unwrap();

    assert_eq!(request.token, None);
    assert!(!ticket.corrective);
}

#[test]
fn note_removed_reports_an_emptied_page() {
    let mut store = PageStore::new();
    fetch_page(&mut store, "b", &["a", "b"], Some("t1"));

    assert!(!store.note_removed("a"));
    assert!(store.note_removed("b"));
    // Already pruned; a second removal of the same id changes nothing.
    assert!(!store.note_removed("b"));
}
