//! Tests for the ordered-prefix / unordered-tail partition.

use crate::entry::{Entry, EntryKind};
use crate::partition::{Partition, Placement, Region};
use crate::sorting::SortMode;

fn make_file(id: &str, name: &str) -> Entry {
    Entry {
        id: id.to_string(),
        name: name.to_string(),
        kind: EntryKind::File,
        size: Some(1),
        modified_at: Some(1_700_000_000),
        flagged: false,
        generation: 0,
    }
}

fn ids(partition: &Partition) -> Vec<String> {
    partition.iter().map(|entry| entry.id.clone()).collect()
}

fn seeded(names: &[&str]) -> Partition {
    let mut partition = Partition::new();
    for name in names {
        partition.push_fetched(make_file(name, name));
    }
    partition
}

#[test]
fn place_inside_prefix_splices() {
    let mut partition = seeded(&["a", "c"]);

    let placement = partition.place(make_file("b", "b"), SortMode::default(), false);

    assert_eq!(placement, Placement::Prefix(1));
    assert_eq!(ids(&partition), vec!["a", "b", "c"]);
}

#[test]
fn place_before_first_entry_splices_at_zero() {
    let mut partition = seeded(&["b", "c"]);

    let placement = partition.place(make_file("a", "a"), SortMode::default(), false);

    assert_eq!(placement, Placement::Prefix(0));
    assert_eq!(ids(&partition), vec!["a", "b", "c"]);
}

#[test]
fn place_past_frontier_defers_to_tail() {
    let mut partition = seeded(&["a", "b"]);

    let placement = partition.place(make_file("z", "z"), SortMode::default(), false);

    assert_eq!(placement, Placement::Tail(0));
    assert_eq!(partition.prefix_len(), 2);
    // The tail still renders, appended after the prefix.
    assert_eq!(ids(&partition), vec!["a", "b", "z"]);
}

#[test]
fn place_past_frontier_splices_when_exhausted() {
    let mut partition = seeded(&["a", "b"]);

    let placement = partition.place(make_file("z", "z"), SortMode::default(), true);

    assert_eq!(placement, Placement::Prefix(2));
    assert_eq!(partition.prefix_len(), 3);
}

#[test]
fn place_into_empty_unexhausted_partition_defers() {
    let mut partition = Partition::new();

    let placement = partition.place(make_file("a", "a"), SortMode::default(), false);

    assert_eq!(placement, Placement::Tail(0));
}

#[test]
fn snap_in_moves_covered_tail_entries() {
    let mut partition = seeded(&["a", "b"]);
    partition.place(make_file("m", "m"), SortMode::default(), false);
    assert_eq!(partition.prefix_len(), 2);

    partition.push_fetched(make_file("c", "c"));
    partition.push_fetched(make_file("x", "x"));

    let snapped = partition.snap_in(SortMode::default(), false);

    assert_eq!(snapped, vec![("m".to_string(), 3)]);
    assert_eq!(ids(&partition), vec!["a", "b", "c", "m", "x"]);
}

#[test]
fn snap_in_leaves_entries_beyond_the_frontier() {
    let mut partition = seeded(&["a"]);
    partition.place(make_file("z", "z"), SortMode::default(), false);

    partition.push_fetched(make_file("b", "b"));
    let snapped = partition.snap_in(SortMode::default(), false);

    assert!(snapped.is_empty());
    assert_eq!(partition.prefix_len(), 2);
}

#[test]
fn snap_in_drains_the_tail_on_exhaustion() {
    let mut partition = seeded(&["a"]);
    partition.place(make_file("z", "z"), SortMode::default(), false);
    partition.place(make_file("y", "y"), SortMode::default(), false);

    let snapped = partition.snap_in(SortMode::default(), true);

    assert_eq!(snapped.len(), 2);
    assert_eq!(ids(&partition), vec!["a", "y", "z"]);
}

#[test]
fn remove_reports_the_region() {
    let mut partition = seeded(&["a", "b"]);
    partition.place(make_file("z", "z"), SortMode::default(), false);

    let (removed, region) = partition.remove("b").unwrap();
    assert_eq!(removed.id, "b");
    assert_eq!(region, Region::Prefix);

    let (removed, region) = partition.remove("z").unwrap();
    assert_eq!(removed.id, "z");
    assert_eq!(region, Region::Tail);

    assert!(partition.remove("missing").is_none());
    assert_eq!(partition.len(), 1);
}

#[test]
fn find_and_global_index_span_both_regions() {
    let mut partition = seeded(&["a", "b"]);
    partition.place(make_file("z", "z"), SortMode::default(), false);

    let (region, index) = partition.find("b").unwrap();
    assert_eq!(partition.global_index(region, index), 1);

    let (region, index) = partition.find("z").unwrap();
    assert_eq!(region, Region::Tail);
    assert_eq!(partition.global_index(region, index), 2);

    assert!(partition.find("missing").is_none());
}

#[test]
fn split_off_prefix_returns_the_suffix() {
    let mut partition = seeded(&["a", "b", "c", "d"]);

    let displaced = partition.split_off_prefix(2);

    let displaced_ids: Vec<&str> = displaced.iter().map(|entry| entry.id.as_str()).collect();
    assert_eq!(displaced_ids, vec!["c", "d"]);
    assert_eq!(ids(&partition), vec!["a", "b"]);
}

#[test]
fn version_advances_on_every_visible_change() {
    let mut partition = Partition::new();
    let before = partition.version();

    partition.push_fetched(make_file("a", "a"));
    let after_push = partition.version();
    assert!(after_push > before);

    partition.place(make_file("z", "z"), SortMode::default(), false);
    let after_place = partition.version();
    assert!(after_place > after_push);

    partition.remove("z");
    assert!(partition.version() > after_place);
}
