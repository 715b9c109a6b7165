//! Sorting configuration and the total-order comparator for listings.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::entry::{Entry, EntryKind};

// ============================================================================
// Sorting configuration
// ============================================================================

/// Column to sort entries by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortColumn {
    #[default]
    Name,
    Extension,
    Size,
    Modified,
}

/// Sort order (ascending or descending).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Column plus direction; the complete description of a listing's order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SortMode {
    pub column: SortColumn,
    pub order: SortOrder,
}

impl SortMode {
    pub fn new(column: SortColumn, order: SortOrder) -> Self {
        Self { column, order }
    }
}

// ============================================================================
// Comparator
// ============================================================================

/// Extracts file extension for sorting purposes.
/// Returns: (is_dotfile, has_extension, extension_lowercase)
/// Dotfiles (names starting with .) sort first, then names without extension, then by extension.
fn extract_extension_for_sort(name: &str) -> (bool, bool, String) {
    if name.starts_with('.') && !name[1..].contains('.') {
        return (true, false, String::new());
    }

    if let Some(dot_pos) = name.rfind('.')
        && dot_pos > 0
        && dot_pos < name.len() - 1
    {
        let ext = name[dot_pos + 1..].to_lowercase();
        return (false, true, ext);
    }

    (false, false, String::new())
}

/// Compares two names using natural (alphanumeric) sort, case-insensitive.
fn compare_names_natural(a: &str, b: &str) -> Ordering {
    alphanumeric_sort::compare_str(a.to_lowercase(), b.to_lowercase())
}

/// Compares by extension: dotfiles first, then no extension, then by extension,
/// with a natural name comparison breaking ties.
fn compare_extensions(a: &Entry, b: &Entry) -> Ordering {
    let (a_dotfile, a_has_ext, a_ext) = extract_extension_for_sort(&a.name);
    let (b_dotfile, b_has_ext, b_ext) = extract_extension_for_sort(&b.name);

    match (a_dotfile, b_dotfile) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => compare_names_natural(&a.name, &b.name),
        (false, false) => match (a_has_ext, b_has_ext) {
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, false) => compare_names_natural(&a.name, &b.name),
            (true, true) => {
                alphanumeric_sort::compare_str(&a_ext, &b_ext).then_with(|| compare_names_natural(&a.name, &b.name))
            }
        },
    }
}

/// Total-order comparator over entries for a sort mode.
///
/// Folders come before files for every column except Size (size sorting
/// intermixes containers and leaves). The requested column decides next,
/// reversed for descending order. The id is always the final tie-break and is
/// never reversed, so runs of equal keys have a single deterministic order in
/// both directions.
pub fn compare_entries(a: &Entry, b: &Entry, mode: SortMode) -> Ordering {
    if mode.column != SortColumn::Size {
        match (a.kind, b.kind) {
            (EntryKind::Folder, EntryKind::File) => return Ordering::Less,
            (EntryKind::File, EntryKind::Folder) => return Ordering::Greater,
            _ => {}
        }
    }

    let primary = match mode.column {
        SortColumn::Name => compare_names_natural(&a.name, &b.name),
        SortColumn::Extension => compare_extensions(a, b),
        SortColumn::Size => match (a.size, b.size) {
            (None, None) => compare_names_natural(&a.name, &b.name),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a_size), Some(b_size)) => a_size
                .cmp(&b_size)
                .then_with(|| compare_names_natural(&a.name, &b.name)),
        },
        SortColumn::Modified => match (a.modified_at, b.modified_at) {
            (None, None) => compare_names_natural(&a.name, &b.name),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a_time), Some(b_time)) => a_time
                .cmp(&b_time)
                .then_with(|| compare_names_natural(&a.name, &b.name)),
        },
    };

    let directed = match mode.order {
        SortOrder::Ascending => primary,
        SortOrder::Descending => primary.reverse(),
    };

    directed.then_with(|| a.id.cmp(&b.id))
}

/// Sorts a slice of entries by the given mode.
pub fn sort_entries(entries: &mut [Entry], mode: SortMode) {
    entries.sort_by(|a, b| compare_entries(a, b, mode));
}
