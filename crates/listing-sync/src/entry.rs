//! File and folder entry types held by a synchronized listing.

use serde::{Deserialize, Serialize};

/// Whether an entry is a folder (container) or a file (leaf).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    Folder,
    File,
}

/// A file or folder entry as materialized by the synchronizer.
///
/// Identity (`id`) is stable across renames and moves within the same list.
/// `generation` counts sortable-attribute changes: a page fetch that started
/// against generation N of its boundary entry cannot trust the continuation
/// token once the boundary's generation has moved on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub name: String,
    pub kind: EntryKind,
    /// Byte size. `None` for folders and files whose size is unknown.
    pub size: Option<u64>,
    /// Last-update timestamp (Unix seconds).
    pub modified_at: Option<u64>,
    /// Favorite marker. Never participates in sorting.
    #[serde(default)]
    pub flagged: bool,
    /// Bumped whenever a sortable attribute changes.
    #[serde(default)]
    pub generation: u64,
}

impl Entry {
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// Attribute changes carried by an `update` mutation.
///
/// `None` fields are left untouched. Id and kind are immutable for the
/// lifetime of the entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    pub name: Option<String>,
    pub size: Option<u64>,
    pub modified_at: Option<u64>,
    pub flagged: Option<bool>,
}

impl EntryPatch {
    /// A patch that only renames.
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// A patch that only toggles the flagged marker.
    pub fn flag(flagged: bool) -> Self {
        Self {
            flagged: Some(flagged),
            ..Self::default()
        }
    }

    /// True if applying this patch to `entry` would change a sortable attribute.
    pub fn changes_sort_key(&self, entry: &Entry) -> bool {
        self.name.as_ref().is_some_and(|name| *name != entry.name)
            || self.size.is_some_and(|size| Some(size) != entry.size)
            || self.modified_at.is_some_and(|at| Some(at) != entry.modified_at)
    }

    /// Applies the patch in place. Returns true if a sortable attribute
    /// changed; the entry's generation is bumped in that case.
    pub fn apply(&self, entry: &mut Entry) -> bool {
        let resorts = self.changes_sort_key(entry);
        if let Some(name) = &self.name {
            entry.name = name.clone();
        }
        if let Some(size) = self.size {
            entry.size = Some(size);
        }
        if let Some(modified_at) = self.modified_at {
            entry.modified_at = Some(modified_at);
        }
        if let Some(flagged) = self.flagged {
            entry.flagged = flagged;
        }
        if resorts {
            entry.generation += 1;
        }
        resorts
    }
}
