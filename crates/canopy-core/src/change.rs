//! Change records produced by the change detector.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::entry::{DirectoryEntry, EntryKind};

/// How an entry changed between two listings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

/// A single detected change. Ephemeral: dropped when the user applies the
/// update or the tree reloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub path: String,
    pub name: CompactString,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(rename = "changeType")]
    pub change_type: ChangeType,
}

impl ChangeRecord {
    /// Build a change record for an entry.
    pub fn new(entry: &DirectoryEntry, change_type: ChangeType) -> Self {
        Self {
            path: entry.path.clone(),
            name: entry.name.clone(),
            kind: entry.kind,
            change_type,
        }
    }

    pub fn added(entry: &DirectoryEntry) -> Self {
        Self::new(entry, ChangeType::Added)
    }

    pub fn removed(entry: &DirectoryEntry) -> Self {
        Self::new(entry, ChangeType::Removed)
    }

    pub fn modified(entry: &DirectoryEntry) -> Self {
        Self::new(entry, ChangeType::Modified)
    }
}
