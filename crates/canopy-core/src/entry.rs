//! Directory listing entries and their fingerprints.

use std::cmp::Ordering;

use blake3::Hasher;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Type of a listed entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    #[serde(alias = "directory")]
    Folder,
}

impl EntryKind {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        matches!(self, EntryKind::Folder)
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }
}

/// A single entry from one directory listing call.
///
/// `path` is the identity: project-relative, forward slashes, no trailing
/// slash. Entries are never patched after construction; a refreshed listing
/// replaces the whole set for its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Entry name (last path component).
    pub name: CompactString,

    /// File or folder.
    #[serde(rename = "type")]
    pub kind: EntryKind,

    /// Size in bytes (0 for folders on most servers).
    #[serde(default)]
    pub size: u64,

    /// Last modification time as reported by the server.
    #[serde(rename = "modifiedAt")]
    pub modified_at: DateTime<Utc>,

    /// Project-relative path.
    pub path: String,
}

impl DirectoryEntry {
    /// Create a file entry.
    pub fn file(path: impl Into<String>, size: u64, modified_at: DateTime<Utc>) -> Self {
        Self::new(path.into(), EntryKind::File, size, modified_at)
    }

    /// Create a folder entry.
    pub fn folder(path: impl Into<String>, modified_at: DateTime<Utc>) -> Self {
        Self::new(path.into(), EntryKind::Folder, 0, modified_at)
    }

    fn new(path: String, kind: EntryKind, size: u64, modified_at: DateTime<Utc>) -> Self {
        let path = normalize_path(&path);
        let name = path.rsplit('/').next().unwrap_or_default().into();
        Self {
            name,
            kind,
            size,
            modified_at,
            path,
        }
    }

    /// Check if this entry is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }

    /// Parent path of this entry ("" for top-level entries).
    pub fn parent(&self) -> &str {
        parent_path(&self.path)
    }
}

/// Normalize a project-relative path: forward slashes, no leading `./` or
/// `/`, no trailing slash.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let trimmed = path.trim_start_matches("./").trim_matches('/');
    trimmed
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Parent of a project-relative path. The root's parent is the root ("").
pub fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Join a parent path and a child name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// BLAKE3 digest of a directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    /// Create a fingerprint from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Compute the fingerprint of a listing.
    ///
    /// Entries are sorted by path first, so any permutation of the same set
    /// produces the same digest.
    pub fn of(entries: &[DirectoryEntry]) -> Self {
        let mut sorted: Vec<&DirectoryEntry> = entries.iter().collect();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));

        let mut hasher = Hasher::new();
        for entry in sorted {
            hasher.update(entry.path.as_bytes());
            hasher.update(&[0]);
            hasher.update(entry.name.as_bytes());
            hasher.update(&[0, entry.kind.is_folder() as u8]);
            hasher.update(&entry.size.to_le_bytes());
            hasher.update(&entry.modified_at.timestamp_millis().to_le_bytes());
            hasher.update(&[0xff]);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Get the fingerprint as a hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Display order for listings: folders first, then case-insensitive name.
pub fn display_order(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
    b.kind
        .is_folder()
        .cmp(&a.kind.is_folder())
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
}
