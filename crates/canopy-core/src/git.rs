//! Git working-tree and history types shared between the client and the
//! server contract.

use serde::{Deserialize, Serialize};

/// A rename reported by `git status`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenamedEntry {
    pub from: String,
    pub to: String,
}

impl RenamedEntry {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// One complete status reading. Each poll supersedes the previous snapshot
/// entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitStatusSnapshot {
    pub branch: String,
    pub ahead: u32,
    pub behind: u32,
    pub is_clean: bool,
    pub staged: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    pub created: Vec<String>,
    pub untracked: Vec<String>,
    pub renamed: Vec<RenamedEntry>,
    pub conflicted: Vec<String>,
}

impl GitStatusSnapshot {
    /// Whether `path` is in the staged list.
    pub fn is_staged(&self, path: &str) -> bool {
        self.staged.iter().any(|p| p == path)
    }

    /// Whether `path` is in conflict.
    pub fn is_conflicted(&self, path: &str) -> bool {
        self.conflicted.iter().any(|p| p == path)
    }

    /// Find the rename whose destination or source is `path`.
    pub fn rename_of(&self, path: &str) -> Option<&RenamedEntry> {
        self.renamed.iter().find(|r| r.to == path || r.from == path)
    }
}

/// How a staged path is staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum StagedKind {
    Added,
    Deleted,
    Modified,
}

/// Per-path classification derived from a [`GitStatusSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FileGitStatus {
    Staged { kind: StagedKind },
    Modified,
    Deleted,
    Created,
    Untracked,
    Conflicted,
    Renamed { from: String },
}

impl FileGitStatus {
    /// Single-letter badge used by list views.
    pub fn badge(&self) -> char {
        match self {
            Self::Staged {
                kind: StagedKind::Added,
            } => 'A',
            Self::Staged {
                kind: StagedKind::Deleted,
            } => 'D',
            Self::Staged {
                kind: StagedKind::Modified,
            } => 'M',
            Self::Modified => 'M',
            Self::Deleted => 'D',
            Self::Created => 'A',
            Self::Untracked => 'U',
            Self::Conflicted => 'C',
            Self::Renamed { .. } => 'R',
        }
    }

    /// Check if this classification is a staged one.
    pub fn is_staged(&self) -> bool {
        matches!(self, Self::Staged { .. })
    }
}

impl std::fmt::Display for FileGitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Staged { kind } => write!(f, "Staged ({kind})"),
            Self::Modified => write!(f, "Modified"),
            Self::Deleted => write!(f, "Deleted"),
            Self::Created => write!(f, "Created"),
            Self::Untracked => write!(f, "Untracked"),
            Self::Conflicted => write!(f, "Conflicted"),
            Self::Renamed { from } => write!(f, "Renamed from {from}"),
        }
    }
}

/// A commit as returned by the log endpoint, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    pub hash: String,
    #[serde(default)]
    pub hash_short: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub is_head: bool,
    #[serde(default)]
    pub is_pushed: bool,
    #[serde(default)]
    pub is_remote_head: bool,
}

/// Response of the log endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogResponse {
    pub commits: Vec<CommitRecord>,
    pub unpushed_count: u32,
    pub merge_base_hash: Option<String>,
    pub default_branch: Option<String>,
}

/// A local or remote branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub commit: String,
    #[serde(default)]
    pub label: String,
}

/// Change summary attached to pull responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSummary {
    pub changes: u32,
}

/// Response of fetch/push/pull.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncResponse {
    pub ahead: Option<u32>,
    pub behind: Option<u32>,
    pub tracking: Option<String>,
    pub summary: Option<SyncSummary>,
}

/// Reference to a freshly created commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub hash: String,
}

/// Response of the commit endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResponse {
    pub commit: CommitRef,
}

/// Response of the checkout endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub branch: String,
}
