//! Core types for canopy.
//!
//! This crate provides the data model shared across the canopy workspace:
//! directory entries and their fingerprints, change records, git status and
//! history types, errors, configuration, the ignore list, the
//! slide-to-confirm state machine and the project epoch guard.

mod change;
mod config;
mod confirm;
mod entry;
mod error;
mod git;
mod ignore;
mod notify;
mod project;

pub use change::{ChangeRecord, ChangeType};
pub use config::{ConfigError, SyncConfig, SyncConfigBuilder};
pub use confirm::{DEFAULT_CONFIRM_THRESHOLD, PendingAction, Release, SlideConfirm};
pub use entry::{
    DirectoryEntry, EntryKind, Fingerprint, display_order, join_path, normalize_path, parent_path,
};
pub use error::{ApiError, ApiResult, ValidationError};
pub use git::{
    BranchInfo, CheckoutResponse, CommitRecord, CommitRef, CommitResponse, FileGitStatus,
    GitStatusSnapshot, LogResponse, RenamedEntry, StagedKind, SyncResponse, SyncSummary,
};
pub use ignore::{DEFAULT_IGNORED_DIRS, IgnoreList};
pub use notify::{Notification, NotificationLevel};
pub use project::{ProjectContext, ProjectScope};
