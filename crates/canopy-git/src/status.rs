//! Working-tree status polling and per-path classification.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use canopy_api::ProjectApi;
use canopy_core::{FileGitStatus, GitStatusSnapshot, ProjectContext, StagedKind};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{GitError, GitOp, GitResult};

/// Derive the per-path status map from one snapshot.
///
/// Precedence is staged, modified, deleted, created, untracked, conflicted,
/// renamed: a path keeps the first classification it receives. Staged
/// paths are refined by the created and deleted lists. Renames are keyed
/// by their destination.
pub fn classify(snapshot: &GitStatusSnapshot) -> BTreeMap<String, FileGitStatus> {
    let created: HashSet<&str> = snapshot.created.iter().map(String::as_str).collect();
    let deleted: HashSet<&str> = snapshot.deleted.iter().map(String::as_str).collect();

    let mut files = BTreeMap::new();
    for path in &snapshot.staged {
        let kind = if created.contains(path.as_str()) {
            StagedKind::Added
        } else if deleted.contains(path.as_str()) {
            StagedKind::Deleted
        } else {
            StagedKind::Modified
        };
        files
            .entry(path.clone())
            .or_insert(FileGitStatus::Staged { kind });
    }

    let plain = [
        (&snapshot.modified, FileGitStatus::Modified),
        (&snapshot.deleted, FileGitStatus::Deleted),
        (&snapshot.created, FileGitStatus::Created),
        (&snapshot.untracked, FileGitStatus::Untracked),
        (&snapshot.conflicted, FileGitStatus::Conflicted),
    ];
    for (paths, status) in plain {
        for path in paths {
            files.entry(path.clone()).or_insert_with(|| status.clone());
        }
    }

    for rename in &snapshot.renamed {
        files
            .entry(rename.to.clone())
            .or_insert_with(|| FileGitStatus::Renamed {
                from: rename.from.clone(),
            });
    }
    files
}

/// One published status: the raw snapshot plus its derived map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusView {
    pub snapshot: GitStatusSnapshot,
    pub files: BTreeMap<String, FileGitStatus>,
}

impl StatusView {
    pub fn new(snapshot: GitStatusSnapshot) -> Self {
        let files = classify(&snapshot);
        Self { snapshot, files }
    }

    pub fn status_of(&self, path: &str) -> Option<&FileGitStatus> {
        self.files.get(path)
    }

    /// Paths with merge conflicts. Listed regardless of the map's
    /// precedence, so a conflicted path that is also staged still shows.
    pub fn conflicted(&self) -> &[String] {
        &self.snapshot.conflicted
    }

    pub fn can_push(&self) -> bool {
        self.snapshot.ahead > 0
    }

    pub fn can_pull(&self) -> bool {
        self.snapshot.behind > 0
    }

    pub fn branch(&self) -> &str {
        &self.snapshot.branch
    }
}

/// What a background poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Updated,
    /// A mutating call was running, so nothing was fetched.
    Paused,
    /// A mutating call started or finished while the poll was in flight,
    /// or the project switched; the result was dropped.
    Discarded,
    /// The request failed; the previous status stays published.
    Failed,
}

/// Holds status polling off while alive.
#[must_use = "polling resumes as soon as the guard is dropped"]
pub struct PauseGuard {
    pauses: Arc<AtomicUsize>,
    mutations: Arc<AtomicU64>,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        self.pauses.fetch_sub(1, Ordering::SeqCst);
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fetches status and publishes it as an immutable [`StatusView`].
pub struct StatusReconciler<A> {
    api: Arc<A>,
    project: Arc<ProjectContext>,
    tx: watch::Sender<Arc<StatusView>>,
    pauses: Arc<AtomicUsize>,
    mutations: Arc<AtomicU64>,
}

impl<A: ProjectApi> StatusReconciler<A> {
    pub fn new(api: Arc<A>, project: Arc<ProjectContext>) -> Self {
        let (tx, _) = watch::channel(Arc::new(StatusView::default()));
        Self {
            api,
            project,
            tx,
            pauses: Arc::new(AtomicUsize::new(0)),
            mutations: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn current(&self) -> Arc<StatusView> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<StatusView>> {
        self.tx.subscribe()
    }

    /// Suspend background polling until the guard drops. Any poll already
    /// in flight is discarded when it lands.
    pub fn pause(&self) -> PauseGuard {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        self.mutations.fetch_add(1, Ordering::SeqCst);
        PauseGuard {
            pauses: Arc::clone(&self.pauses),
            mutations: Arc::clone(&self.mutations),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pauses.load(Ordering::SeqCst) > 0
    }

    fn publish(&self, snapshot: GitStatusSnapshot) -> Arc<StatusView> {
        let view = Arc::new(StatusView::new(snapshot));
        self.tx.send_replace(Arc::clone(&view));
        view
    }

    /// Fetch status now and publish it. On failure the previous status stays
    /// published and the error is returned.
    pub async fn fetch_status(&self) -> GitResult<Arc<StatusView>> {
        let scope = self.project.scope();
        let result = self.api.status(scope.name()).await;
        if !scope.is_current() {
            return Err(GitError::Superseded(GitOp::Status));
        }

        let snapshot = result.map_err(|e| GitError::request(GitOp::Status, e))?;
        Ok(self.publish(snapshot))
    }

    /// Background poll: skipped while paused, failures only logged.
    pub async fn poll_once(&self) -> PollOutcome {
        if self.is_paused() {
            debug!("Status poll paused by a running git command");
            return PollOutcome::Paused;
        }

        let scope = self.project.scope();
        let seq = self.mutations.load(Ordering::SeqCst);
        let result = self.api.status(scope.name()).await;
        if !scope.is_current() || self.is_paused() || self.mutations.load(Ordering::SeqCst) != seq
        {
            return PollOutcome::Discarded;
        }

        match result {
            Ok(snapshot) => {
                self.publish(snapshot);
                PollOutcome::Updated
            }
            Err(err) => {
                warn!(project = %scope.name(), error = %err, "Status poll failed");
                PollOutcome::Failed
            }
        }
    }

    /// Publish an empty status.
    pub fn clear(&self) {
        self.tx.send_replace(Arc::new(StatusView::default()));
    }
}

#[cfg(test)]
mod tests {
    use canopy_core::RenamedEntry;

    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_staged_created_is_added() {
        let snapshot = GitStatusSnapshot {
            staged: paths(&["new.rs", "gone.rs", "edit.rs"]),
            created: paths(&["new.rs"]),
            deleted: paths(&["gone.rs"]),
            ..Default::default()
        };
        let files = classify(&snapshot);
        assert_eq!(
            files["new.rs"],
            FileGitStatus::Staged {
                kind: StagedKind::Added
            }
        );
        assert_eq!(
            files["gone.rs"],
            FileGitStatus::Staged {
                kind: StagedKind::Deleted
            }
        );
        assert_eq!(
            files["edit.rs"],
            FileGitStatus::Staged {
                kind: StagedKind::Modified
            }
        );
    }

    #[test]
    fn test_precedence_order() {
        let snapshot = GitStatusSnapshot {
            modified: paths(&["a", "b"]),
            deleted: paths(&["b", "c"]),
            untracked: paths(&["d"]),
            conflicted: paths(&["a", "e"]),
            ..Default::default()
        };
        let files = classify(&snapshot);
        assert_eq!(files["a"], FileGitStatus::Modified);
        assert_eq!(files["b"], FileGitStatus::Modified);
        assert_eq!(files["c"], FileGitStatus::Deleted);
        assert_eq!(files["d"], FileGitStatus::Untracked);
        assert_eq!(files["e"], FileGitStatus::Conflicted);
    }

    #[test]
    fn test_rename_keyed_by_destination() {
        let snapshot = GitStatusSnapshot {
            renamed: vec![RenamedEntry::new("old.ts", "new.ts")],
            ..Default::default()
        };
        let view = StatusView::new(snapshot);
        assert_eq!(
            view.status_of("new.ts"),
            Some(&FileGitStatus::Renamed {
                from: "old.ts".into()
            })
        );
        assert!(view.status_of("old.ts").is_none());
    }

    #[test]
    fn test_conflicted_always_listed() {
        let view = StatusView::new(GitStatusSnapshot {
            staged: paths(&["x"]),
            conflicted: paths(&["x"]),
            ..Default::default()
        });
        assert!(view.status_of("x").unwrap().is_staged());
        assert_eq!(view.conflicted(), ["x"]);
    }

    #[test]
    fn test_push_pull_availability() {
        let view = StatusView::new(GitStatusSnapshot {
            ahead: 2,
            ..Default::default()
        });
        assert!(view.can_push());
        assert!(!view.can_pull());
    }
}
