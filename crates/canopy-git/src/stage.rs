//! Stage, unstage and discard orchestration.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use canopy_api::ProjectApi;
use canopy_core::{
    GitStatusSnapshot, PendingAction, ProjectContext, Release, SlideConfirm, normalize_path,
};
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{GitError, GitOp, GitResult};
use crate::status::StatusReconciler;

/// The index-mutating verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum IndexVerb {
    Stage,
    Unstage,
    Discard,
}

impl IndexVerb {
    fn op(self) -> GitOp {
        match self {
            Self::Stage => GitOp::Stage,
            Self::Unstage => GitOp::Unstage,
            Self::Discard => GitOp::Discard,
        }
    }

    /// Verbs whose in-flight paths block this one.
    fn blocked_by(self) -> &'static [IndexVerb] {
        match self {
            Self::Stage | Self::Unstage => &[Self::Stage, Self::Unstage],
            Self::Discard => &[Self::Discard],
        }
    }
}

#[derive(Debug, Default)]
struct InFlightState {
    generation: u64,
    paths: HashMap<IndexVerb, HashSet<String>>,
}

/// Per-verb sets of paths with a request in flight.
#[derive(Debug, Default)]
pub struct InFlight {
    state: Mutex<InFlightState>,
}

impl InFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, InFlightState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim every group whose paths are all free for `verb` (or, for stage
    /// and unstage, for the opposite verb). A group is taken whole or not
    /// at all, so a rename pair is never split. `None` when nothing is left.
    pub fn try_claim(self: &Arc<Self>, verb: IndexVerb, groups: &[Vec<String>]) -> Option<Claim> {
        let mut state = self.lock();
        let busy = |path: &String| {
            verb.blocked_by()
                .iter()
                .any(|v| state.paths.get(v).is_some_and(|set| set.contains(path)))
        };
        let mut accepted: Vec<String> = Vec::new();
        for group in groups {
            if group.iter().any(|path| busy(path) || accepted.contains(path)) {
                debug!(%verb, paths = ?group, "Group already in flight, skipping");
                continue;
            }
            accepted.extend(group.iter().cloned());
        }
        if accepted.is_empty() {
            return None;
        }

        let set = state.paths.entry(verb).or_default();
        set.extend(accepted.iter().cloned());
        Some(Claim {
            registry: Arc::clone(self),
            generation: state.generation,
            verb,
            paths: accepted,
        })
    }

    pub fn contains(&self, verb: IndexVerb, path: &str) -> bool {
        self.lock()
            .paths
            .get(&verb)
            .is_some_and(|set| set.contains(path))
    }

    /// Whether `path` is in flight for any verb.
    pub fn is_busy(&self, path: &str) -> bool {
        self.lock().paths.values().any(|set| set.contains(path))
    }

    /// Forget every claim. Claims taken before the clear release nothing.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.paths.clear();
    }
}

/// Paths claimed for one verb; released when dropped.
#[derive(Debug)]
pub struct Claim {
    registry: Arc<InFlight>,
    generation: u64,
    verb: IndexVerb,
    paths: Vec<String>,
}

impl Claim {
    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        let mut state = self.registry.lock();
        if state.generation != self.generation {
            return;
        }
        if let Some(set) = state.paths.get_mut(&self.verb) {
            for path in &self.paths {
                set.remove(path);
            }
        }
    }
}

/// Group paths so both ends of a rename travel together. Each path lands
/// in exactly one group.
pub fn rename_groups(snapshot: &GitStatusSnapshot, paths: &[String]) -> Vec<Vec<String>> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut groups = Vec::new();
    for path in paths {
        let group = match snapshot.rename_of(path) {
            Some(rename) => vec![rename.from.clone(), rename.to.clone()],
            None => vec![path.clone()],
        };
        if group.iter().any(|p| seen.contains(p.as_str())) {
            continue;
        }
        seen.insert(path.as_str());
        if let Some(rename) = snapshot.rename_of(path) {
            seen.insert(rename.from.as_str());
            seen.insert(rename.to.as_str());
        }
        groups.push(group);
    }
    groups
}

/// Expand rename endpoints so a rename is always acted on as a pair.
pub fn with_rename_pairs(snapshot: &GitStatusSnapshot, paths: &[String]) -> Vec<String> {
    rename_groups(snapshot, paths).concat()
}

/// Every unstaged change, each path once: modified, deleted, created,
/// untracked and both ends of each rename, minus staged and conflicted
/// paths. A rename with either end staged or conflicted is left out whole.
pub fn stage_all_candidates(snapshot: &GitStatusSnapshot) -> Vec<String> {
    let staged: HashSet<&str> = snapshot.staged.iter().map(String::as_str).collect();
    let conflicted: HashSet<&str> = snapshot.conflicted.iter().map(String::as_str).collect();
    let excluded = |path: &str| staged.contains(path) || conflicted.contains(path);

    let plain = snapshot
        .modified
        .iter()
        .chain(&snapshot.deleted)
        .chain(&snapshot.created)
        .chain(&snapshot.untracked)
        .filter(|path| snapshot.rename_of(path.as_str()).is_none());
    let renames = snapshot
        .renamed
        .iter()
        .filter(|r| !excluded(r.from.as_str()) && !excluded(r.to.as_str()))
        .flat_map(|r| [&r.from, &r.to]);

    plain
        .filter(|path| !excluded(path.as_str()))
        .chain(renames)
        .unique()
        .cloned()
        .collect()
}

pub fn unstage_all_candidates(snapshot: &GitStatusSnapshot) -> Vec<String> {
    snapshot.staged.iter().unique().cloned().collect()
}

/// Unstaged changes that discard can restore. Conflicted paths are left
/// for the user to resolve.
pub fn discard_all_candidates(snapshot: &GitStatusSnapshot) -> Vec<String> {
    stage_all_candidates(snapshot)
}

/// What a discard confirmation targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiscardTarget {
    Path(String),
    All,
}

/// Result of a stage/unstage/discard request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The server accepted the change for these paths.
    Applied { verb: IndexVerb, paths: Vec<String> },
    /// Every path was already in flight, or there was nothing to do.
    Ignored,
}

/// Result of releasing the discard slider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardRelease {
    Fired(IndexOutcome),
    SnappedBack,
    Idle,
}

/// Runs index mutations against the server and refetches status after each
/// success. The status map is never patched locally.
pub struct StageOrchestrator<A> {
    api: Arc<A>,
    project: Arc<ProjectContext>,
    status: Arc<StatusReconciler<A>>,
    in_flight: Arc<InFlight>,
    confirm: Mutex<SlideConfirm<DiscardTarget>>,
}

impl<A: ProjectApi> StageOrchestrator<A> {
    pub fn new(
        api: Arc<A>,
        project: Arc<ProjectContext>,
        status: Arc<StatusReconciler<A>>,
        confirm_threshold: u8,
    ) -> Self {
        Self {
            api,
            project,
            status,
            in_flight: InFlight::new(),
            confirm: Mutex::new(SlideConfirm::new(confirm_threshold)),
        }
    }

    pub fn in_flight(&self) -> &Arc<InFlight> {
        &self.in_flight
    }

    fn confirm(&self) -> MutexGuard<'_, SlideConfirm<DiscardTarget>> {
        self.confirm.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(&self, verb: IndexVerb, groups: Vec<Vec<String>>) -> GitResult<IndexOutcome> {
        let Some(claim) = self.in_flight.try_claim(verb, &groups) else {
            debug!(%verb, "Paths already in flight, ignoring");
            return Ok(IndexOutcome::Ignored);
        };

        let scope = self.project.scope();
        let result = match verb {
            IndexVerb::Stage => self.api.stage(scope.name(), claim.paths()).await,
            IndexVerb::Unstage => self.api.unstage(scope.name(), claim.paths()).await,
            IndexVerb::Discard => self.api.discard(scope.name(), claim.paths()).await,
        };
        if !scope.is_current() {
            return Err(GitError::Superseded(verb.op()));
        }
        result.map_err(|e| GitError::request(verb.op(), e))?;

        let paths = claim.paths().to_vec();
        drop(claim);
        if let Err(err) = self.status.fetch_status().await {
            warn!(%verb, error = %err, "Status refetch after index change failed");
        }
        Ok(IndexOutcome::Applied { verb, paths })
    }

    /// Stage one path. Both ends of a rename are staged together.
    pub async fn stage(&self, path: &str) -> GitResult<IndexOutcome> {
        let path = normalize_path(path);
        let view = self.status.current();
        if view.snapshot.is_conflicted(&path) {
            return Err(GitError::Conflicted(path));
        }
        let groups = rename_groups(&view.snapshot, &[path]);
        self.run(IndexVerb::Stage, groups).await
    }

    pub async fn unstage(&self, path: &str) -> GitResult<IndexOutcome> {
        let path = normalize_path(path);
        let view = self.status.current();
        let groups = rename_groups(&view.snapshot, &[path]);
        self.run(IndexVerb::Unstage, groups).await
    }

    /// Stage a set of paths, dropping conflicted ones.
    pub async fn stage_paths(&self, paths: &[String]) -> GitResult<IndexOutcome> {
        let view = self.status.current();
        let normalized: Vec<String> = paths
            .iter()
            .map(|p| normalize_path(p))
            .filter(|p| !view.snapshot.is_conflicted(p))
            .collect();
        let groups = rename_groups(&view.snapshot, &normalized);
        if groups.is_empty() {
            return Ok(IndexOutcome::Ignored);
        }
        self.run(IndexVerb::Stage, groups).await
    }

    pub async fn unstage_paths(&self, paths: &[String]) -> GitResult<IndexOutcome> {
        let view = self.status.current();
        let normalized: Vec<String> = paths.iter().map(|p| normalize_path(p)).collect();
        let groups = rename_groups(&view.snapshot, &normalized);
        if groups.is_empty() {
            return Ok(IndexOutcome::Ignored);
        }
        self.run(IndexVerb::Unstage, groups).await
    }

    pub async fn stage_all(&self) -> GitResult<IndexOutcome> {
        let view = self.status.current();
        let groups = rename_groups(&view.snapshot, &stage_all_candidates(&view.snapshot));
        if groups.is_empty() {
            return Ok(IndexOutcome::Ignored);
        }
        self.run(IndexVerb::Stage, groups).await
    }

    pub async fn unstage_all(&self) -> GitResult<IndexOutcome> {
        let view = self.status.current();
        let groups = rename_groups(&view.snapshot, &unstage_all_candidates(&view.snapshot));
        if groups.is_empty() {
            return Ok(IndexOutcome::Ignored);
        }
        self.run(IndexVerb::Unstage, groups).await
    }

    /// Phase one of a discard: arm the slider at zero progress.
    pub fn arm_discard(&self, target: DiscardTarget) {
        self.confirm().arm(target);
    }

    /// Phase two: feed drag progress (0-100).
    pub fn drag_discard(&self, progress: u8) {
        self.confirm().drag(progress);
    }

    pub fn cancel_discard(&self) {
        self.confirm().cancel();
    }

    pub fn pending_discard(&self) -> Option<PendingAction<DiscardTarget>> {
        self.confirm().pending().cloned()
    }

    pub fn confirm_threshold(&self) -> u8 {
        self.confirm().threshold()
    }

    /// Release the slider. Past the threshold the discard fires exactly
    /// once; below it the slider snaps back and nothing is sent.
    pub async fn release_discard(&self) -> GitResult<DiscardRelease> {
        let release = self.confirm().release();
        let target = match release {
            Release::Fire(target) => target,
            Release::SnappedBack => return Ok(DiscardRelease::SnappedBack),
            Release::Idle => return Ok(DiscardRelease::Idle),
        };

        let snapshot = self.status.current().snapshot.clone();
        let paths = match target {
            DiscardTarget::Path(path) => vec![normalize_path(&path)],
            DiscardTarget::All => discard_all_candidates(&snapshot),
        };
        let groups = rename_groups(&snapshot, &paths);
        if groups.is_empty() {
            return Ok(DiscardRelease::Fired(IndexOutcome::Ignored));
        }
        self.run(IndexVerb::Discard, groups)
            .await
            .map(DiscardRelease::Fired)
    }

    /// Drop in-flight claims and any armed discard.
    pub fn reset(&self) {
        self.in_flight.clear();
        self.confirm().cancel();
    }
}
