//! The workspace: one open project and every component that serves it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use canopy_api::ProjectApi;
use canopy_core::{
    CheckoutResponse, CommitResponse, DirectoryEntry, EntryKind, IgnoreList, Notification,
    ProjectContext, SyncConfig, SyncResponse,
};
use canopy_git::{
    DiscardRelease, GitActions, IndexOutcome, StageOrchestrator, StatusReconciler, StatusView,
    Timeline, TimelineBuilder,
};
use canopy_ops::{Created, CrudOrchestrator, DeleteRelease, Renamed, Selection};
use canopy_tree::{
    ChangeDetector, ChangeSet, DirectoryCache, HoverPrefetcher, Toggle, TreeLoader, UpdateOutcome,
    VisibleRow,
};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::{SessionError, SessionResult};
use crate::poller::spawn_poller;

const NOTIFICATION_CAPACITY: usize = 64;

fn files(n: usize) -> String {
    if n == 1 {
        "1 file".to_string()
    } else {
        format!("{n} files")
    }
}

/// Owns the project context and every component built on it.
///
/// Background polling starts with [`Workspace::start`] and stops on
/// [`Workspace::close`] or drop. Mutating operations report their outcome
/// as [`Notification`]s; background failures are only logged.
pub struct Workspace<A: ProjectApi> {
    config: SyncConfig,
    api: Arc<A>,
    project: Arc<ProjectContext>,
    loader: Arc<TreeLoader<A>>,
    detector: Arc<ChangeDetector<A>>,
    prefetcher: HoverPrefetcher<A>,
    status: Arc<StatusReconciler<A>>,
    index: StageOrchestrator<A>,
    git: GitActions<A>,
    timeline: TimelineBuilder<A>,
    files: CrudOrchestrator<A>,
    selection: Arc<Selection>,
    notifications: broadcast::Sender<Notification>,
    visible: watch::Sender<bool>,
    shutdown: CancellationToken,
    pollers: Mutex<Vec<JoinHandle<()>>>,
}

impl<A: ProjectApi> Workspace<A> {
    pub fn new(api: Arc<A>, config: SyncConfig, project: &str) -> Self {
        let project = Arc::new(ProjectContext::new(project));
        let cache = Arc::new(DirectoryCache::new());
        let loader = Arc::new(TreeLoader::new(
            Arc::clone(&api),
            Arc::clone(&cache),
            Arc::clone(&project),
            config.show_hidden,
        ));
        let detector = Arc::new(ChangeDetector::new(
            Arc::clone(&api),
            cache,
            Arc::clone(&project),
            config.ignore_list(),
            config.show_hidden,
        ));
        let prefetcher = HoverPrefetcher::new(Arc::clone(&loader), config.hover_delay());
        let status = Arc::new(StatusReconciler::new(Arc::clone(&api), Arc::clone(&project)));
        let index = StageOrchestrator::new(
            Arc::clone(&api),
            Arc::clone(&project),
            Arc::clone(&status),
            config.confirm_threshold,
        );
        let git = GitActions::new(Arc::clone(&api), Arc::clone(&project), Arc::clone(&status));
        let timeline = TimelineBuilder::new(Arc::clone(&api), Arc::clone(&project), config.log_limit);
        let selection = Arc::new(Selection::new());
        let files = CrudOrchestrator::new(
            Arc::clone(&api),
            Arc::clone(&project),
            Arc::clone(&loader),
            Arc::clone(&selection),
            config.confirm_threshold,
        );
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let (visible, _) = watch::channel(true);

        Self {
            config,
            api,
            project,
            loader,
            detector,
            prefetcher,
            status,
            index,
            git,
            timeline,
            files,
            selection,
            notifications,
            visible,
            shutdown: CancellationToken::new(),
            pollers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn project_name(&self) -> Arc<str> {
        self.project.name()
    }

    pub fn loader(&self) -> &Arc<TreeLoader<A>> {
        &self.loader
    }

    pub fn detector(&self) -> &Arc<ChangeDetector<A>> {
        &self.detector
    }

    pub fn status(&self) -> &Arc<StatusReconciler<A>> {
        &self.status
    }

    /// Stage, unstage and the discard slider.
    pub fn index(&self) -> &StageOrchestrator<A> {
        &self.index
    }

    pub fn git(&self) -> &GitActions<A> {
        &self.git
    }

    /// Rename, create and the delete slider.
    pub fn files(&self) -> &CrudOrchestrator<A> {
        &self.files
    }

    pub fn selection(&self) -> &Arc<Selection> {
        &self.selection
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub fn subscribe_changes(&self) -> watch::Receiver<ChangeSet> {
        self.detector.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Arc<StatusView>> {
        self.status.subscribe()
    }

    fn pollers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.pollers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notification: Notification) {
        trace!(level = %notification.level, message = %notification.message, "Notification");
        // No subscribers is fine.
        let _ = self.notifications.send(notification);
    }

    /// Turn a mutating result into a notification and a [`SessionError`].
    fn report<T, E>(
        &self,
        result: Result<T, E>,
        success: impl FnOnce(&T) -> Option<String>,
    ) -> SessionResult<T>
    where
        E: Into<SessionError>,
    {
        match result {
            Ok(value) => {
                if let Some(message) = success(&value) {
                    self.notify(Notification::success(message));
                }
                Ok(value)
            }
            Err(err) => {
                let err = err.into();
                if err.is_superseded() {
                    debug!(error = %err, "Dropped result from a previous project");
                } else if !err.is_validation() {
                    self.notify(Notification::error(err.to_string()));
                }
                Err(err)
            }
        }
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.shutdown.is_cancelled() {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    // ---- lifecycle ----

    /// Fetch the server's ignore list, falling back to the configured one.
    pub async fn refresh_ignore_list(&self) -> IgnoreList {
        let ignore = match self.api.ignore_list().await {
            Ok(names) => IgnoreList::new(names),
            Err(err) => {
                debug!(error = %err, "Server ignore list unavailable, using local list");
                self.config.ignore_list()
            }
        };
        self.detector.set_ignore_list(ignore.clone());
        ignore
    }

    /// Load the ignore list, root listing and git status.
    ///
    /// Only a failed root listing is an error; status is retried by the
    /// poller.
    pub async fn open(&self) -> SessionResult<Arc<[DirectoryEntry]>> {
        self.ensure_open()?;
        self.refresh_ignore_list().await;
        let root = self.loader.load_root().await?;
        if let Err(err) = self.status.fetch_status().await {
            warn!(error = %err, "Initial status fetch failed");
        }
        info!(project = %self.project.name(), entries = root.len(), "Opened project");
        Ok(root)
    }

    /// Spawn the change and status pollers. No-op if already running.
    pub fn start(&self) -> SessionResult<()> {
        self.ensure_open()?;
        let mut pollers = self.pollers();
        if !pollers.is_empty() {
            return Ok(());
        }

        let detector = Arc::clone(&self.detector);
        pollers.push(spawn_poller(
            "changes",
            self.config.change_poll_interval(),
            self.visible.subscribe(),
            self.shutdown.child_token(),
            move || {
                let detector = Arc::clone(&detector);
                async move {
                    let outcome = detector.poll_once().await;
                    trace!(?outcome, "Change tick");
                }
            },
        ));

        let status = Arc::clone(&self.status);
        pollers.push(spawn_poller(
            "status",
            self.config.status_poll_interval(),
            self.visible.subscribe(),
            self.shutdown.child_token(),
            move || {
                let status = Arc::clone(&status);
                async move {
                    let outcome = status.poll_once().await;
                    trace!(?outcome, "Status poll");
                }
            },
        ));
        Ok(())
    }

    /// Pollers run only while visible; becoming visible triggers an
    /// immediate tick. Losing focus cancels any armed discard or delete.
    pub fn set_visible(&self, visible: bool) {
        if !visible {
            self.cancel_pending();
        }
        self.visible.send_if_modified(|current| {
            let changed = *current != visible;
            *current = visible;
            changed
        });
    }

    pub fn is_visible(&self) -> bool {
        *self.visible.borrow()
    }

    /// Drop both destructive sliders without firing.
    pub fn cancel_pending(&self) {
        self.index.cancel_discard();
        self.files.cancel_delete();
    }

    /// Drop all state belonging to the current project and point every
    /// component at `name`. Results still in flight for the old project are
    /// discarded when they land.
    pub fn reset_for(&self, name: &str) {
        self.project.switch(name);
        self.prefetcher.cancel_all();
        self.loader.reset();
        self.detector.clear();
        self.status.clear();
        self.index.reset();
        self.files.reset();
        self.selection.clear();
        info!(project = %name, epoch = self.project.epoch(), "Switched project");
    }

    /// Switch project and load its root and status.
    pub async fn switch_project(&self, name: &str) -> SessionResult<Arc<[DirectoryEntry]>> {
        self.ensure_open()?;
        self.reset_for(name);
        let root = self.loader.load_root().await;
        let root = self.report(root, |_| None)?;
        if let Err(err) = self.status.fetch_status().await {
            warn!(error = %err, "Status fetch after switch failed");
        }
        Ok(root)
    }

    /// Stop polling and cancel every timer, then wait for the pollers.
    pub async fn close(&self) {
        self.shutdown.cancel();
        self.prefetcher.cancel_all();
        let pollers = std::mem::take(&mut *self.pollers());
        for poller in pollers {
            if let Err(err) = poller.await {
                debug!(error = %err, "Poller ended abnormally");
            }
        }
        info!(project = %self.project.name(), "Closed project");
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    // ---- tree ----

    /// Expand or collapse a folder. A failed expand is reported.
    pub async fn toggle_folder(&self, path: &str) -> SessionResult<Toggle> {
        let result = self.loader.toggle_folder(path).await;
        self.report(result, |_| None)
    }

    pub fn hover_start(&self, path: &str) {
        // The timer reports through the cache; the handle is not needed.
        drop(self.prefetcher.hover_start(path));
    }

    pub fn hover_end(&self, path: &str) {
        self.prefetcher.hover_end(path);
    }

    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        self.loader.visible_rows()
    }

    pub fn changes(&self) -> ChangeSet {
        self.detector.snapshot()
    }

    /// Refresh root and every expanded folder and clear the change set.
    pub async fn apply_update(&self) -> SessionResult<UpdateOutcome> {
        let result = self.detector.apply_update().await;
        self.report(result, |_| Some("Tree updated".to_string()))
    }

    // ---- git ----

    pub async fn stage(&self, path: &str) -> SessionResult<IndexOutcome> {
        let result = self.index.stage(path).await;
        self.report(result, |outcome| applied_message("Staged", outcome))
    }

    pub async fn unstage(&self, path: &str) -> SessionResult<IndexOutcome> {
        let result = self.index.unstage(path).await;
        self.report(result, |outcome| applied_message("Unstaged", outcome))
    }

    pub async fn stage_paths(&self, paths: &[String]) -> SessionResult<IndexOutcome> {
        let result = self.index.stage_paths(paths).await;
        self.report(result, |outcome| applied_message("Staged", outcome))
    }

    pub async fn unstage_paths(&self, paths: &[String]) -> SessionResult<IndexOutcome> {
        let result = self.index.unstage_paths(paths).await;
        self.report(result, |outcome| applied_message("Unstaged", outcome))
    }

    pub async fn stage_all(&self) -> SessionResult<IndexOutcome> {
        let result = self.index.stage_all().await;
        self.report(result, |outcome| applied_message("Staged", outcome))
    }

    pub async fn unstage_all(&self) -> SessionResult<IndexOutcome> {
        let result = self.index.unstage_all().await;
        self.report(result, |outcome| applied_message("Unstaged", outcome))
    }

    pub async fn release_discard(&self) -> SessionResult<DiscardRelease> {
        let result = self.index.release_discard().await;
        self.report(result, |release| match release {
            DiscardRelease::Fired(outcome) => applied_message("Discarded changes in", outcome),
            _ => None,
        })
    }

    /// Commit staged changes. Any armed discard or delete is cancelled
    /// first.
    pub async fn commit(&self, message: &str) -> SessionResult<CommitResponse> {
        self.cancel_pending();
        let result = self.git.commit(message).await;
        self.report(result, |response| {
            let hash = response.commit.hash.get(..7).unwrap_or(&response.commit.hash);
            Some(format!("Committed {hash}"))
        })
    }

    pub async fn fetch(&self) -> SessionResult<SyncResponse> {
        let result = self.git.fetch().await;
        self.report(result, |_| Some("Fetched from remote".to_string()))
    }

    pub async fn push(&self) -> SessionResult<SyncResponse> {
        let result = self.git.push().await;
        self.report(result, |_| Some("Pushed to remote".to_string()))
    }

    pub async fn pull(&self) -> SessionResult<SyncResponse> {
        let result = self.git.pull().await;
        self.report(result, |response| {
            Some(match response.summary.as_ref() {
                Some(summary) => format!("Pulled {} changes", summary.changes),
                None => "Pulled from remote".to_string(),
            })
        })
    }

    pub async fn checkout(&self, branch: &str, create: bool) -> SessionResult<CheckoutResponse> {
        let result = self.git.checkout(branch, create).await;
        self.report(result, |response| {
            Some(format!("Switched to branch {}", response.branch))
        })
    }

    /// Read path: errors are returned, not reported. `limit` defaults to
    /// the configured log limit.
    pub async fn fetch_timeline(&self, limit: Option<usize>) -> SessionResult<Timeline> {
        let limit = limit.unwrap_or(self.timeline.limit());
        Ok(self.timeline.fetch_with_limit(limit).await?)
    }

    // ---- files ----

    pub async fn rename(&self, path: &str, new_name: &str) -> SessionResult<Renamed> {
        let result = self.files.rename(path, new_name).await;
        self.report(result, |renamed| {
            (renamed.from != renamed.to).then(|| format!("Renamed to {}", renamed.to))
        })
    }

    pub async fn create(
        &self,
        parent: &str,
        name: &str,
        kind: EntryKind,
    ) -> SessionResult<Created> {
        let result = self.files.create(parent, name, kind).await;
        self.report(result, |created| Some(format!("Created {}", created.path)))
    }

    pub async fn release_delete(&self) -> SessionResult<DeleteRelease> {
        let result = self.files.release_delete().await;
        self.report(result, |release| match release {
            DeleteRelease::Deleted(path) => Some(format!("Deleted {path}")),
            _ => None,
        })
    }
}

fn applied_message(verb: &str, outcome: &IndexOutcome) -> Option<String> {
    match outcome {
        IndexOutcome::Applied { paths, .. } => Some(format!("{verb} {}", files(paths.len()))),
        IndexOutcome::Ignored => None,
    }
}

impl<A: ProjectApi> Drop for Workspace<A> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
