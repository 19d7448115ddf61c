//! Rename, delete and create against the server, with scoped tree refresh.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use canopy_api::ProjectApi;
use canopy_core::{
    EntryKind, PendingAction, ProjectContext, Release, SlideConfirm, join_path, normalize_path,
    parent_path,
};
use canopy_tree::TreeLoader;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{CrudError, CrudOp, CrudResult};
use crate::selection::Selection;
use crate::validate::validate_name;

/// A completed rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Renamed {
    pub from: String,
    pub to: String,
}

/// A completed create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Created {
    pub path: String,
    pub kind: EntryKind,
    /// Whether the new entry became the selection.
    pub selected: bool,
}

/// Result of releasing the delete slider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteRelease {
    Deleted(String),
    SnappedBack,
    Idle,
}

/// Runs file operations and refreshes only the parent folder each one
/// touched.
pub struct CrudOrchestrator<A> {
    api: Arc<A>,
    project: Arc<ProjectContext>,
    loader: Arc<TreeLoader<A>>,
    selection: Arc<Selection>,
    confirm: Mutex<SlideConfirm<String>>,
}

impl<A: ProjectApi> CrudOrchestrator<A> {
    pub fn new(
        api: Arc<A>,
        project: Arc<ProjectContext>,
        loader: Arc<TreeLoader<A>>,
        selection: Arc<Selection>,
        confirm_threshold: u8,
    ) -> Self {
        Self {
            api,
            project,
            loader,
            selection,
            confirm: Mutex::new(SlideConfirm::new(confirm_threshold)),
        }
    }

    pub fn selection(&self) -> &Arc<Selection> {
        &self.selection
    }

    fn confirm(&self) -> MutexGuard<'_, SlideConfirm<String>> {
        self.confirm.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-list `parent` after a successful operation. Failures are logged;
    /// the operation itself already succeeded.
    async fn refresh_parent(&self, op: CrudOp, parent: &str) {
        if let Err(err) = self.loader.refresh_folder(parent).await {
            warn!(%op, path = %parent, error = %err, "Refresh after file operation failed");
        }
    }

    /// Rename the entry at `path` to `new_name` within the same folder.
    pub async fn rename(&self, path: &str, new_name: &str) -> CrudResult<Renamed> {
        validate_name(new_name)?;
        let from = normalize_path(path);
        let parent = parent_path(&from).to_string();
        let to = join_path(&parent, new_name);
        if to == from {
            debug!(path = %from, "Rename to the same name, nothing to do");
            return Ok(Renamed { from, to });
        }

        let scope = self.project.scope();
        let result = self.api.rename(scope.name(), &from, new_name).await;
        if !scope.is_current() {
            return Err(CrudError::Superseded(CrudOp::Rename));
        }
        result.map_err(|e| CrudError::rejected(CrudOp::Rename, &from, e))?;
        info!(from = %from, to = %to, "Renamed");

        let cache = self.loader.cache();
        let was_expanded = cache.is_expanded(&from);
        cache.forget(&from);
        self.refresh_parent(CrudOp::Rename, &parent).await;
        if was_expanded {
            if let Err(err) = self.loader.expand_folder(&to).await {
                warn!(path = %to, error = %err, "Could not re-expand renamed folder");
            }
        }
        self.selection.follow_rename(&from, &to);
        Ok(Renamed { from, to })
    }

    /// Create a file or folder named `name` inside `parent` ("" is root).
    ///
    /// A collapsed parent is expanded afterwards, and a new file becomes the
    /// selection.
    pub async fn create(&self, parent: &str, name: &str, kind: EntryKind) -> CrudResult<Created> {
        validate_name(name)?;
        let parent = normalize_path(parent);
        let path = join_path(&parent, name);

        let scope = self.project.scope();
        let result = self.api.create(scope.name(), &path, kind).await;
        if !scope.is_current() {
            return Err(CrudError::Superseded(CrudOp::Create));
        }
        result.map_err(|e| CrudError::rejected(CrudOp::Create, &path, e))?;
        info!(path = %path, %kind, "Created");

        self.refresh_parent(CrudOp::Create, &parent).await;
        if !parent.is_empty() && !self.loader.cache().is_expanded(&parent) {
            if let Err(err) = self.loader.expand_folder(&parent).await {
                warn!(path = %parent, error = %err, "Could not expand parent of new entry");
            }
        }

        let selected = kind.is_file();
        if selected {
            self.selection.select(&path);
        }
        Ok(Created {
            path,
            kind,
            selected,
        })
    }

    /// Phase one of a delete: arm the slider for `path`.
    pub fn arm_delete(&self, path: &str) {
        self.confirm().arm(normalize_path(path));
    }

    pub fn drag_delete(&self, progress: u8) {
        self.confirm().drag(progress);
    }

    pub fn cancel_delete(&self) {
        self.confirm().cancel();
    }

    pub fn pending_delete(&self) -> Option<PendingAction<String>> {
        self.confirm().pending().cloned()
    }

    /// Release the delete slider. At or past the threshold the entry is
    /// deleted exactly once.
    pub async fn release_delete(&self) -> CrudResult<DeleteRelease> {
        let release = self.confirm().release();
        match release {
            Release::Fire(path) => self.delete(&path).await.map(DeleteRelease::Deleted),
            Release::SnappedBack => Ok(DeleteRelease::SnappedBack),
            Release::Idle => Ok(DeleteRelease::Idle),
        }
    }

    async fn delete(&self, path: &str) -> CrudResult<String> {
        let scope = self.project.scope();
        let result = self.api.delete(scope.name(), path).await;
        if !scope.is_current() {
            return Err(CrudError::Superseded(CrudOp::Delete));
        }
        result.map_err(|e| CrudError::rejected(CrudOp::Delete, path, e))?;
        info!(path = %path, "Deleted");

        self.loader.cache().forget(path);
        self.refresh_parent(CrudOp::Delete, parent_path(path)).await;
        self.selection.clear_within(path);
        Ok(path.to_string())
    }

    /// Drop any armed delete.
    pub fn reset(&self) {
        self.confirm().cancel();
    }
}
