//! Commit, remote synchronisation and branch actions.

use std::future::Future;
use std::sync::Arc;

use canopy_api::ProjectApi;
use canopy_core::{ApiResult, BranchInfo, CheckoutResponse, CommitResponse, ProjectContext, SyncResponse};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{GitError, GitOp, GitResult};
use crate::status::StatusReconciler;

/// Mutating git commands that are not index edits.
///
/// Status polling is paused for the duration of each command, and remote
/// commands (fetch, push, pull) run one at a time.
pub struct GitActions<A> {
    api: Arc<A>,
    project: Arc<ProjectContext>,
    status: Arc<StatusReconciler<A>>,
    remote: Mutex<()>,
}

impl<A: ProjectApi> GitActions<A> {
    pub fn new(api: Arc<A>, project: Arc<ProjectContext>, status: Arc<StatusReconciler<A>>) -> Self {
        Self {
            api,
            project,
            status,
            remote: Mutex::new(()),
        }
    }

    /// Run `call` with polling paused, then refetch status.
    async fn mutate<T, F, Fut>(&self, op: GitOp, call: F) -> GitResult<T>
    where
        F: FnOnce(Arc<A>, String) -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let scope = self.project.scope();
        let result = {
            let _pause = self.status.pause();
            call(Arc::clone(&self.api), scope.name().to_string()).await
        };
        if !scope.is_current() {
            return Err(GitError::Superseded(op));
        }

        let value = result.map_err(|e| GitError::request(op, e))?;
        if let Err(err) = self.status.fetch_status().await {
            warn!(%op, error = %err, "Status refetch after git command failed");
        }
        Ok(value)
    }

    pub async fn commit(&self, message: &str) -> GitResult<CommitResponse> {
        let message = message.trim();
        if message.is_empty() {
            return Err(GitError::EmptyMessage);
        }
        let message = message.to_string();
        let response = self
            .mutate(GitOp::Commit, |api, project| async move {
                api.commit(&project, &message).await
            })
            .await?;
        info!(hash = %response.commit.hash, "Committed");
        Ok(response)
    }

    pub async fn fetch(&self) -> GitResult<SyncResponse> {
        let _remote = self.remote.try_lock().map_err(|_| GitError::Busy)?;
        self.mutate(GitOp::Fetch, |api, project| async move {
            api.fetch(&project).await
        })
        .await
    }

    /// Push local commits. Refused when the branch is not ahead.
    pub async fn push(&self) -> GitResult<SyncResponse> {
        if !self.status.current().can_push() {
            return Err(GitError::NothingToPush);
        }
        let _remote = self.remote.try_lock().map_err(|_| GitError::Busy)?;
        let response = self
            .mutate(GitOp::Push, |api, project| async move {
                api.push(&project).await
            })
            .await?;
        info!(tracking = ?response.tracking, "Pushed");
        Ok(response)
    }

    pub async fn pull(&self) -> GitResult<SyncResponse> {
        let _remote = self.remote.try_lock().map_err(|_| GitError::Busy)?;
        self.mutate(GitOp::Pull, |api, project| async move {
            api.pull(&project).await
        })
        .await
    }

    pub fn is_remote_busy(&self) -> bool {
        self.remote.try_lock().is_err()
    }

    pub async fn branches(&self) -> GitResult<Vec<BranchInfo>> {
        let scope = self.project.scope();
        let result = self.api.branches(scope.name()).await;
        if !scope.is_current() {
            return Err(GitError::Superseded(GitOp::Branches));
        }
        result.map_err(|e| GitError::request(GitOp::Branches, e))
    }

    pub async fn checkout(&self, branch: &str, create: bool) -> GitResult<CheckoutResponse> {
        let branch = branch.trim().to_string();
        let response = self
            .mutate(GitOp::Checkout, |api, project| async move {
                api.checkout(&project, &branch, create).await
            })
            .await?;
        info!(branch = %response.branch, "Checked out");
        Ok(response)
    }
}
