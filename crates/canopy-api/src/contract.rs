//! The project server contract.

use std::future::Future;

use canopy_core::{
    ApiResult, BranchInfo, CheckoutResponse, CommitResponse, DirectoryEntry, EntryKind,
    GitStatusSnapshot, LogResponse, SyncResponse,
};

/// Operations a project server exposes. Paths are project-relative and use
/// forward slashes.
///
/// Every future is `Send` so components can drive calls from spawned tasks.
pub trait ProjectApi: Send + Sync + 'static {
    /// List one directory ("" is the project root).
    fn list(
        &self,
        project: &str,
        path: &str,
        show_hidden: bool,
    ) -> impl Future<Output = ApiResult<Vec<DirectoryEntry>>> + Send;

    /// Read the working-tree status.
    fn status(&self, project: &str) -> impl Future<Output = ApiResult<GitStatusSnapshot>> + Send;

    /// Add paths to the index.
    fn stage(&self, project: &str, paths: &[String]) -> impl Future<Output = ApiResult<()>> + Send;

    /// Remove paths from the index.
    fn unstage(
        &self,
        project: &str,
        paths: &[String],
    ) -> impl Future<Output = ApiResult<()>> + Send;

    /// Throw away working-tree changes for paths.
    fn discard(
        &self,
        project: &str,
        paths: &[String],
    ) -> impl Future<Output = ApiResult<()>> + Send;

    fn commit(
        &self,
        project: &str,
        message: &str,
    ) -> impl Future<Output = ApiResult<CommitResponse>> + Send;

    fn fetch(&self, project: &str) -> impl Future<Output = ApiResult<SyncResponse>> + Send;

    fn push(&self, project: &str) -> impl Future<Output = ApiResult<SyncResponse>> + Send;

    fn pull(&self, project: &str) -> impl Future<Output = ApiResult<SyncResponse>> + Send;

    /// Newest-first commit log.
    fn log(&self, project: &str, limit: usize)
    -> impl Future<Output = ApiResult<LogResponse>> + Send;

    fn branches(&self, project: &str) -> impl Future<Output = ApiResult<Vec<BranchInfo>>> + Send;

    fn checkout(
        &self,
        project: &str,
        branch: &str,
        create: bool,
    ) -> impl Future<Output = ApiResult<CheckoutResponse>> + Send;

    /// Rename the entry at `path` to `new_name` within the same parent.
    fn rename(
        &self,
        project: &str,
        path: &str,
        new_name: &str,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    fn delete(&self, project: &str, path: &str) -> impl Future<Output = ApiResult<()>> + Send;

    fn create(
        &self,
        project: &str,
        path: &str,
        kind: EntryKind,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    /// Server-supplied directory names to ignore in change detection.
    fn ignore_list(&self) -> impl Future<Output = ApiResult<Vec<String>>> + Send;
}
