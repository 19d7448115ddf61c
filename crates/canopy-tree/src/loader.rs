//! Lazy directory loading on top of [`DirectoryCache`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use canopy_api::ProjectApi;
use canopy_core::{ApiResult, DirectoryEntry, ProjectContext, ProjectScope, normalize_path};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use crate::cache::{DirectoryCache, VisibleRow};
use crate::error::{TreeError, TreeResult};

type PendingFetch = Shared<BoxFuture<'static, ApiResult<Arc<Vec<DirectoryEntry>>>>>;

/// Result of [`TreeLoader::toggle_folder`]: the expansion state the folder
/// ended up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Expanded,
    Collapsed,
}

/// Loads folder listings on demand and keeps them in the shared cache.
///
/// Expand and preload of the same path share a single in-flight request.
pub struct TreeLoader<A> {
    api: Arc<A>,
    cache: Arc<DirectoryCache>,
    project: Arc<ProjectContext>,
    show_hidden: bool,
    pending: Mutex<HashMap<String, (u64, PendingFetch)>>,
    next_fetch: AtomicU64,
}

impl<A: ProjectApi> TreeLoader<A> {
    pub fn new(
        api: Arc<A>,
        cache: Arc<DirectoryCache>,
        project: Arc<ProjectContext>,
        show_hidden: bool,
    ) -> Self {
        Self {
            api,
            cache,
            project,
            show_hidden,
            pending: Mutex::new(HashMap::new()),
            next_fetch: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &Arc<DirectoryCache> {
        &self.cache
    }

    /// Fixed at construction; the change detector lists with the same
    /// flag so both fingerprint the same entries.
    pub fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, (u64, PendingFetch)>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the in-flight request for `path`, or start one.
    fn shared_fetch(&self, scope: &ProjectScope, path: &str) -> (u64, PendingFetch) {
        let mut pending = self.pending();
        if let Some((id, fetch)) = pending.get(path) {
            return (*id, fetch.clone());
        }

        let id = self.next_fetch.fetch_add(1, Ordering::Relaxed);
        let api = Arc::clone(&self.api);
        let project = scope.name().to_string();
        let owned = path.to_string();
        let show_hidden = self.show_hidden();
        let fetch = async move {
            api.list(&project, &owned, show_hidden)
                .await
                .map(Arc::new)
        }
        .boxed()
        .shared();

        pending.insert(path.to_string(), (id, fetch.clone()));
        (id, fetch)
    }

    async fn fetch(&self, scope: &ProjectScope, path: &str) -> ApiResult<Arc<Vec<DirectoryEntry>>> {
        let (id, fetch) = self.shared_fetch(scope, path);
        let result = fetch.await;

        let mut pending = self.pending();
        if pending.get(path).is_some_and(|(current, _)| *current == id) {
            pending.remove(path);
        }
        result
    }

    /// Fetch the project root and replace its cached listing.
    pub async fn load_root(&self) -> TreeResult<Arc<[DirectoryEntry]>> {
        let scope = self.project.scope();
        let result = self.fetch(&scope, "").await;
        if !scope.is_current() {
            return Err(TreeError::superseded(""));
        }

        let entries = result.map_err(|e| TreeError::load("", e))?;
        let entries = self.cache.insert("", Arc::unwrap_or_clone(entries));
        debug!(project = %scope.name(), entries = entries.len(), "Loaded root");
        Ok(entries)
    }

    /// Collapse an expanded folder, or expand a collapsed one, fetching its
    /// listing if it is not cached.
    ///
    /// A failed fetch reverts the expansion flag and returns the error.
    pub async fn toggle_folder(&self, path: &str) -> TreeResult<Toggle> {
        let path = normalize_path(path);
        if self.cache.set_expanded(&path, false) {
            return Ok(Toggle::Collapsed);
        }

        self.cache.set_expanded(&path, true);
        if self.cache.is_cached(&path) {
            return Ok(Toggle::Expanded);
        }

        let scope = self.project.scope();
        self.cache.begin_loading(&path);
        let result = self.fetch(&scope, &path).await;
        if !scope.is_current() {
            return Err(TreeError::superseded(&path));
        }

        let outcome = match result {
            Ok(entries) => {
                self.cache.insert(&path, Arc::unwrap_or_clone(entries));
                Ok(if self.cache.is_expanded(&path) {
                    Toggle::Expanded
                } else {
                    Toggle::Collapsed
                })
            }
            Err(err) => {
                self.cache.set_expanded(&path, false);
                warn!(path = %path, error = %err, "Failed to expand folder");
                Err(TreeError::load(&path, err))
            }
        };
        self.cache.end_loading(&path);
        outcome
    }

    /// Expand `path` if it is collapsed. No-op when already expanded.
    pub async fn expand_folder(&self, path: &str) -> TreeResult<()> {
        if self.cache.is_expanded(&normalize_path(path)) {
            return Ok(());
        }
        self.toggle_folder(path).await.map(|_| ())
    }

    /// Best-effort background fetch. Returns `true` if a listing was
    /// cached. Failures are dropped and expansion state is never touched.
    pub async fn preload_folder(&self, path: &str) -> bool {
        let path = normalize_path(path);
        if self.cache.is_cached(&path)
            || self.cache.is_loading(&path)
            || !self.cache.begin_preloading(&path)
        {
            debug!(path = %path, "Preload skipped");
            return false;
        }

        let scope = self.project.scope();
        let result = self.fetch(&scope, &path).await;
        if !scope.is_current() {
            return false;
        }

        let cached = match result {
            Ok(entries) => {
                self.cache.insert(&path, Arc::unwrap_or_clone(entries));
                true
            }
            Err(err) => {
                debug!(path = %path, error = %err, "Preload dropped");
                false
            }
        };
        self.cache.end_preloading(&path);
        cached
    }

    /// Re-fetch one folder and replace its listing. A folder that no longer
    /// exists is dropped from the cache and `None` is returned.
    pub async fn refresh_folder(&self, path: &str) -> TreeResult<Option<Arc<[DirectoryEntry]>>> {
        let path = normalize_path(path);
        let scope = self.project.scope();
        let result = self
            .api
            .list(scope.name(), &path, self.show_hidden())
            .await;
        if !scope.is_current() {
            return Err(TreeError::superseded(&path));
        }

        match result {
            Ok(entries) => Ok(Some(self.cache.insert(&path, entries))),
            Err(err) if err.is_not_found() && !path.is_empty() => {
                debug!(path = %path, "Folder vanished, dropping from cache");
                self.cache.forget(&path);
                Ok(None)
            }
            Err(err) => Err(TreeError::load(&path, err)),
        }
    }

    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        self.cache.visible_rows()
    }

    /// Forget every listing and in-flight request.
    pub fn reset(&self) {
        self.pending().clear();
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use canopy_api::FakeApi;
    use canopy_core::ApiError;

    use super::*;

    fn loader(api: &Arc<FakeApi>) -> TreeLoader<FakeApi> {
        TreeLoader::new(
            Arc::clone(api),
            Arc::new(DirectoryCache::new()),
            Arc::new(ProjectContext::new("demo")),
            false,
        )
    }

    fn seeded() -> Arc<FakeApi> {
        let api = Arc::new(FakeApi::new());
        api.add_folder("src");
        api.add_file("src/main.rs", 10);
        api.add_file("README.md", 5);
        api
    }

    #[tokio::test]
    async fn test_load_root_does_not_touch_children() {
        let api = seeded();
        let loader = loader(&api);
        let root = loader.load_root().await.unwrap();
        assert_eq!(root.len(), 2);
        assert_eq!(api.count("list"), 1);
        assert!(!loader.cache().is_cached("src"));
    }

    #[tokio::test]
    async fn test_toggle_failure_reverts_expansion() {
        let api = seeded();
        api.fail_list("src", ApiError::status(500, "boom"));
        let loader = loader(&api);
        loader.load_root().await.unwrap();

        let err = loader.toggle_folder("src").await.unwrap_err();
        assert!(matches!(err, TreeError::Load { .. }));
        assert!(!loader.cache().is_expanded("src"));
        assert!(!loader.cache().is_loading("src"));
    }

    #[tokio::test]
    async fn test_preload_failure_is_silent() {
        let api = seeded();
        api.fail_list("src", ApiError::network("offline"));
        let loader = loader(&api);

        assert!(!loader.preload_folder("src").await);
        assert!(!loader.cache().is_expanded("src"));
        assert!(!loader.cache().is_preloading("src"));
    }

    #[tokio::test]
    async fn test_preload_skips_cached() {
        let api = seeded();
        let loader = loader(&api);
        assert!(loader.preload_folder("src").await);
        assert!(!loader.preload_folder("src").await);
        assert_eq!(api.list_calls("src"), 1);
        assert!(!loader.cache().is_expanded("src"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expand_and_preload_share_one_request() {
        let api = seeded();
        api.set_latency(Duration::from_millis(100));
        let loader = loader(&api);

        let (preloaded, toggled) =
            tokio::join!(loader.preload_folder("src"), loader.toggle_folder("src"));
        assert!(preloaded);
        assert_eq!(toggled.unwrap(), Toggle::Expanded);
        assert_eq!(api.list_calls("src"), 1);
        assert!(loader.cache().is_cached("src"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_collapse_during_load_keeps_result() {
        let api = seeded();
        api.set_latency(Duration::from_millis(100));
        let loader = loader(&api);

        let expand = loader.toggle_folder("src");
        let collapse = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            loader.toggle_folder("src").await
        };
        let (expanded, collapsed) = tokio::join!(expand, collapse);

        assert_eq!(collapsed.unwrap(), Toggle::Collapsed);
        assert_eq!(expanded.unwrap(), Toggle::Collapsed);
        assert!(loader.cache().is_cached("src"));
        assert!(!loader.cache().is_expanded("src"));
    }

    #[tokio::test]
    async fn test_refresh_missing_folder_forgets_it() {
        let api = seeded();
        let loader = loader(&api);
        loader.toggle_folder("src").await.unwrap();
        api.remove_listing("src");

        assert!(loader.refresh_folder("src").await.unwrap().is_none());
        assert!(!loader.cache().is_cached("src"));
        assert!(!loader.cache().is_expanded("src"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_after_switch_is_discarded() {
        let api = seeded();
        let project = Arc::new(ProjectContext::new("demo"));
        let loader = TreeLoader::new(
            Arc::clone(&api),
            Arc::new(DirectoryCache::new()),
            Arc::clone(&project),
            false,
        );
        api.set_latency(Duration::from_millis(5));

        let switch = async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            project.switch("other");
        };
        let (result, ()) = tokio::join!(loader.load_root(), switch);
        assert!(result.unwrap_err().is_superseded());
        assert!(!loader.cache().is_cached(""));
    }
}
