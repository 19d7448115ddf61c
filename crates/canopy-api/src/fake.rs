//! In-memory [`ProjectApi`] for tests.
//!
//! `FakeApi` keeps directory listings keyed by folder path and a small
//! index model (staged/modified/created/...), so the components that drive
//! it can be exercised end to end without a server. Every call is recorded,
//! failures can be injected per operation or per listed path, and an
//! optional latency makes in-flight windows observable under a paused
//! tokio clock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use canopy_core::{
    ApiError, ApiResult, BranchInfo, CheckoutResponse, CommitRecord, CommitRef, CommitResponse,
    DirectoryEntry, EntryKind, GitStatusSnapshot, LogResponse, SyncResponse, SyncSummary,
    join_path, normalize_path, parent_path,
};
use chrono::{DateTime, TimeDelta, Utc};

use crate::contract::ProjectApi;

/// One recorded call: operation name plus its primary argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeCall {
    pub op: &'static str,
    pub arg: String,
}

#[derive(Debug)]
struct FakeState {
    listings: HashMap<String, Vec<DirectoryEntry>>,
    status: GitStatusSnapshot,
    log: LogResponse,
    branches: Vec<BranchInfo>,
    ignore: Option<Vec<String>>,
    failures: HashMap<&'static str, ApiError>,
    list_failures: HashMap<String, ApiError>,
    calls: Vec<FakeCall>,
    latency: Duration,
    clock: DateTime<Utc>,
    commits: u32,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            listings: HashMap::from([(String::new(), Vec::new())]),
            status: GitStatusSnapshot {
                branch: "main".into(),
                is_clean: true,
                ..Default::default()
            },
            log: LogResponse::default(),
            branches: vec![BranchInfo {
                name: "main".into(),
                current: true,
                commit: String::new(),
                label: String::new(),
            }],
            ignore: None,
            failures: HashMap::new(),
            list_failures: HashMap::new(),
            calls: Vec::new(),
            latency: Duration::ZERO,
            clock: DateTime::<Utc>::default(),
            commits: 0,
        }
    }
}

impl FakeState {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += TimeDelta::seconds(1);
        self.clock
    }

    fn refresh_clean(&mut self) {
        let s = &mut self.status;
        s.is_clean = s.staged.is_empty()
            && s.modified.is_empty()
            && s.deleted.is_empty()
            && s.created.is_empty()
            && s.untracked.is_empty()
            && s.renamed.is_empty()
            && s.conflicted.is_empty();
    }

    fn find_entry(&self, path: &str) -> Option<&DirectoryEntry> {
        self.listings
            .get(parent_path(path))
            .and_then(|entries| entries.iter().find(|e| e.path == path))
    }
}

fn push_unique(list: &mut Vec<String>, path: &str) {
    if !list.iter().any(|p| p == path) {
        list.push(path.to_string());
    }
}

fn remove(list: &mut Vec<String>, path: &str) -> bool {
    let before = list.len();
    list.retain(|p| p != path);
    list.len() != before
}

/// Scriptable in-memory project server.
#[derive(Debug, Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, wait out the latency, then fail if scripted to.
    async fn enter(&self, op: &'static str, arg: impl Into<String>) -> ApiResult<()> {
        let latency = {
            let mut state = self.lock();
            state.calls.push(FakeCall {
                op,
                arg: arg.into(),
            });
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match self.lock().failures.get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    // ---- scripting ----

    /// Replace the listing of `path` ("" is root). Entry paths are taken
    /// as given.
    pub fn set_listing(&self, path: &str, entries: Vec<DirectoryEntry>) {
        self.lock().listings.insert(normalize_path(path), entries);
    }

    pub fn remove_listing(&self, path: &str) {
        self.lock().listings.remove(&normalize_path(path));
    }

    /// Add a file to its parent's listing, creating the listing if needed.
    pub fn add_file(&self, path: &str, size: u64) {
        let mut state = self.lock();
        let now = state.tick();
        let entry = DirectoryEntry::file(path, size, now);
        let parent = entry.parent().to_string();
        let listing = state.listings.entry(parent).or_default();
        listing.retain(|e| e.path != entry.path);
        listing.push(entry);
    }

    /// Add a folder with an empty listing of its own.
    pub fn add_folder(&self, path: &str) {
        let mut state = self.lock();
        let now = state.tick();
        let entry = DirectoryEntry::folder(path, now);
        let parent = entry.parent().to_string();
        state.listings.entry(entry.path.clone()).or_default();
        let listing = state.listings.entry(parent).or_default();
        listing.retain(|e| e.path != entry.path);
        listing.push(entry);
    }

    /// Bump the modification time of an existing entry.
    pub fn touch(&self, path: &str) {
        let mut state = self.lock();
        let now = state.tick();
        if let Some(listing) = state.listings.get_mut(parent_path(path)) {
            for entry in listing.iter_mut().filter(|e| e.path == path) {
                entry.modified_at = now;
            }
        }
    }

    pub fn set_status(&self, status: GitStatusSnapshot) {
        self.lock().status = status;
    }

    pub fn status_snapshot(&self) -> GitStatusSnapshot {
        self.lock().status.clone()
    }

    pub fn set_log(&self, log: LogResponse) {
        self.lock().log = log;
    }

    pub fn set_branches(&self, branches: Vec<BranchInfo>) {
        self.lock().branches = branches;
    }

    pub fn set_ignore_list(&self, names: Vec<String>) {
        self.lock().ignore = Some(names);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Make every call to `op` fail with `err` until cleared.
    pub fn fail(&self, op: &'static str, err: ApiError) {
        self.lock().failures.insert(op, err);
    }

    pub fn clear_failure(&self, op: &'static str) {
        self.lock().failures.remove(op);
    }

    /// Make listing `path` fail with `err` until cleared.
    pub fn fail_list(&self, path: &str, err: ApiError) {
        self.lock().list_failures.insert(normalize_path(path), err);
    }

    pub fn clear_list_failure(&self, path: &str) {
        self.lock().list_failures.remove(&normalize_path(path));
    }

    // ---- inspection ----

    pub fn calls(&self) -> Vec<FakeCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.op == op).count()
    }

    pub fn list_calls(&self, path: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.op == "list" && c.arg == path)
            .count()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn listing(&self, path: &str) -> Option<Vec<DirectoryEntry>> {
        self.lock().listings.get(&normalize_path(path)).cloned()
    }
}

impl ProjectApi for FakeApi {
    async fn list(
        &self,
        _project: &str,
        path: &str,
        show_hidden: bool,
    ) -> ApiResult<Vec<DirectoryEntry>> {
        self.enter("list", path).await?;
        let state = self.lock();
        if let Some(err) = state.list_failures.get(path) {
            return Err(err.clone());
        }
        let entries = state
            .listings
            .get(path)
            .ok_or_else(|| ApiError::status(404, format!("Directory not found: {path}")))?;
        Ok(entries
            .iter()
            .filter(|e| show_hidden || !e.name.starts_with('.'))
            .cloned()
            .collect())
    }

    async fn status(&self, _project: &str) -> ApiResult<GitStatusSnapshot> {
        self.enter("status", "").await?;
        Ok(self.lock().status.clone())
    }

    async fn stage(&self, _project: &str, paths: &[String]) -> ApiResult<()> {
        self.enter("stage", paths.join(",")).await?;
        let mut state = self.lock();
        if let Some(path) = paths.iter().find(|p| state.status.is_conflicted(p)) {
            return Err(ApiError::status(409, format!("Cannot stage conflicted file {path}")));
        }
        let s = &mut state.status;
        for path in paths {
            remove(&mut s.modified, path);
            if remove(&mut s.untracked, path) {
                push_unique(&mut s.created, path);
            }
            push_unique(&mut s.staged, path);
        }
        state.refresh_clean();
        Ok(())
    }

    async fn unstage(&self, _project: &str, paths: &[String]) -> ApiResult<()> {
        self.enter("unstage", paths.join(",")).await?;
        let mut state = self.lock();
        let s = &mut state.status;
        for path in paths {
            if !remove(&mut s.staged, path) {
                continue;
            }
            if remove(&mut s.created, path) {
                push_unique(&mut s.untracked, path);
            } else if !s.deleted.contains(path) {
                push_unique(&mut s.modified, path);
            }
        }
        state.refresh_clean();
        Ok(())
    }

    async fn discard(&self, _project: &str, paths: &[String]) -> ApiResult<()> {
        self.enter("discard", paths.join(",")).await?;
        let mut state = self.lock();
        let s = &mut state.status;
        for path in paths {
            remove(&mut s.modified, path);
            remove(&mut s.untracked, path);
            if !s.is_staged(path) {
                remove(&mut s.deleted, path);
                remove(&mut s.created, path);
            }
        }
        state.refresh_clean();
        Ok(())
    }

    async fn commit(&self, _project: &str, message: &str) -> ApiResult<CommitResponse> {
        self.enter("commit", message).await?;
        let mut state = self.lock();
        if state.status.staged.is_empty() {
            return Err(ApiError::status(400, "Nothing to commit"));
        }
        let staged = std::mem::take(&mut state.status.staged);
        state
            .status
            .created
            .retain(|p| !staged.contains(p));
        state
            .status
            .deleted
            .retain(|p| !staged.contains(p));
        state.status.ahead += 1;
        state.commits += 1;
        let hash = format!("{:040x}", state.commits);
        let date = state.tick().to_rfc3339();

        for commit in state.log.commits.iter_mut() {
            commit.is_head = false;
        }
        let record = CommitRecord {
            hash_short: hash[hash.len() - 7..].to_string(),
            hash: hash.clone(),
            date,
            message: message.to_string(),
            author: "fake".into(),
            is_head: true,
            is_pushed: false,
            is_remote_head: false,
        };
        state.log.commits.insert(0, record);
        state.log.unpushed_count += 1;
        state.refresh_clean();
        Ok(CommitResponse {
            commit: CommitRef { hash },
        })
    }

    async fn fetch(&self, _project: &str) -> ApiResult<SyncResponse> {
        self.enter("fetch", "").await?;
        let state = self.lock();
        Ok(SyncResponse {
            ahead: Some(state.status.ahead),
            behind: Some(state.status.behind),
            tracking: Some(format!("origin/{}", state.status.branch)),
            summary: None,
        })
    }

    async fn push(&self, _project: &str) -> ApiResult<SyncResponse> {
        self.enter("push", "").await?;
        let mut state = self.lock();
        state.status.ahead = 0;
        state.log.unpushed_count = 0;
        for (i, commit) in state.log.commits.iter_mut().enumerate() {
            commit.is_pushed = true;
            commit.is_remote_head = i == 0;
        }
        Ok(SyncResponse {
            ahead: Some(0),
            behind: Some(state.status.behind),
            tracking: Some(format!("origin/{}", state.status.branch)),
            summary: None,
        })
    }

    async fn pull(&self, _project: &str) -> ApiResult<SyncResponse> {
        self.enter("pull", "").await?;
        let mut state = self.lock();
        let changes = std::mem::take(&mut state.status.behind);
        Ok(SyncResponse {
            summary: Some(SyncSummary { changes }),
            ..Default::default()
        })
    }

    async fn log(&self, _project: &str, limit: usize) -> ApiResult<LogResponse> {
        self.enter("log", limit.to_string()).await?;
        let mut log = self.lock().log.clone();
        log.commits.truncate(limit);
        Ok(log)
    }

    async fn branches(&self, _project: &str) -> ApiResult<Vec<BranchInfo>> {
        self.enter("branches", "").await?;
        Ok(self.lock().branches.clone())
    }

    async fn checkout(
        &self,
        _project: &str,
        branch: &str,
        create: bool,
    ) -> ApiResult<CheckoutResponse> {
        self.enter("checkout", branch).await?;
        let mut state = self.lock();
        let exists = state.branches.iter().any(|b| b.name == branch);
        match (exists, create) {
            (true, true) => {
                return Err(ApiError::status(409, format!("Branch '{branch}' already exists")));
            }
            (false, false) => {
                return Err(ApiError::status(404, format!("Branch '{branch}' not found")));
            }
            (false, true) => state.branches.push(BranchInfo {
                name: branch.to_string(),
                current: false,
                commit: String::new(),
                label: String::new(),
            }),
            (true, false) => {}
        }
        for b in state.branches.iter_mut() {
            b.current = b.name == branch;
        }
        state.status.branch = branch.to_string();
        Ok(CheckoutResponse {
            branch: branch.to_string(),
        })
    }

    async fn rename(&self, _project: &str, path: &str, new_name: &str) -> ApiResult<()> {
        self.enter("rename", path).await?;
        let mut state = self.lock();
        let entry = state
            .find_entry(path)
            .cloned()
            .ok_or_else(|| ApiError::status(404, format!("File not found: {path}")))?;
        let parent = entry.parent().to_string();
        let new_path = join_path(&parent, new_name);
        if state.find_entry(&new_path).is_some() {
            return Err(ApiError::status(409, format!("'{new_name}' already exists")));
        }

        let now = state.tick();
        let renamed = match entry.kind {
            EntryKind::File => DirectoryEntry::file(new_path.as_str(), entry.size, now),
            EntryKind::Folder => DirectoryEntry::folder(new_path.as_str(), now),
        };
        if let Some(listing) = state.listings.get_mut(&parent) {
            listing.retain(|e| e.path != path);
            listing.push(renamed);
        }

        if entry.is_folder() {
            let prefix = format!("{path}/");
            let moved: Vec<String> = state
                .listings
                .keys()
                .filter(|k| *k == path || k.starts_with(&prefix))
                .cloned()
                .collect();
            for key in moved {
                if let Some(entries) = state.listings.remove(&key) {
                    let new_key = format!("{new_path}{}", &key[path.len()..]);
                    let entries = entries
                        .into_iter()
                        .map(|mut e| {
                            e.path = format!("{new_path}{}", &e.path[path.len()..]);
                            e
                        })
                        .collect();
                    state.listings.insert(new_key, entries);
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, _project: &str, path: &str) -> ApiResult<()> {
        self.enter("delete", path).await?;
        let mut state = self.lock();
        if state.find_entry(path).is_none() {
            return Err(ApiError::status(404, format!("File not found: {path}")));
        }
        if let Some(listing) = state.listings.get_mut(parent_path(path)) {
            listing.retain(|e| e.path != path);
        }
        let prefix = format!("{path}/");
        state
            .listings
            .retain(|k, _| k != path && !k.starts_with(&prefix));
        Ok(())
    }

    async fn create(&self, _project: &str, path: &str, kind: EntryKind) -> ApiResult<()> {
        self.enter("create", path).await?;
        let mut state = self.lock();
        let parent = parent_path(path).to_string();
        if !state.listings.contains_key(&parent) {
            return Err(ApiError::status(404, format!("Directory not found: {parent}")));
        }
        if state.find_entry(path).is_some() {
            return Err(ApiError::status(409, format!("'{path}' already exists")));
        }
        let now = state.tick();
        let entry = match kind {
            EntryKind::File => DirectoryEntry::file(path, 0, now),
            EntryKind::Folder => {
                state.listings.insert(path.to_string(), Vec::new());
                DirectoryEntry::folder(path, now)
            }
        };
        if let Some(listing) = state.listings.get_mut(&parent) {
            listing.push(entry);
        }
        if kind.is_file() {
            push_unique(&mut state.status.untracked, path);
            state.refresh_clean();
        }
        Ok(())
    }

    async fn ignore_list(&self) -> ApiResult<Vec<String>> {
        self.enter("ignore_list", "").await?;
        self.lock()
            .ignore
            .clone()
            .ok_or_else(|| ApiError::status(404, "Not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_list_root_and_missing() {
        let api = FakeApi::new();
        api.add_file("a.txt", 3);
        api.add_file(".env", 1);

        assert_eq!(api.list("p", "", false).await.unwrap().len(), 1);
        assert_eq!(api.list("p", "", true).await.unwrap().len(), 2);

        let err = api.list("p", "missing", false).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(api.list_calls(""), 2);
    }

    #[tokio::test]
    async fn test_stage_then_unstage_untracked() {
        let api = FakeApi::new();
        api.set_status(GitStatusSnapshot {
            untracked: paths(&["a.txt"]),
            ..Default::default()
        });

        api.stage("p", &paths(&["a.txt"])).await.unwrap();
        let s = api.status_snapshot();
        assert_eq!(s.staged, ["a.txt"]);
        assert_eq!(s.created, ["a.txt"]);
        assert!(s.untracked.is_empty());

        api.unstage("p", &paths(&["a.txt"])).await.unwrap();
        let s = api.status_snapshot();
        assert!(s.staged.is_empty());
        assert_eq!(s.untracked, ["a.txt"]);
    }

    #[tokio::test]
    async fn test_commit_and_push_move_ahead() {
        let api = FakeApi::new();
        api.set_status(GitStatusSnapshot {
            modified: paths(&["a.txt"]),
            ..Default::default()
        });
        api.stage("p", &paths(&["a.txt"])).await.unwrap();
        api.commit("p", "first").await.unwrap();
        assert_eq!(api.status_snapshot().ahead, 1);
        assert!(api.status_snapshot().is_clean);

        let log = api.log("p", 10).await.unwrap();
        assert!(log.commits[0].is_head && !log.commits[0].is_pushed);

        api.push("p").await.unwrap();
        assert_eq!(api.status_snapshot().ahead, 0);
    }

    #[tokio::test]
    async fn test_rename_collision_is_409() {
        let api = FakeApi::new();
        api.add_file("old.ts", 1);
        api.add_file("new.ts", 1);
        let err = api.rename("p", "old.ts", "new.ts").await.unwrap_err();
        assert_eq!(err.status_code(), Some(409));
    }

    #[tokio::test]
    async fn test_rename_folder_moves_listing() {
        let api = FakeApi::new();
        api.add_folder("src");
        api.add_file("src/main.rs", 1);
        api.rename("p", "src", "lib").await.unwrap();

        let moved = api.listing("lib").unwrap();
        assert_eq!(moved[0].path, "lib/main.rs");
        assert!(api.listing("src").is_none());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let api = FakeApi::new();
        api.fail("push", ApiError::status(500, "remote hung up"));
        assert!(api.push("p").await.is_err());
        api.clear_failure("push");
        assert!(api.push("p").await.is_ok());
        assert_eq!(api.count("push"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_result() {
        let api = FakeApi::new();
        api.set_latency(Duration::from_millis(500));
        let start = tokio::time::Instant::now();
        api.status("p").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}
