//! Fingerprint-based change detection for the loaded tree.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use canopy_api::ProjectApi;
use canopy_core::{ChangeRecord, DirectoryEntry, Fingerprint, IgnoreList, ProjectContext};
use futures::future::join_all;
use indexmap::IndexMap;
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

use crate::cache::DirectoryCache;
use crate::error::{TreeError, TreeResult};

/// The current set of detected, unacknowledged changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Arc<[ChangeRecord]>,
}

impl ChangeSet {
    fn new(changes: Vec<ChangeRecord>) -> Self {
        Self {
            changes: changes.into(),
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// What a single poll tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick or an update was still running.
    Skipped,
    /// The project switched while the tick was in flight.
    Stale,
    /// Folders were compared; `changes` is the size of the published set.
    Checked { folders: usize, changes: usize },
}

/// What [`ChangeDetector::apply_update`] refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub refreshed: usize,
    pub dropped: usize,
}

/// Diff two listings of the same folder by path.
///
/// Entries only in `new` are added, entries only in `old` are removed, and
/// entries in both with a different modification time are modified.
pub fn diff_listings(old: &[DirectoryEntry], new: &[DirectoryEntry]) -> Vec<ChangeRecord> {
    let before: HashMap<&str, &DirectoryEntry> =
        old.iter().map(|e| (e.path.as_str(), e)).collect();
    let after: HashMap<&str, &DirectoryEntry> =
        new.iter().map(|e| (e.path.as_str(), e)).collect();

    let mut changes = Vec::new();
    for entry in new {
        match before.get(entry.path.as_str()) {
            None => changes.push(ChangeRecord::added(entry)),
            Some(prev) if prev.modified_at != entry.modified_at => {
                changes.push(ChangeRecord::modified(entry));
            }
            Some(_) => {}
        }
    }
    for entry in old {
        if !after.contains_key(entry.path.as_str()) {
            changes.push(ChangeRecord::removed(entry));
        }
    }
    changes
}

/// Polls root and every expanded folder, publishing a [`ChangeSet`].
///
/// Ticks and updates serialize on one async mutex. A tick that finds the
/// mutex held is skipped rather than queued.
pub struct ChangeDetector<A> {
    api: Arc<A>,
    cache: Arc<DirectoryCache>,
    project: Arc<ProjectContext>,
    ignore: RwLock<IgnoreList>,
    show_hidden: bool,
    busy: Mutex<()>,
    tx: watch::Sender<ChangeSet>,
}

impl<A: ProjectApi> ChangeDetector<A> {
    pub fn new(
        api: Arc<A>,
        cache: Arc<DirectoryCache>,
        project: Arc<ProjectContext>,
        ignore: IgnoreList,
        show_hidden: bool,
    ) -> Self {
        let (tx, _) = watch::channel(ChangeSet::default());
        Self {
            api,
            cache,
            project,
            ignore: RwLock::new(ignore),
            show_hidden,
            busy: Mutex::new(()),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ChangeSet> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ChangeSet {
        self.tx.borrow().clone()
    }

    pub fn has_changes(&self) -> bool {
        self.tx.borrow().has_changes()
    }

    pub fn set_ignore_list(&self, ignore: IgnoreList) {
        *self.ignore.write().unwrap_or_else(PoisonError::into_inner) = ignore;
    }

    pub fn ignore_list(&self) -> IgnoreList {
        self.ignore
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run one detection pass.
    ///
    /// Background failures are logged, never returned: a folder that stops
    /// listing reports all its known entries as removed.
    pub async fn poll_once(&self) -> TickOutcome {
        let Ok(_busy) = self.busy.try_lock() else {
            debug!("Change poll still running, skipping tick");
            return TickOutcome::Skipped;
        };

        let scope = self.project.scope();
        let watched = self.cache.watched();
        let fetches = watched.iter().map(|(path, _)| {
            self.api.list(scope.name(), path, self.show_hidden)
        });
        let results = join_all(fetches).await;
        if !scope.is_current() {
            return TickOutcome::Stale;
        }

        let mut merged: IndexMap<String, ChangeRecord> = IndexMap::new();
        for ((path, listing), result) in watched.iter().zip(results) {
            let records = match result {
                Ok(entries) if Fingerprint::of(&entries) == listing.fingerprint => continue,
                Ok(entries) => diff_listings(&listing.entries, &entries),
                Err(err) => {
                    warn!(path = %path, error = %err, "Change poll failed to list folder");
                    listing
                        .entries
                        .iter()
                        .map(ChangeRecord::removed)
                        .collect()
                }
            };
            for record in records {
                merged.insert(record.path.clone(), record);
            }
        }

        let ignore = self.ignore_list();
        let changes: Vec<ChangeRecord> = merged
            .into_values()
            .filter(|record| !ignore.matches(&record.path))
            .collect();
        let count = changes.len();

        let next = ChangeSet::new(changes);
        self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if count > 0 {
            debug!(project = %scope.name(), changes = count, "Detected changes");
        }

        TickOutcome::Checked {
            folders: watched.len(),
            changes: count,
        }
    }

    /// Refresh root and every expanded folder, then clear the change set,
    /// as one unit.
    ///
    /// Any non-404 failure leaves cache and change set untouched. A folder
    /// that answers 404 no longer exists and is dropped.
    pub async fn apply_update(&self) -> TreeResult<UpdateOutcome> {
        let _busy = self.busy.lock().await;

        let scope = self.project.scope();
        let paths: Vec<String> = std::iter::once(String::new())
            .chain(self.cache.expanded_paths())
            .collect();
        let fetches = paths
            .iter()
            .map(|path| self.api.list(scope.name(), path, self.show_hidden));
        let results = join_all(fetches).await;
        if !scope.is_current() {
            return Err(TreeError::superseded(""));
        }

        let mut updates = Vec::with_capacity(paths.len());
        let mut gone = Vec::new();
        for (path, result) in paths.into_iter().zip(results) {
            match result {
                Ok(entries) => updates.push((path, entries)),
                Err(err) if err.is_not_found() && !path.is_empty() => gone.push(path),
                Err(err) => return Err(TreeError::load(&path, err)),
            }
        }

        let outcome = UpdateOutcome {
            refreshed: updates.len(),
            dropped: gone.len(),
        };
        self.cache.apply_batch(updates, &gone);
        self.tx.send_replace(ChangeSet::default());
        debug!(
            project = %scope.name(),
            refreshed = outcome.refreshed,
            dropped = outcome.dropped,
            "Applied tree update"
        );
        Ok(outcome)
    }

    /// Drop the current change set without refreshing.
    pub fn clear(&self) {
        self.tx.send_replace(ChangeSet::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::ChangeType;
    use chrono::{DateTime, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_diff_classifies_by_path() {
        let old = vec![
            DirectoryEntry::file("keep.txt", 1, ts(1)),
            DirectoryEntry::file("edit.txt", 1, ts(1)),
            DirectoryEntry::file("gone.txt", 1, ts(1)),
        ];
        let new = vec![
            DirectoryEntry::file("edit.txt", 2, ts(2)),
            DirectoryEntry::file("keep.txt", 1, ts(1)),
            DirectoryEntry::file("new.txt", 1, ts(3)),
        ];

        let changes = diff_listings(&old, &new);
        let summary: Vec<_> = changes
            .iter()
            .map(|c| (c.path.as_str(), c.change_type))
            .collect();
        assert_eq!(
            summary,
            [
                ("edit.txt", ChangeType::Modified),
                ("new.txt", ChangeType::Added),
                ("gone.txt", ChangeType::Removed),
            ]
        );
    }

    #[test]
    fn test_diff_ignores_size_only_change() {
        let old = vec![DirectoryEntry::file("a.txt", 1, ts(1))];
        let new = vec![DirectoryEntry::file("a.txt", 9, ts(1))];
        assert!(diff_listings(&old, &new).is_empty());
    }

    #[test]
    fn test_change_set_accessors() {
        let set = ChangeSet::default();
        assert!(!set.has_changes());
        assert!(set.is_empty());
    }
}
