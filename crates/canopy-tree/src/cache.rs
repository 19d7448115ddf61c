//! Per-path cache of directory listings and expansion state.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use canopy_core::{DirectoryEntry, Fingerprint, display_order};
use dashmap::DashSet;

/// One cached folder: its entries in display order plus the fingerprint
/// of the listing they came from.
#[derive(Debug, Clone)]
pub struct Listing {
    pub entries: Arc<[DirectoryEntry]>,
    pub fingerprint: Fingerprint,
}

impl Listing {
    pub fn new(mut entries: Vec<DirectoryEntry>) -> Self {
        let fingerprint = Fingerprint::of(&entries);
        entries.sort_by(display_order);
        Self {
            entries: entries.into(),
            fingerprint,
        }
    }
}

/// A row of the flattened tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow {
    pub entry: DirectoryEntry,
    pub depth: usize,
    pub expanded: bool,
}

#[derive(Debug, Default)]
struct CacheState {
    listings: HashMap<String, Listing>,
    expanded: BTreeSet<String>,
}

impl CacheState {
    fn forget(&mut self, path: &str) {
        let prefix = format!("{path}/");
        self.listings
            .retain(|key, _| key != path && !key.starts_with(&prefix));
        self.expanded
            .retain(|key| key != path && !key.starts_with(&prefix));
    }
}

/// Directory listings keyed by folder path ("" is the project root).
///
/// Listings and the expanded set live behind one lock so a batch refresh
/// lands as a single write. The loading/preloading sets are concurrent
/// sets touched from independent tasks.
#[derive(Debug, Default)]
pub struct DirectoryCache {
    state: RwLock<CacheState>,
    loading: DashSet<String>,
    preloading: DashSet<String>,
}

impl DirectoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn entries(&self, path: &str) -> Option<Arc<[DirectoryEntry]>> {
        self.read()
            .listings
            .get(path)
            .map(|l| Arc::clone(&l.entries))
    }

    pub fn listing(&self, path: &str) -> Option<Listing> {
        self.read().listings.get(path).cloned()
    }

    pub fn fingerprint(&self, path: &str) -> Option<Fingerprint> {
        self.read().listings.get(path).map(|l| l.fingerprint)
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.read().listings.contains_key(path)
    }

    /// Replace the listing for `path` wholesale.
    pub fn insert(&self, path: &str, entries: Vec<DirectoryEntry>) -> Arc<[DirectoryEntry]> {
        let listing = Listing::new(entries);
        let shared = Arc::clone(&listing.entries);
        self.write().listings.insert(path.to_string(), listing);
        shared
    }

    /// Drop `path` and everything below it from the cache and the expanded
    /// set.
    pub fn forget(&self, path: &str) {
        self.write().forget(path);
    }

    /// Replace several listings and drop vanished folders in one write.
    pub fn apply_batch(
        &self,
        updates: Vec<(String, Vec<DirectoryEntry>)>,
        gone: &[String],
    ) {
        let listings: Vec<_> = updates
            .into_iter()
            .map(|(path, entries)| (path, Listing::new(entries)))
            .collect();

        let mut state = self.write();
        for path in gone {
            state.forget(path);
        }
        for (path, listing) in listings {
            state.listings.insert(path, listing);
        }
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.read().expanded.contains(path)
    }

    /// Set the expansion flag, returning the previous value.
    pub fn set_expanded(&self, path: &str, expanded: bool) -> bool {
        let mut state = self.write();
        if expanded {
            !state.expanded.insert(path.to_string())
        } else {
            state.expanded.remove(path)
        }
    }

    /// Expanded folder paths in sorted order.
    pub fn expanded_paths(&self) -> Vec<String> {
        self.read().expanded.iter().cloned().collect()
    }

    /// Root plus every expanded folder that has a fingerprint, with the
    /// listing each one was last seen with.
    pub fn watched(&self) -> Vec<(String, Listing)> {
        let state = self.read();
        std::iter::once("")
            .chain(state.expanded.iter().map(String::as_str))
            .filter_map(|path| {
                state
                    .listings
                    .get(path)
                    .map(|listing| (path.to_string(), listing.clone()))
            })
            .collect()
    }

    pub fn is_loading(&self, path: &str) -> bool {
        self.loading.contains(path)
    }

    pub fn is_preloading(&self, path: &str) -> bool {
        self.preloading.contains(path)
    }

    /// Mark `path` as loading. Returns `false` if it already was.
    pub(crate) fn begin_loading(&self, path: &str) -> bool {
        self.loading.insert(path.to_string())
    }

    pub(crate) fn end_loading(&self, path: &str) {
        self.loading.remove(path);
    }

    pub(crate) fn begin_preloading(&self, path: &str) -> bool {
        self.preloading.insert(path.to_string())
    }

    pub(crate) fn end_preloading(&self, path: &str) {
        self.preloading.remove(path);
    }

    /// Depth-first flattening of root and every expanded, cached folder.
    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        let state = self.read();
        let mut rows = Vec::new();
        let mut stack: Vec<(Arc<[DirectoryEntry]>, usize, usize)> = Vec::new();
        if let Some(root) = state.listings.get("") {
            stack.push((Arc::clone(&root.entries), 0, 0));
        }

        while let Some((entries, index, depth)) = stack.pop() {
            let Some(entry) = entries.get(index).cloned() else {
                continue;
            };
            stack.push((Arc::clone(&entries), index + 1, depth));

            let expanded = entry.is_folder() && state.expanded.contains(&entry.path);
            let children = expanded
                .then(|| state.listings.get(&entry.path))
                .flatten()
                .map(|l| Arc::clone(&l.entries));
            rows.push(VisibleRow {
                entry,
                depth,
                expanded,
            });
            if let Some(children) = children {
                stack.push((children, 0, depth + 1));
            }
        }
        rows
    }

    /// Drop everything: listings, expansion and in-flight markers.
    pub fn clear(&self) {
        *self.write() = CacheState::default();
        self.loading.clear();
        self.preloading.clear();
    }
}
