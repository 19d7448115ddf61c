//! The selected tree entry.

use canopy_core::normalize_path;
use tokio::sync::watch;

fn is_within(path: &str, root: &str) -> bool {
    path == root
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Path of the selected entry, published to subscribers on every change.
#[derive(Debug)]
pub struct Selection {
    tx: watch::Sender<Option<String>>,
}

impl Default for Selection {
    fn default() -> Self {
        Self::new()
    }
}

impl Selection {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn get(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }

    pub fn select(&self, path: &str) {
        self.tx.send_replace(Some(normalize_path(path)));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    /// Follow a rename of `from` (or one of its ancestors) to `to`.
    pub fn follow_rename(&self, from: &str, to: &str) {
        self.tx.send_if_modified(|selected| match selected {
            Some(path) if is_within(path, from) => {
                *path = format!("{to}{}", &path[from.len()..]);
                true
            }
            _ => false,
        });
    }

    /// Clear the selection if it is `path` or lies below it.
    pub fn clear_within(&self, path: &str) {
        self.tx.send_if_modified(|selected| {
            if selected.as_deref().is_some_and(|s| is_within(s, path)) {
                *selected = None;
                true
            } else {
                false
            }
        });
    }
}
