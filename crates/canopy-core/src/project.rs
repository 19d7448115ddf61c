//! Project identity and the epoch guard used to drop stale results.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// The currently open project, shared by every component of a workspace.
///
/// Each switch bumps an epoch. Work captures a [`ProjectScope`] before it
/// awaits and checks [`ProjectScope::is_current`] before writing results,
/// so anything resolving after a switch is discarded.
#[derive(Debug)]
pub struct ProjectContext {
    name: RwLock<Arc<str>>,
    epoch: Arc<AtomicU64>,
}

impl ProjectContext {
    /// Create a context for a project.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: RwLock::new(name.into()),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Capture the current project identity.
    pub fn scope(&self) -> ProjectScope {
        let name = self.name.read().unwrap_or_else(PoisonError::into_inner);
        ProjectScope {
            name: Arc::clone(&name),
            epoch: self.epoch.load(Ordering::SeqCst),
            current: Arc::clone(&self.epoch),
        }
    }

    /// Switch to another project, invalidating every outstanding scope.
    pub fn switch(&self, name: impl Into<Arc<str>>) -> ProjectScope {
        {
            let mut current = self.name.write().unwrap_or_else(PoisonError::into_inner);
            *current = name.into();
            self.epoch.fetch_add(1, Ordering::SeqCst);
        }
        self.scope()
    }

    /// Name of the open project.
    pub fn name(&self) -> Arc<str> {
        Arc::clone(&self.name.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

/// A captured project identity.
#[derive(Debug, Clone)]
pub struct ProjectScope {
    name: Arc<str>,
    epoch: u64,
    current: Arc<AtomicU64>,
}

impl ProjectScope {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether the project is still the one this scope was captured for.
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.epoch
    }
}
