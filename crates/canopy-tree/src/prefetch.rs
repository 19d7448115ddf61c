//! Hover-dwell prefetch of folder listings.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use canopy_api::ProjectApi;
use canopy_core::normalize_path;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::loader::TreeLoader;

/// Starts a preload once the pointer has rested on a folder for `delay`.
///
/// Each hovered path owns a child of the prefetcher's root token, so
/// `hover_end` cancels one timer and `cancel_all` cancels every timer.
pub struct HoverPrefetcher<A> {
    loader: Arc<TreeLoader<A>>,
    delay: Duration,
    root: Mutex<CancellationToken>,
    timers: Arc<Mutex<HashMap<String, (u64, CancellationToken)>>>,
    next_timer: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<A: ProjectApi> HoverPrefetcher<A> {
    pub fn new(loader: Arc<TreeLoader<A>>, delay: Duration) -> Self {
        Self {
            loader,
            delay,
            root: Mutex::new(CancellationToken::new()),
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_timer: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm the dwell timer for `path`, replacing any timer already armed
    /// for it. The handle resolves to whether a listing was cached.
    pub fn hover_start(&self, path: &str) -> JoinHandle<bool> {
        let path = normalize_path(path);
        let id = self.next_timer.fetch_add(1, Ordering::Relaxed);
        let token = lock(&self.root).child_token();
        if let Some((_, previous)) = lock(&self.timers).insert(path.clone(), (id, token.clone())) {
            previous.cancel();
        }

        let loader = Arc::clone(&self.loader);
        let timers = Arc::clone(&self.timers);
        let delay = self.delay;
        tokio::spawn(async move {
            let fired = tokio::select! {
                _ = token.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            };

            let cached = if fired {
                loader.preload_folder(&path).await
            } else {
                trace!(path = %path, "Hover ended before dwell");
                false
            };

            let mut timers = lock(&timers);
            if timers.get(&path).is_some_and(|(current, _)| *current == id) {
                timers.remove(&path);
            }
            cached
        })
    }

    /// Cancel the dwell timer for `path`, if one is armed.
    pub fn hover_end(&self, path: &str) {
        if let Some((_, token)) = lock(&self.timers).remove(&normalize_path(path)) {
            token.cancel();
        }
    }

    pub fn pending(&self) -> usize {
        lock(&self.timers).len()
    }

    /// Cancel every armed timer. New hovers arm against a fresh root.
    pub fn cancel_all(&self) {
        let previous = std::mem::take(&mut *lock(&self.root));
        previous.cancel();
        lock(&self.timers).clear();
    }
}

impl<A> Drop for HoverPrefetcher<A> {
    fn drop(&mut self) {
        lock(&self.root).cancel();
    }
}
