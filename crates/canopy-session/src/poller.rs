//! Visibility-gated interval loops.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Spawn a loop that runs `tick` every `interval` while `visible` is true.
///
/// While hidden the loop sleeps until visibility returns, then ticks at
/// once. A visibility change during the wait restarts the cycle. The loop
/// ends when `shutdown` is cancelled or the visibility sender is dropped.
pub fn spawn_poller<F, Fut>(
    name: &'static str,
    interval: Duration,
    mut visible: watch::Receiver<bool>,
    shutdown: CancellationToken,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        debug!(poller = name, ?interval, "Poller started");
        loop {
            if !*visible.borrow_and_update() {
                trace!(poller = name, "Hidden, waiting");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = visible.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick() => {}
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
                changed = visible.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!(poller = name, "Poller stopped");
    })
}
