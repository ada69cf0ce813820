use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::state::SharedState;

/// Periodically drop expired cache entries and finished rate-limit windows.
pub fn spawn_housekeeping(
    state: SharedState,
    mut shutdown: watch::Receiver<bool>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!("Housekeeping started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            state.cache.purge_expired();
            state.api_limiter.cleanup();

            tokio::select! {
                _ = tokio::time::sleep(every) => {}
                _ = shutdown.changed() => {}
            }
        }

        tracing::debug!("Housekeeping stopped");
    })
}
