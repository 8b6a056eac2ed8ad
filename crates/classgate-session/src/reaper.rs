//! Periodic removal of expired sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::SessionStore;

/// Spawns a task that calls [`SessionStore::expire_stale`] every `every`.
///
/// The first sweep runs one full interval after spawning. A failed sweep
/// is logged and retried on the next tick. Abort the returned handle to
/// stop reaping.
pub fn spawn_reaper<S: SessionStore>(store: Arc<S>, every: Duration) -> JoinHandle<()> {
    let every = every.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + every, every);
        // A slow sweep should not cause a burst of catch-up sweeps.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.expire_stale().await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "reaped expired sessions"),
                Err(e) => warn!(error = %e, "session reap failed"),
            }
        }
    })
}
