use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use super::window::RateWindowStore;
use crate::clock::Clock;

/// Spawn the background sweep task.
///
/// Admission already prunes the bucket it touches, so the sweeper only
/// exists to forget buckets of clients that stopped sending. It prunes each
/// bucket by that bucket's own window and drops the empty ones.
pub fn spawn_sweeper(
    store: Arc<dyn RateWindowStore>,
    clock: Arc<dyn Clock>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let before = store.len();
            store.sweep(clock.now());
            let removed = before.saturating_sub(store.len());
            if removed > 0 {
                debug!(removed, live = store.len(), "swept idle rate windows");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::RateRule;
    use crate::security::rate_limit::InMemoryRateStore;

    #[tokio::test(start_paused = true)]
    async fn sweeper_prunes_in_the_background() {
        let store = Arc::new(InMemoryRateStore::new());
        let clock = Arc::new(ManualClock::new());

        store.admit("k", RateRule { max_requests: 5, window_secs: 60 }, clock.now());
        assert_eq!(store.len(), 1);

        clock.advance(Duration::from_secs(120));
        let handle = spawn_sweeper(store.clone(), clock.clone(), Duration::from_secs(300));

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(store.len(), 0);
        handle.abort();
    }
}
