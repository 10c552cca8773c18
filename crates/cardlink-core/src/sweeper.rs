//! Optional background eviction of expired registrations.

use crate::notifier::SessionNotifier;
use crate::registry::WaitingRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Handle to a running sweep task. Dropping stops the task.
pub struct SweeperHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl SweeperHandle {
    pub(crate) fn spawn(
        registry: Arc<WaitingRegistry>,
        notifier: Arc<SessionNotifier>,
        timeout: Duration,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task_handle = tokio::spawn(Self::run(registry, notifier, timeout, interval, shutdown_rx));
        info!("Registry sweeper started (every {:?})", interval);

        Self {
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
        }
    }

    async fn run(
        registry: Arc<WaitingRegistry>,
        notifier: Arc<SessionNotifier>,
        timeout: Duration,
        interval: Duration,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("Registry sweeper shutting down");
                    break;
                }
                now = ticker.tick() => {
                    sweep(&registry, &notifier, now, timeout);
                }
            }
        }
    }

    /// Stop the sweep task.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// One hygiene pass: expired registrations, then stale notifier slots.
pub(crate) fn sweep(
    registry: &WaitingRegistry,
    notifier: &SessionNotifier,
    now: Instant,
    timeout: Duration,
) -> usize {
    let evicted = registry.sweep_expired(now, timeout);
    for (reg_no, entry) in &evicted {
        notifier.unwatch(&entry.session, reg_no);
        info!(reg_no = %reg_no, name = %entry.name, "Swept expired registration");
    }
    let dropped = notifier.sweep_stale(now, timeout);
    if dropped > 0 {
        debug!(dropped, "Dropped stale session slots");
    }
    evicted.len()
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::persistence::MemoryRowStore;
    use crate::{CardlinkApi, SessionId};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_in_background() {
        let api = CardlinkApi::builder(Arc::new(MemoryRowStore::new()))
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap();
        api.register("Bob", "R2", &SessionId::new("s1")).await.unwrap();
        let _sweeper = api.spawn_sweeper(Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(api.pending_count(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sweeper_stops() {
        let api = CardlinkApi::builder(Arc::new(MemoryRowStore::new()))
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap();
        api.register("Bob", "R2", &SessionId::new("s1")).await.unwrap();

        drop(api.spawn_sweeper(Duration::from_secs(30)));
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(api.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_drops_unconsumed_signals() {
        let api = CardlinkApi::builder(Arc::new(MemoryRowStore::new()))
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap();
        api.register("Alice", "R1", &SessionId::new("s1")).await.unwrap();
        api.link_scan("UID1").await.unwrap();
        assert_eq!(api.notifier().len(), 1);

        let _sweeper = api.spawn_sweeper(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert!(api.notifier().is_empty());
    }
}
