//! Scan handling and registry upkeep.

use crate::models::LinkOutcome;
use crate::sweeper::{sweep, SweeperHandle};
use crate::CardlinkApi;
use std::time::Duration;
use tokio::time::Instant;

impl CardlinkApi {
    /// Resolve a card scan against the oldest waiting registration.
    pub async fn link_scan(&self, rfid_uid: &str) -> LinkOutcome {
        self.coordinator.handle_scan(rfid_uid).await
    }

    /// Evict every expired registration now, and drop link signals nobody
    /// came back for within the timeout. Returns how many registrations were
    /// removed.
    pub fn sweep_expired(&self) -> usize {
        sweep(&self.registry, &self.notifier, Instant::now(), self.timeout)
    }

    /// Start a background task that sweeps every `interval`.
    ///
    /// Expiry is also enforced lazily, so the sweep only bounds memory held by
    /// registrations nobody polls for.
    pub fn spawn_sweeper(&self, interval: Duration) -> SweeperHandle {
        SweeperHandle::spawn(
            self.registry.clone(),
            self.notifier.clone(),
            self.timeout,
            interval,
        )
    }
}
