//! Status polling.

use crate::error::{CardlinkError, Result};
use crate::models::LinkStatus;
use crate::notifier::SessionId;
use crate::registry::Probe;
use crate::CardlinkApi;
use tokio::time::Instant;
use tracing::{debug, info};

impl CardlinkApi {
    /// Report where `reg_no` stands for the polling `session`.
    ///
    /// A registry hit always wins; the session's linked signal is only
    /// consulted once the entry is gone, and is consumed when reported.
    /// Anything else fails with [`CardlinkError::SessionExpired`].
    pub fn check_status(&self, reg_no: &str, session: &SessionId) -> Result<LinkStatus> {
        match self.registry.probe(reg_no, Instant::now(), self.timeout) {
            Probe::Waiting => Ok(LinkStatus::Waiting),
            Probe::TimedOut(entry) => {
                self.notifier.unwatch(&entry.session, reg_no);
                if &entry.session != session {
                    self.notifier.unwatch(session, reg_no);
                }
                info!(name = %entry.name, reg_no = %reg_no, "Linking session timed out");
                Ok(LinkStatus::Timeout)
            }
            Probe::Absent => {
                if self.notifier.take_linked(session, reg_no) {
                    Ok(LinkStatus::Linked)
                } else {
                    debug!(reg_no = %reg_no, session = %session, "Status check for unknown registration");
                    Err(CardlinkError::SessionExpired)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::models::LinkStatus;
    use crate::persistence::MemoryRowStore;
    use crate::{CardlinkApi, CardlinkError, SessionId};
    use std::sync::Arc;
    use std::time::Duration;

    fn api() -> CardlinkApi {
        CardlinkApi::builder(Arc::new(MemoryRowStore::new()))
            .build()
            .unwrap()
    }

    fn is_expired(result: crate::Result<LinkStatus>) -> bool {
        matches!(result, Err(CardlinkError::SessionExpired))
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_then_timeout_once() {
        let api = api();
        let session = SessionId::new("s1");
        api.register("Bob", "R2", &session).await.unwrap();

        assert_eq!(api.check_status("R2", &session).unwrap(), LinkStatus::Waiting);

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(api.check_status("R2", &session).unwrap(), LinkStatus::Timeout);
        assert_eq!(api.pending_count(), 0);
        assert!(api.notifier().is_empty());

        assert!(is_expired(api.check_status("R2", &session)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_linked_reported_once_to_owning_session() {
        let api = api();
        let owner = SessionId::new("owner");
        let other = SessionId::new("other");
        api.register("Alice", "R1", &owner).await.unwrap();

        tokio::time::advance(Duration::from_secs(1)).await;
        api.link_scan("UID123").await.unwrap();

        assert!(is_expired(api.check_status("R1", &other)));
        assert_eq!(api.check_status("R1", &owner).unwrap(), LinkStatus::Linked);
        assert!(is_expired(api.check_status("R1", &owner)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_hit_beats_stale_signal() {
        let api = api();
        let session = SessionId::new("s1");
        api.register("Alice", "R1", &session).await.unwrap();
        api.link_scan("UID1").await.unwrap();

        // Re-registered before the browser polled.
        api.register("Alice", "R1", &session).await.unwrap();
        assert_eq!(api.check_status("R1", &session).unwrap(), LinkStatus::Waiting);
    }

    #[tokio::test]
    async fn test_unknown_registration_is_session_expired() {
        let api = api();
        let err = api.check_status("nope", &SessionId::new("s1")).unwrap_err();
        assert_eq!(err.to_string(), "Session expired or invalid.");
    }
}
