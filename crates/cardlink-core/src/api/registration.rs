//! Registration submission.

use crate::config::LinkingConfig;
use crate::error::{CardlinkError, Result};
use crate::models::PendingAck;
use crate::notifier::SessionId;
use crate::persistence::RegistrationRow;
use crate::CardlinkApi;
use tracing::{debug, error, info};

impl CardlinkApi {
    /// Record a registration and park it until a card is scanned.
    ///
    /// The row is appended first; if that fails nothing enters the registry.
    pub async fn register(
        &self,
        name: &str,
        reg_no: &str,
        session: &SessionId,
    ) -> Result<PendingAck> {
        let name = name.trim();
        let reg_no = reg_no.trim();
        if name.is_empty() || reg_no.is_empty() {
            return Err(CardlinkError::invalid_input(
                "Name and Register Number are required.",
            ));
        }

        let date_added = chrono::Local::now()
            .format(LinkingConfig::DATE_FORMAT)
            .to_string();
        let row = RegistrationRow::pending(reg_no, name, date_added).into_cells();

        let position = self.store.append(&row).await.map_err(|e| {
            error!(reg_no = %reg_no, "Error appending registration row: {}", e);
            e
        })?;

        if let Some(replaced) = self.registry.insert(reg_no, name, position, session.clone()) {
            self.notifier.unwatch(&replaced.session, reg_no);
        }
        if let Some(previous) = self.notifier.watch(session, reg_no) {
            debug!(
                session = %session,
                previous = %previous,
                reg_no = %reg_no,
                "Session moved on to a new registration"
            );
        }

        info!(
            name = %name,
            reg_no = %reg_no,
            row = position.row(),
            "Student added, waiting for scan"
        );

        Ok(PendingAck {
            reg_no: reg_no.to_string(),
            name: name.to_string(),
            position,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::persistence::{MemoryRowStore, RowPosition};
    use crate::{CardlinkApi, CardlinkError, SessionId};
    use std::sync::Arc;

    fn api_with_store() -> (CardlinkApi, Arc<MemoryRowStore>) {
        let store = Arc::new(MemoryRowStore::new());
        let api = CardlinkApi::builder(store.clone()).build().unwrap();
        (api, store)
    }

    #[tokio::test]
    async fn test_register_appends_and_waits() {
        let (api, store) = api_with_store();
        let session = SessionId::new("s1");

        let ack = api.register(" Alice ", " R1 ", &session).await.unwrap();

        assert_eq!(ack.reg_no, "R1");
        assert_eq!(ack.name, "Alice");
        assert_eq!(ack.position, RowPosition(2));
        assert!(api.registry().contains("R1"));
        assert_eq!(api.notifier().watching(&session).as_deref(), Some("R1"));

        let row = store.row(ack.position).unwrap();
        assert_eq!(&row[..3], &["R1".to_string(), "Alice".to_string(), String::new()]);
        assert_eq!(row[3].len(), "2026-01-01 00:00:00".len());
    }

    #[tokio::test]
    async fn test_register_rejects_blank_fields() {
        let (api, store) = api_with_store();
        let session = SessionId::new("s1");

        let err = api.register("   ", "R1", &session).await.unwrap_err();
        assert!(matches!(err, CardlinkError::InvalidInput { .. }));
        let err = api.register("Alice", "", &session).await.unwrap_err();
        assert!(matches!(err, CardlinkError::InvalidInput { .. }));

        assert_eq!(store.row_count(), 1);
        assert_eq!(api.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_append_failure_leaves_no_registry_entry() {
        let (api, store) = api_with_store();
        store.fail_appends(true);

        let err = api
            .register("Alice", "R1", &SessionId::new("s1"))
            .await
            .unwrap_err();

        assert!(matches!(err, CardlinkError::PersistenceWriteFailed { .. }));
        assert_eq!(api.pending_count(), 0);
        assert!(api.notifier().is_empty());
    }

    #[tokio::test]
    async fn test_resubmission_replaces_pending_entry() {
        let (api, _store) = api_with_store();
        let session = SessionId::new("s1");

        api.register("Alice", "R1", &session).await.unwrap();
        let second = api.register("Alice", "R1", &session).await.unwrap();

        assert_eq!(api.pending_count(), 1);
        assert_eq!(api.registry().peek_oldest().unwrap().1.position, second.position);
    }

    #[tokio::test]
    async fn test_resubmission_by_other_session_clears_old_watch() {
        let (api, _store) = api_with_store();
        let first = SessionId::new("a");
        let second = SessionId::new("b");

        api.register("Alice", "R1", &first).await.unwrap();
        api.register("Alice", "R1", &second).await.unwrap();

        assert!(api.notifier().watching(&first).is_none());
        assert_eq!(api.notifier().watching(&second).as_deref(), Some("R1"));

        api.link_scan("UID1").await.unwrap();
        assert_eq!(
            api.check_status("R1", &second).unwrap(),
            crate::LinkStatus::Linked
        );
        assert!(api.notifier().is_empty());
    }
}
