//! Scan-to-registration linking.
//!
//! A scan always resolves the longest-waiting registration. There is one
//! scanner and one linking flow at a time, so no attempt is made to match a
//! scan to a particular browser.

use crate::config::SheetConfig;
use crate::error::{CardlinkError, Result};
use crate::models::{LinkOutcome, LinkedCard};
use crate::notifier::SessionNotifier;
use crate::persistence::PersistenceGateway;
use crate::registry::{Claim, WaitingRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Resolves card scans against the waiting registry.
pub struct LinkingCoordinator {
    registry: Arc<WaitingRegistry>,
    notifier: Arc<SessionNotifier>,
    store: Arc<dyn PersistenceGateway>,
    timeout: Duration,
    /// Held for the whole of `handle_scan`; scans resolve one at a time.
    scan_gate: Mutex<()>,
}

impl LinkingCoordinator {
    pub fn new(
        registry: Arc<WaitingRegistry>,
        notifier: Arc<SessionNotifier>,
        store: Arc<dyn PersistenceGateway>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            notifier,
            store,
            timeout,
            scan_gate: Mutex::new(()),
        }
    }

    /// Write `scanned_code` into the oldest pending registration.
    ///
    /// On a row store failure the registration stays pending so the next
    /// scan can retry it.
    pub async fn handle_scan(&self, scanned_code: &str) -> LinkOutcome {
        let rfid_uid = scanned_code.trim();
        info!(rfid_uid = %rfid_uid, "Received UID from scanner");
        if rfid_uid.is_empty() {
            return Err(CardlinkError::invalid_input("RFID UID is required."));
        }

        let _gate = self.scan_gate.lock().await;

        if self.registry.is_empty() {
            warn!("Linking failed: no registration is waiting for a card");
            return Err(CardlinkError::NoActiveSession);
        }

        let result = self.registry.claim_oldest(Instant::now(), self.timeout);
        for (reg_no, entry) in &result.evicted {
            info!(reg_no = %reg_no, name = %entry.name, "Linking session timed out before scan");
            self.notifier.unwatch(&entry.session, reg_no);
        }
        let Some(claim) = result.claim else {
            warn!("Linking failed: every waiting registration had expired");
            return Err(CardlinkError::NoActiveSession);
        };

        info!(
            rfid_uid = %rfid_uid,
            reg_no = %claim.reg_no,
            row = claim.entry.position.row(),
            "Attempting to link card"
        );

        match self.write_card(&claim, rfid_uid).await {
            Ok(name) => {
                if self.registry.complete(&claim).is_none() {
                    warn!(
                        reg_no = %claim.reg_no,
                        "Registration was re-submitted during the scan; the new entry stays pending"
                    );
                }
                self.notifier.mark_linked(&claim.entry.session, &claim.reg_no);
                info!(name = %name, rfid_uid = %rfid_uid, "Linking success");
                Ok(LinkedCard {
                    reg_no: claim.reg_no,
                    name,
                    rfid_uid: rfid_uid.to_string(),
                })
            }
            Err(e) => {
                self.registry.release(&claim);
                error!(
                    reg_no = %claim.reg_no,
                    row = claim.entry.position.row(),
                    "Linking failed (row store error): {}",
                    e
                );
                Err(e)
            }
        }
    }

    /// Store the UID and read the name back for confirmation.
    async fn write_card(&self, claim: &Claim, rfid_uid: &str) -> Result<String> {
        let position = claim.entry.position;
        self.store
            .update(position, SheetConfig::RFID_UID_COLUMN, rfid_uid)
            .await?;
        let name = self.store.read(position, SheetConfig::NAME_COLUMN).await?;

        if name.trim().is_empty() {
            Ok(claim.entry.name.clone())
        } else {
            Ok(name)
        }
    }
}
