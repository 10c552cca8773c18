//! Cardlink Core - Headless library for linking RFID cards to registrations.
//!
//! A browser submits a registration, which is written to the row store and
//! parked in the waiting registry. A scanner then posts a card UID, and the
//! longest-waiting registration receives it. The browser polls until it sees
//! the link, a timeout, or an error.
//!
//! # Example
//!
//! ```rust,ignore
//! use cardlink_core::{CardlinkApi, MemoryRowStore, SessionId};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> cardlink_core::Result<()> {
//!     let api = CardlinkApi::builder(Arc::new(MemoryRowStore::new())).build()?;
//!     let session = SessionId::new("browser-1");
//!
//!     api.register("Alice", "R1", &session).await?;
//!     let card = api.link_scan("UID123").await?;
//!     println!("Linked {} to {}", card.rfid_uid, card.name);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod linking;
pub mod models;
pub mod notifier;
pub mod persistence;
pub mod registry;
pub mod sweeper;

mod api;

// Re-export commonly used types
pub use api::CardlinkApiBuilder;
pub use config::{LinkingConfig, ServerConfig, SheetConfig};
pub use error::{CardlinkError, ErrorKind, Result};
pub use linking::LinkingCoordinator;
pub use models::{LinkOutcome, LinkStatus, LinkedCard, PendingAck};
pub use notifier::{SessionId, SessionNotifier};
pub use persistence::{
    MemoryRowStore, PersistenceGateway, RegistrationRow, RowPosition, SheetsRowStore,
    SqliteRowStore,
};
pub use registry::{PendingRegistration, WaitingRegistry};
pub use sweeper::SweeperHandle;

use std::sync::Arc;
use std::time::Duration;

/// Main API struct for Cardlink operations.
///
/// Owns the waiting registry and session notifier; handlers share one
/// instance behind an `Arc`.
pub struct CardlinkApi {
    registry: Arc<WaitingRegistry>,
    notifier: Arc<SessionNotifier>,
    store: Arc<dyn PersistenceGateway>,
    coordinator: LinkingCoordinator,
    timeout: Duration,
}

impl CardlinkApi {
    /// Start configuring an API over the given row store.
    pub fn builder(store: Arc<dyn PersistenceGateway>) -> CardlinkApiBuilder {
        CardlinkApiBuilder::new(store)
    }

    /// How long registrations wait before timing out.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of registrations currently waiting.
    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }

    /// Label of the configured row store.
    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub fn registry(&self) -> &Arc<WaitingRegistry> {
        &self.registry
    }

    pub fn notifier(&self) -> &Arc<SessionNotifier> {
        &self.notifier
    }
}
