//! Builder for configuring CardlinkApi initialization.

use std::sync::Arc;
use std::time::Duration;

use crate::config::LinkingConfig;
use crate::error::{CardlinkError, Result};
use crate::linking::LinkingCoordinator;
use crate::notifier::SessionNotifier;
use crate::persistence::PersistenceGateway;
use crate::registry::WaitingRegistry;
use crate::CardlinkApi;

/// Builder for configuring CardlinkApi initialization.
///
/// # Example
///
/// ```rust,ignore
/// use cardlink_core::{CardlinkApi, SqliteRowStore};
///
/// let store = Arc::new(SqliteRowStore::open_at(Path::new("cardlink.db"))?);
/// let api = CardlinkApi::builder(store)
///     .timeout(Duration::from_secs(120))
///     .build()?;
/// ```
pub struct CardlinkApiBuilder {
    store: Arc<dyn PersistenceGateway>,
    timeout: Duration,
}

impl CardlinkApiBuilder {
    pub fn new(store: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            store,
            timeout: LinkingConfig::DEFAULT_TIMEOUT,
        }
    }

    /// How long a registration may wait for its card.
    ///
    /// Default: 300 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the CardlinkApi instance.
    pub fn build(self) -> Result<CardlinkApi> {
        if self.timeout.is_zero() {
            return Err(CardlinkError::Config {
                message: "Linking timeout must be greater than zero".to_string(),
            });
        }

        let registry = Arc::new(WaitingRegistry::new());
        let notifier = Arc::new(SessionNotifier::new());
        let coordinator = LinkingCoordinator::new(
            registry.clone(),
            notifier.clone(),
            self.store.clone(),
            self.timeout,
        );

        Ok(CardlinkApi {
            registry,
            notifier,
            store: self.store,
            coordinator,
            timeout: self.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryRowStore;

    #[test]
    fn test_builder_defaults() {
        let api = CardlinkApiBuilder::new(Arc::new(MemoryRowStore::new()))
            .build()
            .unwrap();
        assert_eq!(api.timeout(), LinkingConfig::DEFAULT_TIMEOUT);
        assert_eq!(api.pending_count(), 0);
        assert_eq!(api.backend_name(), "memory");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = CardlinkApiBuilder::new(Arc::new(MemoryRowStore::new()))
            .timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(CardlinkError::Config { .. })));
    }
}
