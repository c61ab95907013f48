//! Gateway lifecycle owner
//!
//! [`Gateway`] holds the single handler/engine/tracker triple and guards its
//! lifecycle transitions (lazy construction, watchdog-driven rebuild,
//! teardown) behind one lock. Request handlers and the watchdog share the
//! gateway; nobody holds a handler across a rebuild without noticing, because
//! every caller re-fetches through [`Gateway::handler`].

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::engine::EngineConnector;
use crate::error::Error;
use crate::handler::PaymentHandler;

/// Application-scoped owner of the payment handler lifecycle
pub struct Gateway {
    connector: Arc<dyn EngineConnector>,
    config: EngineConfig,
    handler: Mutex<Option<Arc<PaymentHandler>>>,
}

impl Gateway {
    /// Create a gateway; no connection is opened until first use
    pub fn new(connector: Arc<dyn EngineConnector>, config: EngineConfig) -> Self {
        Self {
            connector,
            config,
            handler: Mutex::new(None),
        }
    }

    /// Get the live handler, connecting lazily on first use
    pub async fn handler(&self) -> Result<Arc<PaymentHandler>, Error> {
        let mut slot = self.handler.lock().await;
        if let Some(handler) = slot.as_ref() {
            return Ok(handler.clone());
        }

        tracing::info!("initializing payment handler");
        let handler = PaymentHandler::connect(self.connector.as_ref(), &self.config).await?;
        *slot = Some(handler.clone());
        Ok(handler)
    }

    /// Peek at the live handler without connecting
    pub async fn try_handler(&self) -> Option<Arc<PaymentHandler>> {
        self.handler.lock().await.clone()
    }

    /// Tear down the current handler and build a fresh one
    ///
    /// Used by the sync watchdog after repeated resync failures. The old
    /// connection is disconnected even when the rebuild fails; in that case
    /// the slot stays empty and the next [`Gateway::handler`] call retries.
    pub async fn reinitialize(&self) -> Result<Arc<PaymentHandler>, Error> {
        let mut slot = self.handler.lock().await;
        if let Some(old) = slot.take() {
            old.disconnect().await;
        }

        tracing::info!("reinitializing payment handler");
        let handler = PaymentHandler::connect(self.connector.as_ref(), &self.config).await?;
        *slot = Some(handler.clone());
        tracing::info!("payment handler reinitialized");
        Ok(handler)
    }

    /// Disconnect and drop the current handler, if any
    ///
    /// Idempotent; a later [`Gateway::handler`] call starts fresh.
    pub async fn disconnect(&self) {
        let mut slot = self.handler.lock().await;
        if let Some(handler) = slot.take() {
            handler.disconnect().await;
        }
    }

    /// Whether a live, synced handler exists
    pub async fn is_synced(&self) -> bool {
        match self.handler.lock().await.as_ref() {
            Some(handler) => handler.is_synced(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeConnector;

    fn test_config() -> EngineConfig {
        let mut config = EngineConfig::new("test-key", "test mnemonic words");
        config.working_dir = std::env::temp_dir()
            .join("tidepay-gateway-tests")
            .to_string_lossy()
            .into_owned();
        config.sync_wait_secs = 2;
        config
    }

    #[tokio::test]
    async fn test_lazy_singleton_connection() {
        let connector = Arc::new(FakeConnector::new(true));
        let gateway = Gateway::new(connector.clone(), test_config());

        assert!(gateway.try_handler().await.is_none());
        assert!(!gateway.is_synced().await);

        let first = gateway.handler().await.unwrap();
        let second = gateway.handler().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connections(), 1);
        assert!(gateway.is_synced().await);
    }

    #[tokio::test]
    async fn test_reinitialize_builds_fresh_connection() {
        let connector = Arc::new(FakeConnector::new(true));
        let gateway = Gateway::new(connector.clone(), test_config());

        let old = gateway.handler().await.unwrap();
        let old_engine = connector.current().unwrap();

        let new = gateway.reinitialize().await.unwrap();
        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(connector.connections(), 2);
        // The previous connection was torn down
        assert_eq!(old_engine.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_failed_reinitialize_leaves_slot_empty() {
        let connector = Arc::new(FakeConnector::new(true));
        let gateway = Gateway::new(connector.clone(), test_config());
        gateway.handler().await.unwrap();

        connector.set_fail_connect(true);
        assert!(gateway.reinitialize().await.is_err());
        assert!(gateway.try_handler().await.is_none());

        // Recovers once the engine is reachable again
        connector.set_fail_connect(false);
        assert!(gateway.handler().await.is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let connector = Arc::new(FakeConnector::new(true));
        let gateway = Gateway::new(connector.clone(), test_config());
        gateway.handler().await.unwrap();
        let engine = connector.current().unwrap();

        gateway.disconnect().await;
        gateway.disconnect().await;

        assert_eq!(engine.disconnects(), 1);
        assert!(gateway.try_handler().await.is_none());
    }
}
