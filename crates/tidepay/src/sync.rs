//! Engine sync watchdog
//!
//! A long-lived background task that keeps the engine connection considered
//! healthy. Each iteration re-evaluates the sync state machine:
//!
//! ```text
//! SYNCED     --(age > stale_after OR unsynced)--> STALE
//! STALE      --(resync attempt)-->                RESYNCING
//! RESYNCING  --(success)-->                       SYNCED   (failures = 0)
//! RESYNCING  --(failure)-->                       STALE    (failures += 1)
//! STALE      --(failures >= max)-->               DEGRADED
//! DEGRADED   --(handler rebuilt)-->               STALE    (failures = 0)
//! ```
//!
//! Resync timeouts escalate with consecutive failures; after the failure
//! ceiling the handler is rebuilt from scratch, since repeated resync
//! failures usually mean the underlying connection is stuck beyond what a
//! resync can fix. A successful resync triggers the reconciliation sweep:
//! every tracked `PENDING` payment is re-checked against the engine and
//! settled ones are pushed to the merchant notifier, so externally-visible
//! state changes are not lost to sync gaps.
//!
//! Iteration errors are logged, counted as failures and retried after a
//! short fixed delay; the loop only exits on cancellation.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::engine::types::PaymentState;
use crate::error::Error;
use crate::gateway::Gateway;
use crate::handler::PaymentHandler;
use crate::notify::{PaymentNotifier, PaymentUpdate};

/// Tuning knobs for the sync watchdog
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Age of the last observed sync beyond which a resync is forced
    pub stale_after: Duration,
    /// Consecutive failures before the handler is rebuilt
    pub max_failures: u32,
    /// Base resync timeout
    pub base_timeout: Duration,
    /// Timeout increase per consecutive failure
    pub timeout_step: Duration,
    /// Resync timeout ceiling
    pub max_timeout: Duration,
    /// Poll interval while unsynced or failing
    pub busy_interval: Duration,
    /// Poll interval while healthy
    pub idle_interval: Duration,
    /// Delay after an iteration error
    pub error_delay: Duration,
    /// Retention window for tracked payment records
    pub retention: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(30),
            max_failures: 5,
            base_timeout: Duration::from_secs(5),
            timeout_step: Duration::from_secs(2),
            max_timeout: Duration::from_secs(30),
            busy_interval: Duration::from_secs(10),
            idle_interval: Duration::from_secs(30),
            error_delay: Duration::from_secs(5),
            retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Resync timeout for the given consecutive failure count
pub fn resync_timeout(config: &WatchdogConfig, failures: u32) -> Duration {
    (config.base_timeout + config.timeout_step * failures).min(config.max_timeout)
}

/// Poll delay for the current sync condition
pub fn poll_interval(config: &WatchdogConfig, synced: bool, failures: u32) -> Duration {
    if !synced || failures > 0 {
        config.busy_interval
    } else {
        config.idle_interval
    }
}

/// Observable watchdog state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncHealth {
    /// Recent sync observed
    Synced,
    /// Sync missing or too old
    Stale,
    /// A resync attempt is in flight
    Resyncing,
    /// Failure ceiling reached, handler being rebuilt
    Degraded,
}

/// Shared view of the watchdog's health
#[derive(Clone)]
pub struct HealthHandle(Arc<Mutex<SyncHealth>>);

impl HealthHandle {
    /// Current health
    pub fn get(&self) -> SyncHealth {
        *self.0.lock()
    }
}

/// Background task keeping the engine connection synced
pub struct SyncWatchdog {
    gateway: Arc<Gateway>,
    notifier: Option<Arc<dyn PaymentNotifier>>,
    config: WatchdogConfig,
    shutdown: CancellationToken,
    health: Arc<Mutex<SyncHealth>>,
}

impl SyncWatchdog {
    /// Create a watchdog over the given gateway
    pub fn new(
        gateway: Arc<Gateway>,
        notifier: Option<Arc<dyn PaymentNotifier>>,
        config: WatchdogConfig,
    ) -> Self {
        Self {
            gateway,
            notifier,
            config,
            shutdown: CancellationToken::new(),
            health: Arc::new(Mutex::new(SyncHealth::Stale)),
        }
    }

    /// Token that cancels the watchdog loop
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Shareable view of the watchdog's health
    pub fn health_handle(&self) -> HealthHandle {
        HealthHandle(self.health.clone())
    }

    fn set_health(&self, health: SyncHealth) {
        *self.health.lock() = health;
    }

    /// Run the watchdog until its token is cancelled
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        tracing::info!("sync watchdog started");
        let mut failures: u32 = 0;
        let mut last_sync: Option<Instant> = None;

        loop {
            let delay = match self.tick(&mut failures, &mut last_sync).await {
                Ok(delay) => delay,
                Err(e) => {
                    tracing::error!("sync watchdog iteration failed: {}", e);
                    failures = failures.saturating_add(1);
                    self.config.error_delay
                }
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        tracing::info!("sync watchdog stopped");
    }

    async fn tick(
        &self,
        failures: &mut u32,
        last_sync: &mut Option<Instant>,
    ) -> Result<Duration, Error> {
        let Some(handler) = self.gateway.try_handler().await else {
            tracing::warn!("payment handler not initialized, waiting");
            return Ok(self.config.error_delay);
        };

        let synced = handler.is_synced();
        let age = last_sync.map(|t| t.elapsed());
        tracing::debug!(
            "sync status check: synced={}, last sync age={:?}, consecutive failures={}",
            synced,
            age,
            failures
        );

        let stale = !synced || age.map_or(true, |a| a > self.config.stale_after);
        if !stale {
            *last_sync = Some(Instant::now());
            *failures = 0;
            self.set_health(SyncHealth::Synced);
            handler.tracker().expire_older_than(self.config.retention);
            return Ok(poll_interval(&self.config, true, 0));
        }

        self.set_health(SyncHealth::Resyncing);
        let timeout = resync_timeout(&self.config, *failures);
        tracing::warn!(
            "engine resync needed ({}), timeout {:?}",
            if synced { "sync too old" } else { "not synced" },
            timeout
        );

        if handler.wait_for_sync(timeout).await {
            tracing::info!("engine resync successful");
            *last_sync = Some(Instant::now());
            *failures = 0;
            self.set_health(SyncHealth::Synced);
            self.reconcile_pending(&handler).await;
        } else {
            *failures += 1;
            tracing::error!(
                "engine resync failed after {:?} ({} consecutive failures)",
                timeout,
                failures
            );

            if *failures >= self.config.max_failures {
                self.set_health(SyncHealth::Degraded);
                tracing::warn!("too many consecutive sync failures, reinitializing payment handler");
                match self.gateway.reinitialize().await {
                    Ok(_) => {
                        *failures = 0;
                        *last_sync = None;
                        self.set_health(SyncHealth::Stale);
                    }
                    Err(e) => {
                        tracing::error!("failed to reinitialize payment handler: {}", e);
                    }
                }
            } else {
                self.set_health(SyncHealth::Stale);
            }
        }

        let synced_now = self.gateway.is_synced().await;
        Ok(poll_interval(&self.config, synced_now, *failures))
    }

    /// Re-check tracked `PENDING` payments and notify settled ones
    ///
    /// Runs after each successful resync so status changes that happened
    /// during a sync gap still reach the merchant backend.
    pub async fn reconcile_pending(&self, handler: &PaymentHandler) {
        let pending = handler.tracker().pending_identifiers();
        if pending.is_empty() {
            return;
        }
        tracing::debug!("re-checking {} pending payments after resync", pending.len());

        for identifier in pending {
            match handler.check_payment_status(&identifier).await {
                Ok(status)
                    if matches!(
                        status.status,
                        PaymentState::Succeeded | PaymentState::Failed
                    ) =>
                {
                    tracing::info!("pending payment {} settled as {}", identifier, status.status);
                    if let Some(notifier) = &self.notifier {
                        let update = PaymentUpdate::from_status(&identifier, &status);
                        if let Err(e) = notifier.payment_updated(&update).await {
                            tracing::warn!(
                                "failed to notify settlement of {}: {}",
                                identifier,
                                e
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("failed to re-check pending payment {}: {}", identifier, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::config::EngineConfig;
    use crate::engine::fake::FakeConnector;
    use crate::engine::types::{Payment, PaymentDetails, PaymentType};

    #[test]
    fn test_resync_timeout_escalates_and_caps() {
        let config = WatchdogConfig::default();
        let timeouts: Vec<u64> = (0..5)
            .map(|failures| resync_timeout(&config, failures).as_secs())
            .collect();
        assert_eq!(timeouts, vec![5, 7, 9, 11, 13]);

        assert_eq!(resync_timeout(&config, 12).as_secs(), 29);
        assert_eq!(resync_timeout(&config, 13).as_secs(), 30);
        assert_eq!(resync_timeout(&config, 100).as_secs(), 30);
    }

    #[test]
    fn test_poll_interval_backs_off_when_healthy() {
        let config = WatchdogConfig::default();
        assert_eq!(poll_interval(&config, false, 0).as_secs(), 10);
        assert_eq!(poll_interval(&config, true, 2).as_secs(), 10);
        assert_eq!(poll_interval(&config, true, 0).as_secs(), 30);
    }

    struct CountingNotifier {
        updates: Mutex<Vec<PaymentUpdate>>,
    }

    impl CountingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                updates: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PaymentNotifier for CountingNotifier {
        async fn payment_updated(&self, update: &PaymentUpdate) -> Result<(), Error> {
            self.updates.lock().push(update.clone());
            Ok(())
        }
    }

    fn test_config(sync_wait_secs: u64) -> EngineConfig {
        let mut config = EngineConfig::new("test-key", "test mnemonic words");
        config.working_dir = std::env::temp_dir()
            .join("tidepay-sync-tests")
            .to_string_lossy()
            .into_owned();
        config.sync_wait_secs = sync_wait_secs;
        config
    }

    fn settled_payment(hash: &str, status: PaymentState) -> Payment {
        Payment {
            timestamp: 1_700_000_000,
            amount_sat: 2_500,
            fees_sat: 12,
            payment_type: PaymentType::Receive,
            status,
            destination: None,
            tx_id: None,
            details: PaymentDetails::Lightning {
                swap_id: format!("swap-{}", hash),
                payment_hash: Some(hash.to_string()),
                invoice: None,
                preimage: None,
                description: None,
                refund_tx_id: None,
                error: None,
            },
        }
    }

    #[tokio::test]
    async fn test_reconcile_notifies_only_settled_payments() {
        let connector = Arc::new(FakeConnector::new(true));
        let gateway = Arc::new(Gateway::new(connector.clone(), test_config(2)));
        let handler = gateway.handler().await.unwrap();
        let engine = connector.current().unwrap();

        // Three tracked pending payments: one settled, one still pending,
        // one the engine no longer knows
        let tracker = handler.tracker();
        tracker.update_state("done", PaymentState::Pending, None, None);
        tracker.update_state("open", PaymentState::Pending, None, None);
        tracker.update_state("gone", PaymentState::Pending, None, None);
        engine.insert_payment(settled_payment("done", PaymentState::Succeeded));
        engine.insert_payment(settled_payment("open", PaymentState::Pending));

        let notifier = CountingNotifier::new();
        let watchdog = SyncWatchdog::new(
            gateway.clone(),
            Some(notifier.clone() as Arc<dyn PaymentNotifier>),
            WatchdogConfig::default(),
        );

        watchdog.reconcile_pending(&handler).await;

        let updates = notifier.updates.lock();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].identifier, "done");
        assert_eq!(updates[0].status, PaymentState::Succeeded);
    }

    #[tokio::test]
    async fn test_failure_ceiling_rebuilds_handler() {
        // An engine that never syncs drives the watchdog through the
        // failure ceiling into a full handler rebuild
        let connector = Arc::new(FakeConnector::new(false));
        let gateway = Arc::new(Gateway::new(connector.clone(), test_config(0)));
        gateway.handler().await.unwrap();
        assert_eq!(connector.connections(), 1);

        let config = WatchdogConfig {
            max_failures: 3,
            base_timeout: Duration::from_millis(10),
            timeout_step: Duration::from_millis(0),
            max_timeout: Duration::from_millis(10),
            busy_interval: Duration::from_millis(5),
            idle_interval: Duration::from_millis(5),
            error_delay: Duration::from_millis(5),
            ..WatchdogConfig::default()
        };
        let watchdog = SyncWatchdog::new(gateway.clone(), None, config);
        let shutdown = watchdog.shutdown_token();
        let health = watchdog.health_handle();
        let handle = watchdog.spawn();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while connector.connections() < 2 {
            assert!(
                tokio::time::Instant::now() < deadline,
                "watchdog never rebuilt the handler"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_ne!(health.get(), SyncHealth::Synced);

        // Cancellation stops the loop promptly
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("watchdog did not stop on cancellation")
            .unwrap();
    }

    #[tokio::test]
    async fn test_healthy_engine_reaches_synced_health() {
        let connector = Arc::new(FakeConnector::new(true));
        let gateway = Arc::new(Gateway::new(connector.clone(), test_config(2)));
        gateway.handler().await.unwrap();

        let config = WatchdogConfig {
            busy_interval: Duration::from_millis(5),
            idle_interval: Duration::from_millis(5),
            ..WatchdogConfig::default()
        };
        let watchdog = SyncWatchdog::new(gateway.clone(), None, config);
        let shutdown = watchdog.shutdown_token();
        let health = watchdog.health_handle();
        let handle = watchdog.spawn();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while health.get() != SyncHealth::Synced {
            assert!(
                tokio::time::Instant::now() < deadline,
                "watchdog never became synced"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }
}
