//! Payment state tracking
//!
//! [`PaymentTracker`] is the single point of truth for locally-known payment
//! state, derived from the engine's asynchronous, at-least-once event feed
//! plus on-demand overwrites from direct engine queries. The engine delivers
//! events from its own task while request handlers read concurrently, so all
//! record mutations happen under one lock: a record is never observed with a
//! status written but its error field not yet cleared.
//!
//! Two deliberate policy choices, kept from the system this replaces:
//!
//! - The latest delivered event is always authoritative. No sequence number
//!   or timestamp comparison guards against redelivery of an old event, so a
//!   stale `FAILED` arriving after a `SUCCEEDED` regresses the status.
//! - Once an identifier enters the paid set it stays there until expiry,
//!   even if a later event marks the payment `FAILED`. `is_paid` can
//!   therefore disagree with `status_of`.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::engine::events::EngineEvent;
use crate::engine::types::PaymentState;
use crate::util::unix_time;

/// Tracked state of a single payment identifier
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedPayment {
    /// Last observed state
    pub status: PaymentState,
    /// Unix timestamp of the last state write
    pub last_updated: u64,
    /// Failure reason, present only while the status is `FAILED`
    pub error: Option<String>,
    /// Last engine-provided details payload, cached verbatim
    pub details: Option<serde_json::Value>,
}

#[derive(Default)]
struct TrackerState {
    records: HashMap<String, TrackedPayment>,
    paid: HashSet<String>,
    refunded: HashSet<String>,
    synced: bool,
    last_synced_at: u64,
}

/// In-memory tracker of payment states and engine sync health
pub struct PaymentTracker {
    state: Mutex<TrackerState>,
    sync_tx: watch::Sender<u64>,
}

impl PaymentTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        let (sync_tx, _) = watch::channel(0);
        Self {
            state: Mutex::new(TrackerState::default()),
            sync_tx,
        }
    }

    /// Apply one engine event
    ///
    /// Payment events without a resolvable identifier are logged and dropped
    /// without touching any state.
    pub fn handle_event(&self, event: &EngineEvent) {
        if matches!(event, EngineEvent::Synced) {
            let now = unix_time();
            {
                let mut state = self.state.lock();
                state.synced = true;
                state.last_synced_at = now;
            }
            self.sync_tx.send_replace(now);
            tracing::debug!("engine reported synced");
            return;
        }

        let (Some(status), Some(details)) = (event.state(), event.details()) else {
            return;
        };

        let Some(identifier) = details.identifier() else {
            tracing::warn!(
                "dropping {} event without payment hash, destination or swap id",
                status
            );
            return;
        };
        let identifier = identifier.to_string();

        let snapshot = details
            .payment
            .as_ref()
            .and_then(|p| serde_json::to_value(p).ok());
        self.update_state(&identifier, status, snapshot, details.error.clone());
    }

    /// Write or overwrite the record for `identifier`
    ///
    /// Refreshes `last_updated`, replaces the cached details when a new
    /// snapshot is provided, and maintains the error-iff-failed invariant.
    /// Paid states add the identifier to the paid set; re-adding is a no-op.
    pub fn update_state(
        &self,
        identifier: &str,
        status: PaymentState,
        details: Option<serde_json::Value>,
        error: Option<String>,
    ) {
        if identifier.is_empty() {
            tracing::warn!("refusing to track payment state under an empty identifier");
            return;
        }

        let mut state = self.state.lock();
        let record = state
            .records
            .entry(identifier.to_string())
            .or_insert_with(|| TrackedPayment {
                status,
                last_updated: 0,
                error: None,
                details: None,
            });

        record.status = status;
        record.last_updated = unix_time();
        if let Some(details) = details {
            record.details = Some(details);
        }
        record.error = match status {
            PaymentState::Failed => error.or_else(|| record.error.take()),
            _ => None,
        };

        if status.is_paid() && state.paid.insert(identifier.to_string()) {
            tracing::info!("payment {} added to paid set (status: {})", identifier, status);
        }
        if status == PaymentState::Refunded {
            state.refunded.insert(identifier.to_string());
        }

        tracing::info!("payment {} state updated to {}", identifier, status);
    }

    /// Last observed state for an identifier
    pub fn status_of(&self, identifier: &str) -> Option<PaymentState> {
        self.state.lock().records.get(identifier).map(|r| r.status)
    }

    /// Failure reason for an identifier, if its payment failed
    pub fn error_of(&self, identifier: &str) -> Option<String> {
        self.state
            .lock()
            .records
            .get(identifier)
            .and_then(|r| r.error.clone())
    }

    /// Unix timestamp of the last state write for an identifier
    pub fn timestamp_of(&self, identifier: &str) -> Option<u64> {
        self.state
            .lock()
            .records
            .get(identifier)
            .map(|r| r.last_updated)
    }

    /// Cached engine details for an identifier
    pub fn details_of(&self, identifier: &str) -> Option<serde_json::Value> {
        self.state
            .lock()
            .records
            .get(identifier)
            .and_then(|r| r.details.clone())
    }

    /// Whether a payment counts as paid
    ///
    /// True when the identifier is in the paid set or its current status is a
    /// paid state. Both checks are kept: entries can land in the paid set
    /// without a corresponding status write.
    pub fn is_paid(&self, identifier: &str) -> bool {
        let state = self.state.lock();
        state.paid.contains(identifier)
            || state
                .records
                .get(identifier)
                .is_some_and(|r| r.status.is_paid())
    }

    /// Whether the identifier is in the paid set itself
    pub fn in_paid_set(&self, identifier: &str) -> bool {
        self.state.lock().paid.contains(identifier)
    }

    /// Identifiers whose last observed state is `PENDING`
    pub fn pending_identifiers(&self) -> Vec<String> {
        self.state
            .lock()
            .records
            .iter()
            .filter(|(_, r)| r.status == PaymentState::Pending)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Number of tracked identifiers
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.state.lock().records.is_empty()
    }

    /// Whether the engine has reported a completed sync
    pub fn is_synced(&self) -> bool {
        self.state.lock().synced
    }

    /// Unix timestamp of the last `SYNCED` event, zero if none seen
    pub fn last_synced_at(&self) -> u64 {
        self.state.lock().last_synced_at
    }

    /// Wait until the engine reports synced, bounded by `timeout`
    ///
    /// Returns immediately when the sync flag is already set.
    pub async fn wait_for_sync(&self, timeout: Duration) -> bool {
        if self.is_synced() {
            return true;
        }
        let mut rx = self.sync_tx.subscribe();
        tokio::time::timeout(timeout, async move {
            while rx.changed().await.is_ok() {
                if *rx.borrow() > 0 {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false)
    }

    /// Drop every tracked field for identifiers whose last update is older
    /// than `retention`
    ///
    /// Removes the status record, error, timestamp, cached details and
    /// paid/refunded membership. Callers are not notified.
    pub fn expire_older_than(&self, retention: Duration) {
        let cutoff = unix_time().saturating_sub(retention.as_secs());
        let mut state = self.state.lock();
        let expired: Vec<String> = state
            .records
            .iter()
            .filter(|(_, r)| r.last_updated < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        for identifier in &expired {
            state.records.remove(identifier);
            state.paid.remove(identifier);
            state.refunded.remove(identifier);
        }

        if !expired.is_empty() {
            tracing::info!("expired {} stale payment records", expired.len());
        }
    }

    /// Clear every container and the sync flag
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.records.clear();
        state.paid.clear();
        state.refunded.clear();
        state.synced = false;
        state.last_synced_at = 0;
        tracing::debug!("payment tracker reset");
    }
}

impl Default for PaymentTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::PaymentEventDetails;

    fn details(hash: Option<&str>, dest: Option<&str>, swap: Option<&str>) -> PaymentEventDetails {
        PaymentEventDetails {
            payment_hash: hash.map(str::to_string),
            destination: dest.map(str::to_string),
            swap_id: swap.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_event_updates_state() {
        let tracker = PaymentTracker::new();

        tracker.handle_event(&EngineEvent::PaymentPending {
            details: details(Some("abc"), None, None),
        });
        assert_eq!(tracker.status_of("abc"), Some(PaymentState::Pending));
        assert!(!tracker.is_paid("abc"));

        tracker.handle_event(&EngineEvent::PaymentSucceeded {
            details: details(Some("abc"), None, None),
        });
        assert_eq!(tracker.status_of("abc"), Some(PaymentState::Succeeded));
        assert!(tracker.is_paid("abc"));
        assert_eq!(tracker.error_of("abc"), None);
    }

    #[test]
    fn test_duplicate_events_are_idempotent() {
        let tracker = PaymentTracker::new();

        tracker.update_state("dup", PaymentState::Succeeded, None, None);
        let first = tracker.timestamp_of("dup").unwrap();
        tracker.update_state("dup", PaymentState::Succeeded, None, None);

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.status_of("dup"), Some(PaymentState::Succeeded));
        assert!(tracker.timestamp_of("dup").unwrap() >= first);
        assert!(tracker.is_paid("dup"));
    }

    #[test]
    fn test_error_set_iff_failed() {
        let tracker = PaymentTracker::new();

        tracker.update_state(
            "xyz",
            PaymentState::Failed,
            None,
            Some("swap expired".to_string()),
        );
        assert_eq!(tracker.error_of("xyz"), Some("swap expired".to_string()));

        // Any non-failed transition clears the error
        tracker.update_state("xyz", PaymentState::Pending, None, None);
        assert_eq!(tracker.error_of("xyz"), None);

        // A failed write without an explicit reason keeps a previous one
        tracker.update_state("xyz", PaymentState::Failed, None, Some("late".to_string()));
        tracker.update_state("xyz", PaymentState::Failed, None, None);
        assert_eq!(tracker.error_of("xyz"), Some("late".to_string()));
    }

    #[test]
    fn test_paid_set_survives_later_failure() {
        let tracker = PaymentTracker::new();

        tracker.update_state("pay", PaymentState::WaitingConfirmation, None, None);
        assert!(tracker.is_paid("pay"));

        tracker.update_state("other", PaymentState::Pending, None, None);
        assert!(tracker.is_paid("pay"));

        tracker.update_state("pay", PaymentState::Failed, None, Some("reorg".to_string()));
        assert_eq!(tracker.status_of("pay"), Some(PaymentState::Failed));
        // Known design tension: paid membership is only removed by expiry
        assert!(tracker.is_paid("pay"));
    }

    #[test]
    fn test_event_without_identifier_is_dropped() {
        let tracker = PaymentTracker::new();
        tracker.handle_event(&EngineEvent::PaymentSucceeded {
            details: PaymentEventDetails::default(),
        });
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_identifier_resolution_prefers_hash() {
        let tracker = PaymentTracker::new();
        tracker.handle_event(&EngineEvent::PaymentPending {
            details: details(Some("hash"), Some("dest"), Some("swap")),
        });
        assert_eq!(tracker.status_of("hash"), Some(PaymentState::Pending));
        assert_eq!(tracker.status_of("dest"), None);
        assert_eq!(tracker.status_of("swap"), None);
    }

    #[test]
    fn test_out_of_order_event_regresses_status() {
        let tracker = PaymentTracker::new();
        tracker.update_state("late", PaymentState::Succeeded, None, None);
        tracker.update_state("late", PaymentState::Pending, None, None);
        // Latest delivery wins, even if it is logically older
        assert_eq!(tracker.status_of("late"), Some(PaymentState::Pending));
        // ...but paid membership is retained
        assert!(tracker.is_paid("late"));
    }

    #[test]
    fn test_expiry_removes_every_trace() {
        let tracker = PaymentTracker::new();

        tracker.update_state("old", PaymentState::Succeeded, None, None);
        tracker.update_state("fresh", PaymentState::Pending, None, None);

        // Backdate the old record past the retention window
        {
            let mut state = tracker.state.lock();
            let record = state.records.get_mut("old").unwrap();
            record.last_updated = unix_time() - 90_000;
        }

        tracker.expire_older_than(Duration::from_secs(86_400));

        assert_eq!(tracker.status_of("old"), None);
        assert_eq!(tracker.error_of("old"), None);
        assert_eq!(tracker.timestamp_of("old"), None);
        assert!(tracker.details_of("old").is_none());
        assert!(!tracker.is_paid("old"));
        assert_eq!(tracker.status_of("fresh"), Some(PaymentState::Pending));
    }

    #[test]
    fn test_paid_set_membership_without_status_record() {
        let tracker = PaymentTracker::new();
        // Legacy paths can mark an identifier paid without a status write;
        // both is_paid checks must honor it
        tracker.state.lock().paid.insert("legacy".to_string());

        assert!(tracker.is_paid("legacy"));
        assert!(tracker.in_paid_set("legacy"));
        assert_eq!(tracker.status_of("legacy"), None);
    }

    #[test]
    fn test_refunded_membership() {
        let tracker = PaymentTracker::new();
        tracker.update_state("swap-9", PaymentState::Refunded, None, None);
        assert_eq!(tracker.status_of("swap-9"), Some(PaymentState::Refunded));
        assert!(tracker.state.lock().refunded.contains("swap-9"));
        assert!(!tracker.is_paid("swap-9"));
    }

    #[test]
    fn test_pending_identifiers() {
        let tracker = PaymentTracker::new();
        tracker.update_state("a", PaymentState::Pending, None, None);
        tracker.update_state("b", PaymentState::Succeeded, None, None);
        tracker.update_state("c", PaymentState::Pending, None, None);

        let mut pending = tracker.pending_identifiers();
        pending.sort();
        assert_eq!(pending, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_reset_clears_sync_flag() {
        let tracker = PaymentTracker::new();
        tracker.handle_event(&EngineEvent::Synced);
        tracker.update_state("a", PaymentState::Succeeded, None, None);
        assert!(tracker.is_synced());

        tracker.reset();
        assert!(!tracker.is_synced());
        assert!(tracker.is_empty());
        assert!(!tracker.is_paid("a"));
        assert_eq!(tracker.last_synced_at(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_sync() {
        let tracker = std::sync::Arc::new(PaymentTracker::new());

        // Not synced: bounded wait times out
        assert!(!tracker.wait_for_sync(Duration::from_millis(20)).await);

        // Synced flag set while a waiter is parked
        let waiter = tracker.clone();
        let handle = tokio::spawn(async move { waiter.wait_for_sync(Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        tracker.handle_event(&EngineEvent::Synced);
        assert!(handle.await.unwrap());

        // Already synced: immediate
        assert!(tracker.wait_for_sync(Duration::from_millis(1)).await);
    }
}
