//! Engine event stream types
//!
//! The engine pushes typed events over its subscription stream. Every payment
//! event carries a [`PaymentEventDetails`] payload; `SYNCED` carries nothing.
//! Delivery is at-least-once and not guaranteed to follow state order, so
//! consumers must tolerate duplicates.

use serde::{Deserialize, Serialize};

use super::types::{Payment, PaymentState};

/// Event pushed by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// The engine completed a wallet sync cycle
    Synced,
    /// Lockup transaction broadcast, swap service holds the payment
    #[serde(rename_all = "camelCase")]
    PaymentPending {
        /// Event payload
        details: PaymentEventDetails,
    },
    /// Claim transaction broadcast or direct transaction seen
    #[serde(rename_all = "camelCase")]
    PaymentWaitingConfirmation {
        /// Event payload
        details: PaymentEventDetails,
    },
    /// Claim or direct transaction confirmed
    #[serde(rename_all = "camelCase")]
    PaymentSucceeded {
        /// Event payload
        details: PaymentEventDetails,
    },
    /// Swap expired or the lockup transaction failed
    #[serde(rename_all = "camelCase")]
    PaymentFailed {
        /// Event payload
        details: PaymentEventDetails,
    },
    /// Payment requires explicit fee acceptance
    #[serde(rename_all = "camelCase")]
    PaymentWaitingFeeAcceptance {
        /// Event payload
        details: PaymentEventDetails,
    },
}

impl EngineEvent {
    /// Payment state this event reports, `None` for `Synced`
    pub fn state(&self) -> Option<PaymentState> {
        match self {
            EngineEvent::Synced => None,
            EngineEvent::PaymentPending { .. } => Some(PaymentState::Pending),
            EngineEvent::PaymentWaitingConfirmation { .. } => {
                Some(PaymentState::WaitingConfirmation)
            }
            EngineEvent::PaymentSucceeded { .. } => Some(PaymentState::Succeeded),
            EngineEvent::PaymentFailed { .. } => Some(PaymentState::Failed),
            EngineEvent::PaymentWaitingFeeAcceptance { .. } => {
                Some(PaymentState::WaitingFeeAcceptance)
            }
        }
    }

    /// Event payload, `None` for `Synced`
    pub fn details(&self) -> Option<&PaymentEventDetails> {
        match self {
            EngineEvent::Synced => None,
            EngineEvent::PaymentPending { details }
            | EngineEvent::PaymentWaitingConfirmation { details }
            | EngineEvent::PaymentSucceeded { details }
            | EngineEvent::PaymentFailed { details }
            | EngineEvent::PaymentWaitingFeeAcceptance { details } => Some(details),
        }
    }
}

/// Payload of a payment event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEventDetails {
    /// Lightning payment hash, when the payment has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_hash: Option<String>,
    /// Destination invoice or address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Swap identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_id: Option<String>,
    /// Failure reason, on failed swaps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Full payment snapshot, when the engine includes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
}

impl PaymentEventDetails {
    /// Build a payload from a full payment snapshot
    pub fn from_payment(payment: Payment) -> Self {
        Self {
            payment_hash: payment.payment_hash().map(str::to_string),
            destination: payment.destination.clone(),
            swap_id: payment.swap_id().map(str::to_string),
            error: payment.error().map(str::to_string),
            payment: Some(payment),
        }
    }

    /// Resolve the tracking identifier for this payload
    ///
    /// Tries payment hash, then destination, then swap id; first non-empty
    /// field wins. Returns `None` when the event is untrackable.
    pub fn identifier(&self) -> Option<&str> {
        [
            self.payment_hash.as_deref(),
            self.destination.as_deref(),
            self.swap_id.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_resolution_order() {
        let details = PaymentEventDetails {
            payment_hash: Some("hash".to_string()),
            destination: Some("dest".to_string()),
            swap_id: Some("swap".to_string()),
            ..Default::default()
        };
        assert_eq!(details.identifier(), Some("hash"));

        let details = PaymentEventDetails {
            payment_hash: Some(String::new()),
            destination: Some("dest".to_string()),
            swap_id: Some("swap".to_string()),
            ..Default::default()
        };
        assert_eq!(details.identifier(), Some("dest"));

        let details = PaymentEventDetails {
            swap_id: Some("swap".to_string()),
            ..Default::default()
        };
        assert_eq!(details.identifier(), Some("swap"));

        assert_eq!(PaymentEventDetails::default().identifier(), None);
    }

    #[test]
    fn test_event_state() {
        assert_eq!(EngineEvent::Synced.state(), None);
        let event = EngineEvent::PaymentFailed {
            details: PaymentEventDetails::default(),
        };
        assert_eq!(event.state(), Some(PaymentState::Failed));
    }
}
