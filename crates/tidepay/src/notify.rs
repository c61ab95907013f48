//! Merchant webhook notification
//!
//! The reconciliation sweep pushes settled-payment updates to the merchant
//! backend as signed JSON webhooks. Payloads are signed with HMAC-SHA256 over
//! the raw body; the hex signature travels in the `X-Webhook-Signature`
//! header and the receiver verifies it with the shared secret.

use async_trait::async_trait;
use ring::hmac;
use serde::Serialize;
use url::Url;

use crate::engine::types::PaymentState;
use crate::error::Error;
use crate::handler::PaymentStatus;

/// Header carrying the hex HMAC-SHA256 signature of the body
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Payment update pushed to the merchant backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentUpdate {
    /// Identifier the payment is tracked under
    pub identifier: String,
    /// Settled state
    pub status: PaymentState,
    /// Amount in satoshis, when known
    pub amount_sat: Option<u64>,
    /// Fees in satoshis, when known
    pub fees_sat: Option<u64>,
    /// Failure reason, for failed payments
    pub error: Option<String>,
    /// Unix timestamp of the state change, when known
    pub timestamp: Option<u64>,
}

impl PaymentUpdate {
    /// Build an update from a status report
    pub fn from_status(identifier: &str, status: &PaymentStatus) -> Self {
        Self {
            identifier: identifier.to_string(),
            status: status.status,
            amount_sat: status.amount_sat,
            fees_sat: status.fees_sat,
            error: status.error.clone(),
            timestamp: status.timestamp,
        }
    }
}

/// Sink for settled-payment updates
#[async_trait]
pub trait PaymentNotifier: Send + Sync {
    /// Deliver one payment update
    async fn payment_updated(&self, update: &PaymentUpdate) -> Result<(), Error>;
}

/// HTTP notifier posting signed JSON updates to one endpoint
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: Url,
    secret: String,
}

impl WebhookNotifier {
    /// Create a notifier for the given endpoint
    pub fn new(endpoint: &str, secret: String) -> Result<Self, Error> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("invalid webhook endpoint {}: {}", endpoint, e)))?;
        if endpoint.scheme() != "https" && endpoint.scheme() != "http" {
            return Err(Error::Config(format!(
                "webhook endpoint must be an HTTP(S) URL: {}",
                endpoint
            )));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            secret,
        })
    }

    fn sign(&self, body: &[u8]) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, self.secret.as_bytes());
        hex::encode(hmac::sign(&key, body).as_ref())
    }
}

#[async_trait]
impl PaymentNotifier for WebhookNotifier {
    async fn payment_updated(&self, update: &PaymentUpdate) -> Result<(), Error> {
        let body = serde_json::to_vec(update)
            .map_err(|e| Error::Webhook(format!("failed to encode update: {}", e)))?;
        let signature = self.sign(&body);

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Webhook(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "unknown".to_string());
            tracing::warn!("merchant webhook returned {}: {}", status, body);
            return Err(Error::Webhook(format!(
                "endpoint returned {}: {}",
                status, body
            )));
        }

        tracing::debug!(
            "delivered payment update for {} ({})",
            update.identifier,
            update.status
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_stable_hmac() {
        let notifier =
            WebhookNotifier::new("https://merchant.invalid/hook", "test_secret".to_string())
                .unwrap();

        let body = b"test body";
        let signature = notifier.sign(body);

        let key = hmac::Key::new(hmac::HMAC_SHA256, b"test_secret");
        let expected = hex::encode(hmac::sign(&key, body).as_ref());
        assert_eq!(signature, expected);

        // A different body signs differently
        assert_ne!(signature, notifier.sign(b"other body"));
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        assert!(WebhookNotifier::new("ftp://merchant.invalid/hook", String::new()).is_err());
        assert!(WebhookNotifier::new("not a url", String::new()).is_err());
    }

    #[test]
    fn test_update_from_status() {
        let status = PaymentStatus {
            status: PaymentState::Failed,
            payment_details: None,
            error: Some("swap expired".to_string()),
            timestamp: Some(1_700_000_000),
            amount_sat: Some(5_000),
            fees_sat: Some(21),
        };
        let update = PaymentUpdate::from_status("abc", &status);
        assert_eq!(update.identifier, "abc");
        assert_eq!(update.status, PaymentState::Failed);
        assert_eq!(update.error, Some("swap expired".to_string()));
    }
}
