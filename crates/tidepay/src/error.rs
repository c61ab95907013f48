//! Error types for the Tidepay core

use thiserror::Error;

use crate::engine::EngineError;

/// Tidepay error type
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed configuration, fatal at construction
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller-correctable argument error, raised before any engine call
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Requested fiat currency has no published rate
    #[error("exchange rate not available for currency: {0}")]
    RateUnavailable(String),

    /// Merchant webhook delivery failed
    #[error("webhook delivery failed: {0}")]
    Webhook(String),

    /// Engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Anyhow error
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
