//! Daemon configuration

use std::net::SocketAddr;
use std::str::FromStr;

use tidepay::{EngineConfig, WatchdogConfig};

/// Which engine backend the daemon wires in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineBackend {
    /// The in-tree scripted engine; payments are simulated
    Fake,
}

impl FromStr for EngineBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fake" => Ok(EngineBackend::Fake),
            _ => Err(format!("unknown engine backend: {}", s)),
        }
    }
}

/// Merchant webhook target
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    /// Endpoint receiving settled-payment updates
    pub url: String,
    /// Shared secret for request signing
    pub secret: String,
}

/// Full daemon configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Address the HTTP server binds to
    pub listen_addr: SocketAddr,
    /// API key clients must present in `x-api-key`
    pub api_secret: String,
    /// Engine backend selection
    pub backend: EngineBackend,
    /// Engine connection configuration
    pub engine: EngineConfig,
    /// Merchant webhook target, if configured
    pub webhook: Option<WebhookSettings>,
    /// Sync watchdog tuning
    pub watchdog: WatchdogConfig,
}
