//! Daemon environment variables

use std::env;
use std::time::Duration;

use anyhow::{bail, Context};
use tidepay::{EngineConfig, WatchdogConfig};

use crate::config::{EngineBackend, Settings, WebhookSettings};

pub const ENV_LISTEN_ADDR: &str = "TIDEPAY_LISTEN_ADDR";
pub const ENV_API_SECRET: &str = "TIDEPAY_API_SECRET";
pub const ENV_ENGINE_BACKEND: &str = "TIDEPAY_ENGINE_BACKEND";
pub const ENV_WEBHOOK_URL: &str = "TIDEPAY_WEBHOOK_URL";
pub const ENV_WEBHOOK_SECRET: &str = "TIDEPAY_WEBHOOK_SECRET";
pub const ENV_SYNC_BUSY_INTERVAL_SECS: &str = "TIDEPAY_SYNC_BUSY_INTERVAL_SECS";
pub const ENV_SYNC_IDLE_INTERVAL_SECS: &str = "TIDEPAY_SYNC_IDLE_INTERVAL_SECS";
pub const ENV_SYNC_MAX_FAILURES: &str = "TIDEPAY_SYNC_MAX_FAILURES";
pub const ENV_PAYMENT_RETENTION_SECS: &str = "TIDEPAY_PAYMENT_RETENTION_SECS";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

fn env_duration_secs(var: &str) -> anyhow::Result<Option<Duration>> {
    match env::var(var) {
        Ok(value) => {
            let secs: u64 = value
                .parse()
                .with_context(|| format!("{} must be a number of seconds", var))?;
            Ok(Some(Duration::from_secs(secs)))
        }
        Err(_) => Ok(None),
    }
}

impl Settings {
    /// Assemble the daemon configuration from `TIDEPAY_*` environment
    /// variables
    pub fn from_env() -> anyhow::Result<Self> {
        let listen_addr = env::var(ENV_LISTEN_ADDR)
            .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
            .parse()
            .with_context(|| format!("{} must be a host:port address", ENV_LISTEN_ADDR))?;

        let api_secret =
            env::var(ENV_API_SECRET).with_context(|| format!("{} is not set", ENV_API_SECRET))?;
        if api_secret.trim().is_empty() {
            bail!("{} must not be empty", ENV_API_SECRET);
        }

        let backend: EngineBackend = env::var(ENV_ENGINE_BACKEND)
            .unwrap_or_else(|_| "fake".to_string())
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        let engine = EngineConfig::from_env()?;

        let webhook = match env::var(ENV_WEBHOOK_URL) {
            Ok(url) => {
                let secret = env::var(ENV_WEBHOOK_SECRET).with_context(|| {
                    format!("{} is required with {}", ENV_WEBHOOK_SECRET, ENV_WEBHOOK_URL)
                })?;
                Some(WebhookSettings { url, secret })
            }
            Err(_) => None,
        };

        let mut watchdog = WatchdogConfig::default();
        if let Some(interval) = env_duration_secs(ENV_SYNC_BUSY_INTERVAL_SECS)? {
            watchdog.busy_interval = interval;
        }
        if let Some(interval) = env_duration_secs(ENV_SYNC_IDLE_INTERVAL_SECS)? {
            watchdog.idle_interval = interval;
        }
        if let Ok(max_failures) = env::var(ENV_SYNC_MAX_FAILURES) {
            watchdog.max_failures = max_failures
                .parse()
                .with_context(|| format!("{} must be a number", ENV_SYNC_MAX_FAILURES))?;
        }
        if let Some(retention) = env_duration_secs(ENV_PAYMENT_RETENTION_SECS)? {
            watchdog.retention = retention;
        }

        Ok(Settings {
            listen_addr,
            api_secret,
            backend,
            engine,
            webhook,
            watchdog,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_backend_parsing() {
        assert_eq!("fake".parse::<EngineBackend>().unwrap(), EngineBackend::Fake);
        assert_eq!("FAKE".parse::<EngineBackend>().unwrap(), EngineBackend::Fake);
        assert!("greenlight".parse::<EngineBackend>().is_err());
    }

    #[test]
    fn test_env_duration_parsing() {
        assert_eq!(env_duration_secs("TIDEPAY_TEST_UNSET_VAR").unwrap(), None);

        env::set_var("TIDEPAY_TEST_DURATION_VAR", "45");
        assert_eq!(
            env_duration_secs("TIDEPAY_TEST_DURATION_VAR").unwrap(),
            Some(Duration::from_secs(45))
        );

        env::set_var("TIDEPAY_TEST_DURATION_VAR", "soon");
        assert!(env_duration_secs("TIDEPAY_TEST_DURATION_VAR").is_err());
        env::remove_var("TIDEPAY_TEST_DURATION_VAR");
    }
}
