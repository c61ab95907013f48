//! Configuration types for the payment engine connection

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::types::{AssetMetadata, ExternalInputParser};
use crate::error::Error;

/// Environment variable holding the engine API key
pub const ENV_ENGINE_API_KEY: &str = "TIDEPAY_ENGINE_API_KEY";
/// Environment variable holding the wallet mnemonic
pub const ENV_ENGINE_MNEMONIC: &str = "TIDEPAY_ENGINE_MNEMONIC";
/// Environment variable selecting the network
pub const ENV_ENGINE_NETWORK: &str = "TIDEPAY_ENGINE_NETWORK";
/// Environment variable overriding the working directory
pub const ENV_ENGINE_WORKING_DIR: &str = "TIDEPAY_ENGINE_WORKING_DIR";

fn default_working_dir() -> String {
    "~/.tidepay".to_string()
}

fn default_sync_wait_secs() -> u64 {
    10
}

/// Network the engine operates on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Liquid and Bitcoin mainnet
    #[default]
    Mainnet,
    /// Liquid and Bitcoin testnet
    Testnet,
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            _ => Err(format!("unknown network: {}", s)),
        }
    }
}

/// Engine connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine service API key
    pub api_key: String,
    /// BIP39 mnemonic of the wallet
    pub mnemonic: String,
    /// Network to operate on
    #[serde(default)]
    pub network: Network,
    /// Working directory for the engine's local state, `~` expands
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
    /// Seconds to wait for the first sync during construction (best effort)
    #[serde(default = "default_sync_wait_secs")]
    pub sync_wait_secs: u64,
    /// Metadata for non-Bitcoin assets the engine should recognize
    #[serde(default)]
    pub asset_metadata: Vec<AssetMetadata>,
    /// Custom input parsers the engine should consult
    #[serde(default)]
    pub external_input_parsers: Vec<ExternalInputParser>,
}

impl EngineConfig {
    /// Build a config with defaults from the two required secrets
    pub fn new(api_key: impl Into<String>, mnemonic: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            mnemonic: mnemonic.into(),
            network: Network::default(),
            working_dir: default_working_dir(),
            sync_wait_secs: default_sync_wait_secs(),
            asset_metadata: Vec::new(),
            external_input_parsers: Vec::new(),
        }
    }

    /// Build a config from `TIDEPAY_ENGINE_*` environment variables
    ///
    /// The API key and mnemonic are required; everything else falls back to
    /// defaults.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = env::var(ENV_ENGINE_API_KEY)
            .map_err(|_| Error::Config(format!("{} is not set", ENV_ENGINE_API_KEY)))?;
        let mnemonic = env::var(ENV_ENGINE_MNEMONIC)
            .map_err(|_| Error::Config(format!("{} is not set", ENV_ENGINE_MNEMONIC)))?;

        let mut config = Self::new(api_key, mnemonic);

        if let Ok(network) = env::var(ENV_ENGINE_NETWORK) {
            config.network = network
                .parse()
                .map_err(|e: String| Error::Config(e))?;
        }
        if let Ok(working_dir) = env::var(ENV_ENGINE_WORKING_DIR) {
            config.working_dir = working_dir;
        }

        config.validate()?;
        Ok(config)
    }

    /// Initial sync wait as a [`Duration`]
    pub fn sync_wait(&self) -> Duration {
        Duration::from_secs(self.sync_wait_secs)
    }

    /// Check the required secrets are present
    pub fn validate(&self) -> Result<(), Error> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("engine API key is empty".to_string()));
        }
        if self.mnemonic.trim().is_empty() {
            return Err(Error::Config("wallet mnemonic is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_missing_secrets() {
        assert!(EngineConfig::new("key", "mnemonic").validate().is_ok());
        assert!(EngineConfig::new("", "mnemonic").validate().is_err());
        assert!(EngineConfig::new("key", "  ").validate().is_err());
    }

    #[test]
    fn test_network_from_str() {
        assert_eq!("MAINNET".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("testnet".parse::<Network>().unwrap(), Network::Testnet);
        assert!("signet".parse::<Network>().is_err());
    }
}
