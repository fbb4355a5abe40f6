//! Configuration for contract classes and the execution engine

use std::fs;
use std::path::Path;

use ethers::types::U256;
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// Configuration shared by a contract class and every binding it creates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Version prefix the chain client must report (its major version)
    pub client_version_prefix: String,

    /// Buffered lifecycle events per promise before slow subscribers lag
    pub event_capacity: usize,

    /// Gas resolution policy
    pub gas: GasPolicy,
}

/// Gas resolution policy of the execution engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasPolicy {
    /// Gas used when estimation is disabled
    pub fallback_gas: u64,

    /// Lower bound applied to every submitted gas value
    pub min_gas: u64,

    /// Margin added on top of an estimate, in percent
    pub margin_percent: u64,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            client_version_prefix: "1.".to_string(),
            event_capacity: 64,
            gas: GasPolicy::default(),
        }
    }
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            fallback_gas: 4_700_000,
            // Older ganache releases reject anything below this
            min_gas: 21_272,
            margin_percent: 10,
        }
    }
}

impl GasPolicy {
    /// Add the percentage margin to an estimate, rounding down
    pub fn apply_margin(&self, estimate: U256) -> U256 {
        let margin = estimate.saturating_mul(U256::from(self.margin_percent)) / U256::from(100u64);
        estimate.saturating_add(margin)
    }

    /// Raise `gas` to the configured minimum
    pub fn clamp(&self, gas: U256) -> U256 {
        gas.max(U256::from(self.min_gas))
    }
}

impl BindingConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_version_prefix.is_empty() {
            return Err(ConfigError::EmptyVersionPrefix);
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidEventCapacity);
        }

        if self.gas.min_gas > self.gas.fallback_gas {
            return Err(ConfigError::MinGasAboveFallback {
                min_gas: self.gas.min_gas,
                fallback_gas: self.gas.fallback_gas,
            });
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    Read { path: String, message: String },
    #[error("Invalid config: {0}")]
    Parse(String),
    #[error("Client version prefix must not be empty")]
    EmptyVersionPrefix,
    #[error("Invalid event capacity: must be greater than 0")]
    InvalidEventCapacity,
    #[error("Minimum gas {min_gas} exceeds fallback gas {fallback_gas}")]
    MinGasAboveFallback { min_gas: u64, fallback_gas: u64 },
}

impl From<ConfigError> for crate::Error {
    fn from(err: ConfigError) -> Self {
        crate::Error::Configuration(err.to_string())
    }
}
