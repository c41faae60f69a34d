//! Registry and transport configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Registry configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Include error chains in failure envelopes.
    pub dev_mode: bool,

    /// Allow unauthenticated callers on operations that declare no
    /// required capability.
    pub allow_anonymous: bool,

    /// Registry-wide invocation timeout. `None` waits indefinitely.
    #[serde(with = "humantime_serde")]
    pub invocation_timeout: Option<Duration>,
}

impl RegistryConfig {
    pub fn development() -> Self {
        Self {
            dev_mode: true,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.invocation_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidTimeout(
                "invocation_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings shared by every transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Permissive default authorization and stack-trace leakage.
    pub dev_mode: bool,

    /// Prefix for generated request ids.
    pub request_id_prefix: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            request_id_prefix: "req".to_string(),
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_id_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "request_id_prefix cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
