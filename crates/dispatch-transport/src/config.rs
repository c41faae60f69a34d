//! Per-transport configuration.

use dispatch_core::{ConfigError, TransportConfig};
use serde::{Deserialize, Serialize};

/// Channel the IPC transport binds by default.
pub const DEFAULT_IPC_CHANNEL: &str = "plan:invoke";

/// Default upper bound on one stdio request line (1 MiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Transport fields as read from a config file. Fields left out keep the
/// owning transport's defaults (notably its request id prefix).
#[derive(Debug, Default, Deserialize)]
struct TransportOverrides {
    #[serde(default)]
    dev_mode: Option<bool>,
    #[serde(default)]
    request_id_prefix: Option<String>,
}

impl TransportOverrides {
    fn apply(self, base: TransportConfig) -> TransportConfig {
        TransportConfig {
            dev_mode: self.dev_mode.unwrap_or(base.dev_mode),
            request_id_prefix: self.request_id_prefix.unwrap_or(base.request_id_prefix),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpcTransportConfigRepr {
    #[serde(default)]
    channel: Option<String>,
    #[serde(flatten)]
    transport: TransportOverrides,
}

impl From<IpcTransportConfigRepr> for IpcTransportConfig {
    fn from(repr: IpcTransportConfigRepr) -> Self {
        let base = Self::default();
        Self {
            channel: repr.channel.unwrap_or(base.channel),
            transport: repr.transport.apply(base.transport),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StdioTransportConfigRepr {
    #[serde(default)]
    max_line_bytes: Option<usize>,
    #[serde(flatten)]
    transport: TransportOverrides,
}

impl From<StdioTransportConfigRepr> for StdioTransportConfig {
    fn from(repr: StdioTransportConfigRepr) -> Self {
        let base = Self::default();
        Self {
            max_line_bytes: repr.max_line_bytes.unwrap_or(base.max_line_bytes),
            transport: repr.transport.apply(base.transport),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IpcTransportConfigRepr")]
pub struct IpcTransportConfig {
    pub channel: String,
    #[serde(flatten)]
    pub transport: TransportConfig,
}

impl Default for IpcTransportConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_IPC_CHANNEL.to_string(),
            transport: TransportConfig {
                request_id_prefix: "ipc".to_string(),
                ..Default::default()
            },
        }
    }
}

impl IpcTransportConfig {
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.transport.dev_mode = dev_mode;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.trim().is_empty() {
            return Err(ConfigError::InvalidChannel(
                "channel cannot be empty".to_string(),
            ));
        }
        self.transport.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StdioTransportConfigRepr")]
pub struct StdioTransportConfig {
    /// Longer lines are answered with `INVALID_REQUEST`.
    pub max_line_bytes: usize,
    #[serde(flatten)]
    pub transport: TransportConfig,
}

impl Default for StdioTransportConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            transport: TransportConfig {
                request_id_prefix: "stdio".to_string(),
                ..Default::default()
            },
        }
    }
}

impl StdioTransportConfig {
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.transport.dev_mode = dev_mode;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_line_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_line_bytes must be greater than 0".to_string(),
            ));
        }
        self.transport.validate()
    }
}
