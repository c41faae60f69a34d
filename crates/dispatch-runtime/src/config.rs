//! Runtime configuration.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults (production, fail closed)
//! 2. JSON file named by `DISPATCH_CONFIG`
//! 3. Individual `DISPATCH_*` environment variables
//!
//! Unparseable environment values are logged and ignored.

use dispatch_core::{ConfigError, RegistryConfig};
use dispatch_telemetry::parse_flag;
use dispatch_transport::{
    IpcTransportConfig, StdioTransportConfig, DEFAULT_IPC_CHANNEL, DEFAULT_MAX_LINE_BYTES,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Environment::Development),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub environment: Environment,

    /// Overrides the dev-mode flag derived from `environment`.
    pub dev_mode: Option<bool>,

    /// IPC channel the dispatch handler is bound to.
    pub channel: String,

    /// Permit unauthenticated calls to operations without a capability.
    pub allow_anonymous: bool,

    #[serde(with = "humantime_serde")]
    pub invoke_timeout: Option<Duration>,

    pub max_line_bytes: usize,

    /// Serve the stdio transport from the binary.
    pub serve_stdio: bool,

    /// Token granting full access over stdio in production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_token: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            dev_mode: None,
            channel: DEFAULT_IPC_CHANNEL.to_string(),
            allow_anonymous: false,
            invoke_timeout: None,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            serve_stdio: true,
            operator_token: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

impl RuntimeConfig {
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            ..Default::default()
        }
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("DISPATCH_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(value) = lookup("DISPATCH_ENV") {
            match Environment::parse(&value) {
                Some(env) => config.environment = env,
                None => warn!(value = %value, "Ignoring unknown DISPATCH_ENV"),
            }
        }
        if let Some(value) = lookup("DISPATCH_DEV_MODE") {
            config.dev_mode = Some(parse_flag(&value));
        }
        if let Some(value) = lookup("DISPATCH_CHANNEL") {
            config.channel = value;
        }
        if let Some(value) = lookup("DISPATCH_ALLOW_ANONYMOUS") {
            config.allow_anonymous = parse_flag(&value);
        }
        if let Some(value) = lookup("DISPATCH_INVOKE_TIMEOUT_MS") {
            match value.trim().parse::<u64>() {
                Ok(0) => config.invoke_timeout = None,
                Ok(ms) => config.invoke_timeout = Some(Duration::from_millis(ms)),
                Err(_) => warn!(value = %value, "Ignoring invalid DISPATCH_INVOKE_TIMEOUT_MS"),
            }
        }
        if let Some(value) = lookup("DISPATCH_MAX_LINE_BYTES") {
            match value.trim().parse::<usize>() {
                Ok(bytes) => config.max_line_bytes = bytes,
                Err(_) => warn!(value = %value, "Ignoring invalid DISPATCH_MAX_LINE_BYTES"),
            }
        }
        if let Some(value) = lookup("DISPATCH_SERVE_STDIO") {
            config.serve_stdio = parse_flag(&value);
        }
        if let Some(value) = lookup("DISPATCH_OPERATOR_TOKEN") {
            config.operator_token = Some(value).filter(|t| !t.is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn dev_mode(&self) -> bool {
        self.dev_mode
            .unwrap_or(self.environment == Environment::Development)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            dev_mode: self.dev_mode(),
            allow_anonymous: self.allow_anonymous,
            invocation_timeout: self.invoke_timeout,
        }
    }

    pub fn ipc_config(&self) -> IpcTransportConfig {
        IpcTransportConfig {
            channel: self.channel.clone(),
            ..IpcTransportConfig::default()
        }
        .with_dev_mode(self.dev_mode())
    }

    pub fn stdio_config(&self) -> StdioTransportConfig {
        StdioTransportConfig {
            max_line_bytes: self.max_line_bytes,
            ..StdioTransportConfig::default()
        }
        .with_dev_mode(self.dev_mode())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.registry_config().validate()?;
        self.ipc_config().validate()?;
        self.stdio_config().validate()
    }
}
