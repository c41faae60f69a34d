//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name attached to startup logs
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to color pretty output
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "plan-dispatch".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DISPATCH_SERVICE_NAME`: Service name (default: plan-dispatch)
    /// - `DISPATCH_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `DISPATCH_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `NO_COLOR`: Disable ANSI colors when set
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("DISPATCH_SERVICE_NAME")
                .unwrap_or_else(|_| "plan-dispatch".to_string()),

            log_level: env::var("DISPATCH_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("DISPATCH_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),

            ansi: env::var_os("NO_COLOR").is_none(),
        }
    }
}

/// `true`, `1`, `yes` and `on` (any case) are truthy.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
