//! Dispatch error taxonomy with stable string codes.
//!
//! Codes are part of the external contract: callers branch on them to tell
//! "not authorized" apart from "not found" apart from "the plan failed".
//! New codes may be added; existing ones are never renamed or repurposed.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Stable error code strings carried in `error.code`.
pub mod codes {
    /// Authentication context missing or capability insufficient.
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    /// Operation or plan method does not exist.
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// The plan method itself failed.
    pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";
    /// Fallback for failures that carry no code.
    pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

    // Extensions
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
}

/// Typed form of the code strings in [`codes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    Unauthorized,
    NotFound,
    ExecutionError,
    UnknownError,
    Timeout,
    InvalidRequest,
}

impl ErrorCode {
    pub const COUNT: usize = 6;

    /// All codes, in metric-slot order.
    pub const ALL: [ErrorCode; Self::COUNT] = [
        ErrorCode::Unauthorized,
        ErrorCode::NotFound,
        ErrorCode::ExecutionError,
        ErrorCode::UnknownError,
        ErrorCode::Timeout,
        ErrorCode::InvalidRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => codes::UNAUTHORIZED,
            ErrorCode::NotFound => codes::NOT_FOUND,
            ErrorCode::ExecutionError => codes::EXECUTION_ERROR,
            ErrorCode::UnknownError => codes::UNKNOWN_ERROR,
            ErrorCode::Timeout => codes::TIMEOUT,
            ErrorCode::InvalidRequest => codes::INVALID_REQUEST,
        }
    }

    /// Parse a code string. Unrecognized codes map to `UnknownError` so that
    /// envelopes from newer peers still decode.
    pub fn parse(s: &str) -> Self {
        match s {
            codes::UNAUTHORIZED => ErrorCode::Unauthorized,
            codes::NOT_FOUND => ErrorCode::NotFound,
            codes::EXECUTION_ERROR => ErrorCode::ExecutionError,
            codes::TIMEOUT => ErrorCode::Timeout,
            codes::INVALID_REQUEST => ErrorCode::InvalidRequest,
            _ => ErrorCode::UnknownError,
        }
    }

    pub(crate) fn slot(&self) -> usize {
        match self {
            ErrorCode::Unauthorized => 0,
            ErrorCode::NotFound => 1,
            ErrorCode::ExecutionError => 2,
            ErrorCode::UnknownError => 3,
            ErrorCode::Timeout => 4,
            ErrorCode::InvalidRequest => 5,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ErrorCode::parse(&s))
    }
}

/// Invocation-time errors. Every variant maps onto exactly one [`ErrorCode`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Execution(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Unknown(String),
}

impl DispatchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DispatchError::Unauthorized(_) => ErrorCode::Unauthorized,
            DispatchError::NotFound(_) => ErrorCode::NotFound,
            DispatchError::Execution(_) => ErrorCode::ExecutionError,
            DispatchError::Timeout(_) => ErrorCode::Timeout,
            DispatchError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            DispatchError::Unknown(_) => ErrorCode::UnknownError,
        }
    }

    pub fn operation_not_found(operation: &str) -> Self {
        DispatchError::NotFound(format!("operation not found: {}", operation))
    }

    pub fn method_not_found(method: &str) -> Self {
        DispatchError::NotFound(format!("method not found: {}", method))
    }

    pub fn unauthorized(details: impl Into<String>) -> Self {
        DispatchError::Unauthorized(details.into())
    }

    /// Raised when a transport has neither a session resolver nor dev mode.
    pub fn authentication_not_configured() -> Self {
        DispatchError::Unauthorized("authentication not configured".to_string())
    }

    pub fn timeout(operation: &str, after_ms: u128) -> Self {
        DispatchError::Timeout(format!(
            "operation timed out after {}ms: {}",
            after_ms, operation
        ))
    }
}

/// Startup-time errors raised by `OperationRegistry::register`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("operation already registered: {0}")]
    DuplicateOperation(String),

    #[error("malformed operation record: {0}")]
    MalformedRecord(String),
}
