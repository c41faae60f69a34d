//! # Result Envelope
//!
//! The uniform output of every invocation regardless of transport.
//!
//! ```text
//! { success, requestId, operation, result?, error?: { message, code, stack? }, timing? }
//! ```
//!
//! Exactly one of `result` / `error` is present, selected by `success`.
//! Constructors enforce this; there is no way to build an envelope with both.

use super::error::{DispatchError, ErrorCode};
use super::request_id::RequestId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Failure payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub code: ErrorCode,
    /// Full error chain; only populated in dev mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: Option<String>) -> Self {
        self.stack = stack;
        self
    }
}

impl From<&DispatchError> for ErrorDetail {
    fn from(err: &DispatchError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorDetail {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl Timing {
    /// Timing for work that started at `started_at` and ends now.
    pub fn since(started_at: DateTime<Utc>) -> Self {
        let elapsed = Utc::now().signed_duration_since(started_at);
        Self {
            started_at,
            duration_ms: elapsed.num_milliseconds().max(0) as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope {
    pub success: bool,
    pub request_id: RequestId,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
}

impl ResultEnvelope {
    pub fn success(request_id: RequestId, operation: impl Into<String>, result: Value) -> Self {
        Self {
            success: true,
            request_id,
            operation: operation.into(),
            result: Some(result),
            error: None,
            timing: None,
        }
    }

    pub fn failure(request_id: RequestId, operation: impl Into<String>, error: ErrorDetail) -> Self {
        Self {
            success: false,
            request_id,
            operation: operation.into(),
            result: None,
            error: Some(error),
            timing: None,
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Code of the failure, `None` on success.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }

    /// Convert into a `Result`, for callers that want `?`.
    ///
    /// A malformed envelope (`success = false` without an error body) becomes
    /// an `UNKNOWN_ERROR`.
    pub fn into_result(self) -> Result<Value, ErrorDetail> {
        if self.success {
            Ok(self.result.unwrap_or(Value::Null))
        } else {
            Err(self.error.unwrap_or_else(|| {
                ErrorDetail::new(ErrorCode::UnknownError, "failure envelope without error")
            }))
        }
    }
}
