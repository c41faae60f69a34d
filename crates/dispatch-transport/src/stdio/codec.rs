//! Newline-delimited JSON framing for the stdio transport.
//!
//! Request line:  `{"operation": "chat:listTopics", "request": {...}, "token": "..."}`
//! Response line: one serialized `ResultEnvelope`.

use dispatch_core::{DispatchError, ResultEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operation name reported when a line could not be decoded.
pub const UNPARSED_OPERATION: &str = "<unparsed>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdioRequest {
    pub operation: String,
    #[serde(default)]
    pub request: Value,
    /// Session token handed to the session resolver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

pub fn decode_line(line: &str, max_line_bytes: usize) -> Result<StdioRequest, DispatchError> {
    if line.len() > max_line_bytes {
        return Err(DispatchError::InvalidRequest(format!(
            "request line exceeds {} bytes",
            max_line_bytes
        )));
    }
    let request: StdioRequest = serde_json::from_str(line)
        .map_err(|e| DispatchError::InvalidRequest(format!("malformed request: {}", e)))?;
    if request.operation.is_empty() {
        return Err(DispatchError::InvalidRequest(
            "operation cannot be empty".to_string(),
        ));
    }
    Ok(request)
}

/// Serialize an envelope as one line, including the trailing newline.
pub fn encode_envelope(envelope: &ResultEnvelope) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(envelope)?;
    line.push('\n');
    Ok(line)
}
