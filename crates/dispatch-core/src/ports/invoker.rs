//! Client-side invocation port.
//!
//! Typed clients are written against [`Invoker`] so they work over any
//! transport: in-process, IPC renderer, or a test double.

use crate::domain::{ErrorCode, ErrorDetail, ResultEnvelope};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, operation: &str, request: Value) -> Result<ResultEnvelope, ClientError>;
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// The operation ran and returned a failure envelope.
    #[error("{code}: {message}")]
    Remote { code: ErrorCode, message: String },

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The channel itself failed before producing an envelope.
    #[error("channel error: {0}")]
    Channel(String),
}

impl ClientError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<ErrorDetail> for ClientError {
    fn from(detail: ErrorDetail) -> Self {
        ClientError::Remote {
            code: detail.code,
            message: detail.message,
        }
    }
}

/// Invoke an operation with a typed request and decode the typed result.
pub async fn invoke_typed<I, Req, Resp>(
    invoker: &I,
    operation: &str,
    request: &Req,
) -> Result<Resp, ClientError>
where
    I: Invoker + ?Sized,
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let payload = serde_json::to_value(request)?;
    let envelope = invoker.invoke(operation, payload).await?;
    let value = envelope.into_result()?;
    Ok(serde_json::from_value(value)?)
}
