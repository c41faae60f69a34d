//! # Transport contract
//!
//! A transport bridges one communication channel to the [`OperationRegistry`].
//! It owns request-id generation, the dev-mode authorization fallback, and
//! error formatting; all business dispatch goes through the registry.
//!
//! Lifecycle: `stopped → start → running → stop → stopped`. Starting a running
//! transport is an error. Stopping a stopped one is a no-op.

use crate::domain::{
    AuthContext, DispatchError, ErrorCode, ErrorDetail, RequestId, RequestIdGenerator,
    ResultEnvelope, TransportConfig,
};
use crate::registry::OperationRegistry;
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport already running")]
    AlreadyRunning,

    #[error("failed to bind transport: {0}")]
    Bind(String),

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// State shared by every transport implementation.
#[derive(Debug)]
pub struct TransportCore {
    registry: Arc<OperationRegistry>,
    config: TransportConfig,
    request_ids: RequestIdGenerator,
}

impl TransportCore {
    pub fn new(registry: Arc<OperationRegistry>, config: TransportConfig) -> Self {
        let request_ids = RequestIdGenerator::new(config.request_id_prefix.clone());
        Self {
            registry,
            config,
            request_ids,
        }
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn dev_mode(&self) -> bool {
        self.config.dev_mode
    }

    pub fn generate_request_id(&self) -> RequestId {
        self.request_ids.next()
    }

    /// Build a failure envelope from an error that escaped the dispatch path.
    ///
    /// The code comes from a [`DispatchError`] or [`ErrorDetail`] anywhere in
    /// the error, otherwise `UNKNOWN_ERROR`. The error chain is attached as
    /// `stack` only in dev mode. The failure is counted in the registry's
    /// metrics.
    pub fn format_error(
        &self,
        error: &anyhow::Error,
        request_id: RequestId,
        operation: &str,
    ) -> ResultEnvelope {
        let code = if let Some(dispatch) = error.downcast_ref::<DispatchError>() {
            dispatch.code()
        } else if let Some(detail) = error.downcast_ref::<ErrorDetail>() {
            detail.code
        } else {
            ErrorCode::UnknownError
        };
        self.registry.metrics().record(Some(code), 0);
        let stack = self.config.dev_mode.then(|| format!("{:?}", error));
        ResultEnvelope::failure(
            request_id,
            operation,
            ErrorDetail::new(code, error.to_string()).with_stack(stack),
        )
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Channel-specific context used for authorization.
    type Context: Send + Sync;

    fn core(&self) -> &TransportCore;

    /// Derive the caller's identity from the channel context.
    ///
    /// The default grants the development identity in dev mode and fails
    /// closed otherwise. Production transports override this.
    async fn extract_auth_context(
        &self,
        _context: &Self::Context,
    ) -> anyhow::Result<Option<AuthContext>> {
        if self.core().dev_mode() {
            Ok(Some(AuthContext::development()))
        } else {
            Err(DispatchError::authentication_not_configured().into())
        }
    }

    /// Extract auth, delegate to the registry and return its envelope.
    /// Never fails: errors escaping auth extraction go through
    /// [`Transport::format_error`].
    async fn invoke_operation(
        &self,
        operation: &str,
        request: Value,
        context: &Self::Context,
        request_id: RequestId,
    ) -> ResultEnvelope {
        let extracted = AssertUnwindSafe(self.extract_auth_context(context))
            .catch_unwind()
            .await;

        let auth = match extracted {
            Ok(Ok(auth)) => auth,
            Ok(Err(err)) => {
                warn!(
                    operation,
                    request_id = %request_id,
                    error = %err,
                    "Auth context extraction failed"
                );
                return self.format_error(&err, request_id, operation);
            }
            Err(_) => {
                let err = anyhow::anyhow!("auth context extraction panicked");
                warn!(operation, request_id = %request_id, "Auth context extraction panicked");
                return self.format_error(&err, request_id, operation);
            }
        };

        self.core()
            .registry()
            .invoke_with_id(request_id, operation, request, auth.as_ref())
            .await
    }

    fn format_error(
        &self,
        error: &anyhow::Error,
        request_id: RequestId,
        operation: &str,
    ) -> ResultEnvelope {
        self.core().format_error(error, request_id, operation)
    }

    fn generate_request_id(&self) -> RequestId {
        self.core().generate_request_id()
    }

    async fn start(&self) -> Result<(), TransportError>;

    async fn stop(&self) -> Result<(), TransportError>;

    fn is_running(&self) -> bool;
}
