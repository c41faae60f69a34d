//! # Operation Registry
//!
//! Owns the operation table and turns every invocation into a
//! [`ResultEnvelope`]:
//!
//! ```text
//! invoke(op, request, auth)
//!   1. lookup            → NOT_FOUND       "operation not found: <op>"
//!   2. authorize         → UNAUTHORIZED
//!   3. resolve method    → NOT_FOUND       "method not found: <method>"
//!   4. run plan method   → EXECUTION_ERROR / INVALID_REQUEST / TIMEOUT
//!   5. success envelope
//! ```
//!
//! `invoke` never panics and never returns an error: plan panics are caught
//! and reported as `EXECUTION_ERROR`. Steps 1-3 short-circuit before any plan
//! code runs.
//!
//! Re-registering an existing `domain:method` is rejected.

use crate::domain::{
    AuthContext, DispatchError, ErrorCode, ErrorDetail, OperationInfo, OperationKey,
    RegistrationError, RegistryConfig, RequestId, RequestIdGenerator, ResultEnvelope, Timing,
};
use crate::metrics::DispatchMetrics;
use crate::ports::{ClientError, Invoker, Plan, PlanError};
use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Version assigned to records that do not set one.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// One invocable unit of business logic.
#[derive(Clone)]
pub struct OperationRecord {
    domain: String,
    method: String,
    plan: Arc<dyn Plan>,
    version: String,
    description: String,
    required_capability: Option<String>,
    timeout: Option<Duration>,
}

impl OperationRecord {
    pub fn new(domain: impl Into<String>, method: impl Into<String>, plan: Arc<dyn Plan>) -> Self {
        Self {
            domain: domain.into(),
            method: method.into(),
            plan,
            version: DEFAULT_VERSION.to_string(),
            description: String::new(),
            required_capability: None,
            timeout: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.required_capability = Some(capability.into());
        self
    }

    /// Override the registry-wide invocation timeout for this operation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn key(&self) -> OperationKey {
        OperationKey::new(&self.domain, &self.method)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn plan(&self) -> &Arc<dyn Plan> {
        &self.plan
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Required capability; an empty string counts as none.
    pub fn required_capability(&self) -> Option<&str> {
        self.required_capability
            .as_deref()
            .filter(|capability| !capability.is_empty())
    }

    pub fn info(&self) -> OperationInfo {
        OperationInfo {
            operation: self.key().to_string(),
            version: self.version.clone(),
            description: self.description.clone(),
            required_capability: self.required_capability().map(str::to_string),
        }
    }

    pub fn validate(&self) -> Result<(), RegistrationError> {
        for (field, value) in [("domain", &self.domain), ("method", &self.method)] {
            if value.is_empty() {
                return Err(RegistrationError::MalformedRecord(format!(
                    "{} cannot be empty",
                    field
                )));
            }
            if value.contains(crate::domain::operation::SEPARATOR) {
                return Err(RegistrationError::MalformedRecord(format!(
                    "{} cannot contain ':' ({})",
                    field, value
                )));
            }
        }
        if self.version.trim().is_empty() {
            return Err(RegistrationError::MalformedRecord(format!(
                "version cannot be empty ({})",
                self.key()
            )));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(RegistrationError::MalformedRecord(format!(
                "timeout must be non-zero ({})",
                self.key()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for OperationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRecord")
            .field("operation", &self.key().as_str())
            .field("plan", &self.plan.name())
            .field("version", &self.version)
            .field("required_capability", &self.required_capability)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Default)]
struct OperationTable {
    by_key: HashMap<String, Arc<OperationRecord>>,
    // Registration order for list()
    order: Vec<String>,
}

/// Transport-agnostic operation table.
pub struct OperationRegistry {
    config: RegistryConfig,
    table: RwLock<OperationTable>,
    request_ids: RequestIdGenerator,
    metrics: Arc<DispatchMetrics>,
}

impl OperationRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            table: RwLock::new(OperationTable::default()),
            request_ids: RequestIdGenerator::new("op"),
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn register(&self, record: OperationRecord) -> Result<(), RegistrationError> {
        record.validate()?;
        let key = record.key().to_string();

        let mut table = self.table.write();
        if table.by_key.contains_key(&key) {
            return Err(RegistrationError::DuplicateOperation(key));
        }

        info!(
            operation = %key,
            version = %record.version,
            plan = record.plan.name(),
            capability = record.required_capability().unwrap_or("-"),
            "Registered operation"
        );
        table.order.push(key.clone());
        table.by_key.insert(key, Arc::new(record));
        Ok(())
    }

    /// Register several records, stopping at the first failure.
    pub fn register_all<I>(&self, records: I) -> Result<(), RegistrationError>
    where
        I: IntoIterator<Item = OperationRecord>,
    {
        records.into_iter().try_for_each(|record| self.register(record))
    }

    /// All operations in registration order.
    pub fn list(&self) -> Vec<OperationInfo> {
        let table = self.table.read();
        table
            .order
            .iter()
            .filter_map(|key| table.by_key.get(key))
            .map(|record| record.info())
            .collect()
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.table.read().by_key.contains_key(operation)
    }

    pub fn len(&self) -> usize {
        self.table.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generate_request_id(&self) -> RequestId {
        self.request_ids.next()
    }

    /// Invoke with a freshly generated request id.
    pub async fn invoke(
        &self,
        operation: &str,
        request: Value,
        auth: Option<&AuthContext>,
    ) -> ResultEnvelope {
        let request_id = self.generate_request_id();
        self.invoke_with_id(request_id, operation, request, auth)
            .await
    }

    /// Invoke with a caller-supplied request id.
    pub async fn invoke_with_id(
        &self,
        request_id: RequestId,
        operation: &str,
        request: Value,
        auth: Option<&AuthContext>,
    ) -> ResultEnvelope {
        let started_at = Utc::now();
        let outcome = self.dispatch(operation, request, auth).await;
        let timing = Timing::since(started_at);
        let duration_ms = timing.duration_ms;

        let envelope = match outcome {
            Ok(result) => {
                debug!(
                    operation,
                    request_id = %request_id,
                    duration_ms,
                    "Operation completed"
                );
                ResultEnvelope::success(request_id, operation, result)
            }
            Err(error) => {
                warn!(
                    operation,
                    request_id = %request_id,
                    code = %error.code,
                    error = %error.message,
                    duration_ms,
                    "Operation failed"
                );
                ResultEnvelope::failure(request_id, operation, error)
            }
        }
        .with_timing(timing);

        self.metrics.record(envelope.error_code(), duration_ms);
        envelope
    }

    async fn dispatch(
        &self,
        operation: &str,
        request: Value,
        auth: Option<&AuthContext>,
    ) -> Result<Value, ErrorDetail> {
        let record = self
            .lookup(operation)
            .ok_or_else(|| ErrorDetail::from(&DispatchError::operation_not_found(operation)))?;

        self.authorize(&record, auth)
            .map_err(|e| ErrorDetail::from(&e))?;

        let handler = record
            .plan
            .method(&record.method)
            .ok_or_else(|| ErrorDetail::from(&DispatchError::method_not_found(&record.method)))?;

        let call = AssertUnwindSafe(async move { handler(request).await }).catch_unwind();
        let joined = match record.timeout.or(self.config.invocation_timeout) {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(joined) => joined,
                Err(_) => {
                    let err = DispatchError::timeout(operation, limit.as_millis());
                    return Err(ErrorDetail::from(&err));
                }
            },
            None => call.await,
        };

        match joined {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(PlanError::InvalidRequest(message))) => {
                Err(ErrorDetail::new(ErrorCode::InvalidRequest, message))
            }
            Ok(Err(PlanError::Failed(err))) => {
                let stack = self.config.dev_mode.then(|| format!("{:?}", err));
                Err(ErrorDetail::new(ErrorCode::ExecutionError, err.to_string()).with_stack(stack))
            }
            Err(panic) => Err(ErrorDetail::new(
                ErrorCode::ExecutionError,
                panic_message(panic.as_ref()),
            )),
        }
    }

    fn lookup(&self, operation: &str) -> Option<Arc<OperationRecord>> {
        self.table.read().by_key.get(operation).cloned()
    }

    fn authorize(
        &self,
        record: &OperationRecord,
        auth: Option<&AuthContext>,
    ) -> Result<(), DispatchError> {
        match (record.required_capability(), auth) {
            (Some(capability), Some(ctx)) if ctx.grants(capability) => Ok(()),
            (Some(capability), Some(_)) => Err(DispatchError::unauthorized(format!(
                "missing capability: {}",
                capability
            ))),
            (None, Some(_)) => Ok(()),
            (None, None) if self.config.allow_anonymous => Ok(()),
            (_, None) => Err(DispatchError::unauthorized("authentication required")),
        }
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("config", &self.config)
            .field("operations", &self.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("plan panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("plan panicked: {}", s)
    } else {
        "plan panicked".to_string()
    }
}

/// In-process [`Invoker`] calling a registry directly with a fixed identity.
#[derive(Debug, Clone)]
pub struct LocalInvoker {
    registry: Arc<OperationRegistry>,
    auth: Option<AuthContext>,
}

impl LocalInvoker {
    pub fn new(registry: Arc<OperationRegistry>, auth: Option<AuthContext>) -> Self {
        Self { registry, auth }
    }
}

#[async_trait]
impl Invoker for LocalInvoker {
    async fn invoke(&self, operation: &str, request: Value) -> Result<ResultEnvelope, ClientError> {
        Ok(self
            .registry
            .invoke(operation, request, self.auth.as_ref())
            .await)
    }
}
