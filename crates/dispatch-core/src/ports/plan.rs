//! # Plans
//!
//! A Plan is a business-logic handler exposing named async methods. Methods
//! are resolved through an explicit dispatch table built at registration time:
//! each entry decodes the JSON request into a typed input, runs the method and
//! encodes the typed output.

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Error returned by a plan method.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The request payload could not be decoded into the method's input.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The method ran and failed.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

pub type MethodFuture = BoxFuture<'static, Result<Value, PlanError>>;

/// Type-erased plan method.
pub type MethodHandler = Arc<dyn Fn(Value) -> MethodFuture + Send + Sync>;

/// Handler object whose methods are looked up by name.
pub trait Plan: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Resolve a method by name.
    fn method(&self, name: &str) -> Option<MethodHandler>;

    /// Names of all methods, sorted.
    fn methods(&self) -> Vec<String>;
}

/// Dispatch-table [`Plan`] built from typed async closures.
///
/// ```ignore
/// let plan = PlanTable::new("chat")
///     .method("exportHistory", move |req: ExportHistoryRequest| {
///         let service = service.clone();
///         async move { service.export_history(req).await }
///     });
/// ```
#[derive(Clone)]
pub struct PlanTable {
    name: String,
    methods: HashMap<String, MethodHandler>,
}

impl PlanTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    /// Add a typed method. Decode failures surface as
    /// [`PlanError::InvalidRequest`] without calling `f`.
    pub fn method<Req, Resp, F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Resp>> + Send + 'static,
    {
        let handler: MethodHandler =
            Arc::new(move |value: Value| match decode_request::<Req>(value) {
                Ok(req) => {
                    let fut = f(req);
                    async move {
                        let resp = fut.await?;
                        serde_json::to_value(resp).map_err(|e| PlanError::Failed(e.into()))
                    }
                    .boxed()
                }
                Err(e) => future::ready(Err(PlanError::InvalidRequest(e.to_string()))).boxed(),
            });
        self.methods.insert(name.into(), handler);
        self
    }

    /// Add an untyped method operating on raw JSON.
    pub fn raw_method<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, PlanError>> + Send + 'static,
    {
        let handler: MethodHandler = Arc::new(move |value: Value| f(value).boxed());
        self.methods.insert(name.into(), handler);
        self
    }
}

/// Decode a request payload. A missing (`null`) payload is also tried as an
/// empty object so that request structs with all-default fields accept it.
fn decode_request<Req: DeserializeOwned>(value: Value) -> Result<Req, serde_json::Error> {
    if value.is_null() {
        return serde_json::from_value(Value::Null)
            .or_else(|_| serde_json::from_value(Value::Object(Default::default())));
    }
    serde_json::from_value(value)
}

impl Plan for PlanTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn method(&self, name: &str) -> Option<MethodHandler> {
        self.methods.get(name).cloned()
    }

    fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for PlanTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanTable")
            .field("name", &self.name)
            .field("methods", &self.methods())
            .finish()
    }
}
