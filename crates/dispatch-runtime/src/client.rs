//! Typed clients, one method per operation, over any [`Invoker`].

use crate::plans::{
    ExportHistoryRequest, ExportHistoryResponse, ListOperationsResponse, ListTopicsRequest,
    ListTopicsResponse,
};
use dispatch_core::{invoke_typed, ClientError, Invoker, MetricsSnapshot};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ChatClient<I> {
    invoker: I,
}

impl<I: Invoker> ChatClient<I> {
    pub fn new(invoker: I) -> Self {
        Self { invoker }
    }

    pub async fn export_history(
        &self,
        req: &ExportHistoryRequest,
    ) -> Result<ExportHistoryResponse, ClientError> {
        invoke_typed(&self.invoker, "chat:exportHistory", req).await
    }

    pub async fn list_topics(&self) -> Result<ListTopicsResponse, ClientError> {
        invoke_typed(&self.invoker, "chat:listTopics", &ListTopicsRequest {}).await
    }
}

#[derive(Debug, Clone)]
pub struct SystemClient<I> {
    invoker: I,
}

impl<I: Invoker> SystemClient<I> {
    pub fn new(invoker: I) -> Self {
        Self { invoker }
    }

    pub async fn list_operations(&self) -> Result<ListOperationsResponse, ClientError> {
        invoke_typed(&self.invoker, "system:listOperations", &Value::Null).await
    }

    pub async fn metrics(&self) -> Result<MetricsSnapshot, ClientError> {
        invoke_typed(&self.invoker, "system:metrics", &Value::Null).await
    }
}
