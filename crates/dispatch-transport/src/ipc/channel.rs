//! Channel host abstraction for request/response IPC.
//!
//! [`IpcMain`] owns named channels, each with at most one handler. A handler
//! receives `(event, operation, request)` and resolves to a
//! [`ResultEnvelope`]. [`InProcessIpc`] is the in-process host used by the
//! runtime and by tests; [`IpcRenderer`] is the caller side.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dispatch_core::{ClientError, Invoker, ResultEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Sender-side context delivered with every IPC request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpcEvent {
    /// Id of the sending renderer.
    pub sender_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl IpcEvent {
    pub fn new(sender_id: u64) -> Self {
        Self {
            sender_id,
            ..Default::default()
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn with_frame_url(mut self, url: impl Into<String>) -> Self {
        self.frame_url = Some(url.into());
        self
    }
}

#[async_trait]
pub trait ChannelHandler: Send + Sync {
    async fn handle(&self, event: IpcEvent, operation: String, request: Value) -> ResultEnvelope;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpcError {
    #[error("channel already has a handler: {0}")]
    HandlerExists(String),

    #[error("no handler registered for channel: {0}")]
    NoHandler(String),
}

/// Owner of named request/response channels.
pub trait IpcMain: Send + Sync {
    /// Install the handler for `channel`. Fails if one is already installed.
    fn handle(&self, channel: &str, handler: Arc<dyn ChannelHandler>) -> Result<(), IpcError>;

    /// Remove the handler for `channel`; returns whether one was installed.
    fn remove_handler(&self, channel: &str) -> bool;
}

/// In-process channel host.
#[derive(Default)]
pub struct InProcessIpc {
    handlers: DashMap<String, Arc<dyn ChannelHandler>>,
}

impl InProcessIpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_handler(&self, channel: &str) -> bool {
        self.handlers.contains_key(channel)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Send a request on `channel` and await the envelope.
    pub async fn invoke(
        &self,
        channel: &str,
        event: IpcEvent,
        operation: &str,
        request: Value,
    ) -> Result<ResultEnvelope, IpcError> {
        // Clone out of the map so no shard lock is held across the await
        let handler = self
            .handlers
            .get(channel)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| IpcError::NoHandler(channel.to_string()))?;

        Ok(handler.handle(event, operation.to_string(), request).await)
    }
}

impl IpcMain for InProcessIpc {
    fn handle(&self, channel: &str, handler: Arc<dyn ChannelHandler>) -> Result<(), IpcError> {
        match self.handlers.entry(channel.to_string()) {
            Entry::Occupied(_) => Err(IpcError::HandlerExists(channel.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(handler);
                debug!(channel, "IPC handler installed");
                Ok(())
            }
        }
    }

    fn remove_handler(&self, channel: &str) -> bool {
        let removed = self.handlers.remove(channel).is_some();
        if removed {
            debug!(channel, "IPC handler removed");
        }
        removed
    }
}

impl fmt::Debug for InProcessIpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("InProcessIpc")
            .field("channels", &channels)
            .finish()
    }
}

/// Caller side of one channel, bound to a fixed sender event.
#[derive(Debug, Clone)]
pub struct IpcRenderer {
    ipc: Arc<InProcessIpc>,
    channel: String,
    event: IpcEvent,
}

impl IpcRenderer {
    pub fn new(ipc: Arc<InProcessIpc>, channel: impl Into<String>, event: IpcEvent) -> Self {
        Self {
            ipc,
            channel: channel.into(),
            event,
        }
    }

    pub fn event(&self) -> &IpcEvent {
        &self.event
    }
}

#[async_trait]
impl Invoker for IpcRenderer {
    async fn invoke(&self, operation: &str, request: Value) -> Result<ResultEnvelope, ClientError> {
        self.ipc
            .invoke(&self.channel, self.event.clone(), operation, request)
            .await
            .map_err(|e| ClientError::Channel(e.to_string()))
    }
}
