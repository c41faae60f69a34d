//! Session table: the production session resolver.
//!
//! The host binds an IPC sender (or a bearer token) to an [`AuthContext`] at
//! login and unbinds it at logout. Lookups return a fresh clone per call.

use async_trait::async_trait;
use dashmap::DashMap;
use dispatch_core::{AuthContext, SessionResolver};
use dispatch_transport::{IpcEvent, StdioContext};
use tracing::debug;

#[derive(Debug, Default)]
pub struct SessionTable {
    by_sender: DashMap<u64, AuthContext>,
    by_token: DashMap<String, AuthContext>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_sender(&self, sender_id: u64, context: AuthContext) {
        debug!(sender_id, user_id = %context.user_id, "Session bound to sender");
        self.by_sender.insert(sender_id, context);
    }

    pub fn unbind_sender(&self, sender_id: u64) -> Option<AuthContext> {
        self.by_sender.remove(&sender_id).map(|(_, ctx)| ctx)
    }

    pub fn bind_token(&self, token: impl Into<String>, context: AuthContext) {
        debug!(user_id = %context.user_id, "Session bound to token");
        self.by_token.insert(token.into(), context);
    }

    pub fn revoke_token(&self, token: &str) -> Option<AuthContext> {
        self.by_token.remove(token).map(|(_, ctx)| ctx)
    }

    pub fn lookup_sender(&self, sender_id: u64) -> Option<AuthContext> {
        self.by_sender.get(&sender_id).map(|entry| entry.value().clone())
    }

    pub fn lookup_token(&self, token: &str) -> Option<AuthContext> {
        self.by_token.get(token).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.by_sender.len() + self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionResolver<IpcEvent> for SessionTable {
    /// Sender binding first, then the event's session token.
    async fn resolve(&self, event: &IpcEvent) -> Option<AuthContext> {
        self.lookup_sender(event.sender_id).or_else(|| {
            event
                .session_token
                .as_deref()
                .and_then(|token| self.lookup_token(token))
        })
    }
}

#[async_trait]
impl SessionResolver<StdioContext> for SessionTable {
    async fn resolve(&self, context: &StdioContext) -> Option<AuthContext> {
        context
            .token
            .as_deref()
            .and_then(|token| self.lookup_token(token))
    }
}
