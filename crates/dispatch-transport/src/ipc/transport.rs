//! # IPC Transport
//!
//! Binds the [`Transport`] contract to one named channel of an [`IpcMain`].
//!
//! - `start()` installs exactly one handler on the channel.
//! - `stop()` removes it; stopping a stopped transport does nothing.
//! - Auth comes from the session resolver when one is configured. Without
//!   one, dev mode grants the development identity (with a warning on every
//!   call) and production fails closed with `UNAUTHORIZED`.

use super::channel::{ChannelHandler, IpcEvent, IpcMain};
use crate::config::IpcTransportConfig;
use async_trait::async_trait;
use dispatch_core::{
    AuthContext, DispatchError, ErrorCode, ErrorDetail, OperationRegistry, RequestId,
    ResultEnvelope, SessionResolver, Transport, TransportCore, TransportError,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Resolves an [`IpcEvent`] to the caller's identity.
pub type IpcSessionResolver = Arc<dyn SessionResolver<IpcEvent>>;

struct IpcShared {
    core: TransportCore,
    ipc: Arc<dyn IpcMain>,
    channel: String,
    session_resolver: Option<IpcSessionResolver>,
    running: Mutex<bool>,
}

impl Drop for IpcShared {
    fn drop(&mut self) {
        if *self.running.get_mut() {
            self.ipc.remove_handler(&self.channel);
        }
    }
}

/// Cheap to clone; clones share lifecycle state.
#[derive(Clone)]
pub struct IpcTransport {
    shared: Arc<IpcShared>,
}

impl IpcTransport {
    pub fn new(
        registry: Arc<OperationRegistry>,
        ipc: Arc<dyn IpcMain>,
        config: IpcTransportConfig,
        session_resolver: Option<IpcSessionResolver>,
    ) -> Self {
        let IpcTransportConfig { channel, transport } = config;
        Self {
            shared: Arc::new(IpcShared {
                core: TransportCore::new(registry, transport),
                ipc,
                channel,
                session_resolver,
                running: Mutex::new(false),
            }),
        }
    }

    pub fn channel(&self) -> &str {
        &self.shared.channel
    }

    pub fn has_session_resolver(&self) -> bool {
        self.shared.session_resolver.is_some()
    }
}

#[async_trait]
impl Transport for IpcTransport {
    type Context = IpcEvent;

    fn core(&self) -> &TransportCore {
        &self.shared.core
    }

    async fn extract_auth_context(&self, event: &IpcEvent) -> anyhow::Result<Option<AuthContext>> {
        if let Some(resolver) = &self.shared.session_resolver {
            return Ok(resolver.resolve(event).await);
        }
        if self.core().dev_mode() {
            warn!(
                sender_id = event.sender_id,
                "No session resolver configured; granting development identity"
            );
            return Ok(Some(AuthContext::development()));
        }
        Err(DispatchError::authentication_not_configured().into())
    }

    async fn start(&self) -> Result<(), TransportError> {
        let mut running = self.shared.running.lock();
        if *running {
            return Err(TransportError::AlreadyRunning);
        }

        let handler = Arc::new(IpcChannelHandler {
            shared: Arc::downgrade(&self.shared),
        });
        self.shared
            .ipc
            .handle(&self.shared.channel, handler)
            .map_err(|e| TransportError::Bind(e.to_string()))?;
        *running = true;

        info!(channel = %self.shared.channel, "IPC transport started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let mut running = self.shared.running.lock();
        if !*running {
            return Ok(());
        }
        self.shared.ipc.remove_handler(&self.shared.channel);
        *running = false;

        info!(channel = %self.shared.channel, "IPC transport stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        *self.shared.running.lock()
    }
}

impl fmt::Debug for IpcTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpcTransport")
            .field("channel", &self.shared.channel)
            .field("dev_mode", &self.shared.core.dev_mode())
            .field("session_resolver", &self.has_session_resolver())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Installed on the channel while the transport runs. Holds a weak reference
/// so the channel host does not keep the transport alive.
struct IpcChannelHandler {
    shared: Weak<IpcShared>,
}

#[async_trait]
impl ChannelHandler for IpcChannelHandler {
    async fn handle(&self, event: IpcEvent, operation: String, request: Value) -> ResultEnvelope {
        let Some(shared) = self.shared.upgrade() else {
            return ResultEnvelope::failure(
                RequestId::new("ipc-detached"),
                operation,
                ErrorDetail::new(ErrorCode::UnknownError, "transport no longer available"),
            );
        };

        let transport = IpcTransport { shared };
        let request_id = transport.generate_request_id();
        debug!(
            operation = %operation,
            request_id = %request_id,
            sender_id = event.sender_id,
            "IPC request"
        );
        transport
            .invoke_operation(&operation, request, &event, request_id)
            .await
    }
}
