//! # System Bootstrap
//!
//! Composes one registry, the Plans and the IPC transport into a running
//! unit, and tears it down symmetrically.
//!
//! ```text
//! initialize(deps)
//!   ├── validate config; refuse production without a session resolver
//!   ├── OperationRegistry::new(dev_mode from environment)
//!   ├── register system:* and every supplied operation
//!   ├── IpcTransport::new(channel) → start()
//!   └── SystemHandles { registry, transport }
//!
//! shutdown()
//!   └── transport.stop(), release handles
//! ```
//!
//! A [`Bootstrap`] holds at most one running system. A second `initialize`
//! fails with [`BootstrapError::AlreadyInitialized`] until `shutdown` runs.
//! [`Bootstrap::global`] is the process-wide instance.

use crate::config::RuntimeConfig;
use crate::plans::system_operations;
use dispatch_core::{
    ConfigError, OperationRecord, OperationRegistry, RegistrationError, Transport, TransportError,
};
use dispatch_transport::{IpcMain, IpcSessionResolver, IpcTransport};
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("system already initialized")]
    AlreadyInitialized,

    #[error("no session resolver configured outside dev mode")]
    MissingSessionResolver,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("operation registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Everything `initialize` needs.
pub struct BootstrapDeps {
    pub config: RuntimeConfig,
    pub ipc: Arc<dyn IpcMain>,
    pub session_resolver: Option<IpcSessionResolver>,
    pub operations: Vec<OperationRecord>,
}

impl fmt::Debug for BootstrapDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapDeps")
            .field("config", &self.config)
            .field("session_resolver", &self.session_resolver.is_some())
            .field("operations", &self.operations)
            .finish()
    }
}

/// Handles to the running system.
#[derive(Debug, Clone)]
pub struct SystemHandles {
    pub registry: Arc<OperationRegistry>,
    pub transport: IpcTransport,
}

#[derive(Debug, Default)]
pub struct Bootstrap {
    state: Mutex<Option<SystemHandles>>,
}

impl Bootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static Bootstrap {
        static GLOBAL: OnceLock<Bootstrap> = OnceLock::new();
        GLOBAL.get_or_init(Bootstrap::new)
    }

    pub async fn initialize(&self, deps: BootstrapDeps) -> Result<SystemHandles, BootstrapError> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Err(BootstrapError::AlreadyInitialized);
        }

        let BootstrapDeps {
            config,
            ipc,
            session_resolver,
            operations,
        } = deps;

        config.validate()?;
        let dev_mode = config.dev_mode();
        if !dev_mode && session_resolver.is_none() {
            return Err(BootstrapError::MissingSessionResolver);
        }

        let registry = Arc::new(OperationRegistry::new(config.registry_config()));
        registry.register_all(system_operations(&registry))?;
        registry.register_all(operations)?;

        let transport = IpcTransport::new(
            Arc::clone(&registry),
            ipc,
            config.ipc_config(),
            session_resolver,
        );
        transport.start().await?;

        info!(
            channel = transport.channel(),
            operations = registry.len(),
            dev_mode,
            "Dispatch system initialized"
        );

        let handles = SystemHandles {
            registry,
            transport,
        };
        *state = Some(handles.clone());
        Ok(handles)
    }

    /// Stop the transport and release the handles. Not initialized is success.
    pub async fn shutdown(&self) -> Result<(), BootstrapError> {
        let handles = self.state.lock().await.take();
        if let Some(handles) = handles {
            handles.transport.stop().await?;
            info!(channel = handles.transport.channel(), "Dispatch system shut down");
        }
        Ok(())
    }

    pub async fn handles(&self) -> Option<SystemHandles> {
        self.state.lock().await.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.is_some()
    }
}
