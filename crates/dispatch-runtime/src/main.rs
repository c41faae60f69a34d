//! Dispatch runtime binary.
//!
//! Bootstraps the registry and IPC channel, then serves the stdio transport
//! against the same registry until stdin closes or Ctrl-C.

use anyhow::Result;
use dispatch_core::{AuthContext, Transport, WILDCARD_CAPABILITY};
use dispatch_runtime::plans::{chat_operations, ChatService, InMemoryConversationStore};
use dispatch_runtime::{Bootstrap, BootstrapDeps, RuntimeConfig, SessionTable};
use dispatch_telemetry::{init_telemetry, TelemetryConfig};
use dispatch_transport::{InProcessIpc, IpcSessionResolver, StdioSessionResolver, StdioTransport};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env())?;

    let config = RuntimeConfig::from_env()?;
    let dev_mode = config.dev_mode();

    // Production resolves every caller through the session table; dev mode
    // leaves resolvers unset so the transports fall back to the dev identity.
    let sessions = Arc::new(SessionTable::new());
    if let Some(token) = &config.operator_token {
        sessions.bind_token(
            token.clone(),
            AuthContext::new("operator", "operator-session").with_capability(WILDCARD_CAPABILITY),
        );
    } else if !dev_mode {
        warn!("DISPATCH_OPERATOR_TOKEN not set; stdio requests will be unauthorized");
    }
    let ipc_resolver: Option<IpcSessionResolver> =
        (!dev_mode).then(|| Arc::clone(&sessions) as IpcSessionResolver);
    let stdio_resolver: Option<StdioSessionResolver> =
        (!dev_mode).then(|| Arc::clone(&sessions) as StdioSessionResolver);

    let store = Arc::new(InMemoryConversationStore::new());
    let chat = Arc::new(ChatService::new(store));

    let bootstrap = Bootstrap::global();
    let handles = bootstrap
        .initialize(BootstrapDeps {
            config: config.clone(),
            ipc: Arc::new(InProcessIpc::new()),
            session_resolver: ipc_resolver,
            operations: chat_operations(chat),
        })
        .await?;

    for op in handles.registry.list() {
        info!(operation = %op.operation, version = %op.version, "Operation available");
    }

    if config.serve_stdio {
        let stdio = StdioTransport::stdio(
            Arc::clone(&handles.registry),
            config.stdio_config(),
            stdio_resolver,
        );
        stdio.start().await?;
        info!("Serving stdio. Close stdin or press Ctrl+C to stop.");

        tokio::select! {
            _ = stdio.closed() => info!("stdin closed"),
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Interrupted");
            }
        }
        stdio.stop().await?;
    } else {
        info!("Dispatch runtime is running. Press Ctrl+C to stop.");
        tokio::signal::ctrl_c().await?;
    }

    bootstrap.shutdown().await?;
    info!(metrics = %handles.registry.metrics().to_json(), "Dispatch runtime stopped");
    Ok(())
}
