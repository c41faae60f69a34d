//! # IPC Flows
//!
//! ```text
//! IpcRenderer ──invoke──→ InProcessIpc ──→ IpcTransport ──→ OperationRegistry ──→ Plan
//!      ↑                                                                           │
//!      └──────────────────────── ResultEnvelope ←──────────────────────────────────┘
//! ```

#[cfg(test)]
mod tests {
    use crate::fixtures::{spy_registry, Spy, CHAT_READ};
    use dispatch_core::{
        AuthContext, ErrorCode, Invoker, RegistryConfig, ResolverFn, StaticSessionResolver,
        Transport,
    };
    use dispatch_runtime::SessionTable;
    use dispatch_transport::{
        InProcessIpc, IpcEvent, IpcRenderer, IpcSessionResolver, IpcTransport,
        IpcTransportConfig, DEFAULT_IPC_CHANNEL,
    };
    use futures::future::join_all;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn wire(
        spy: &Spy,
        dev_mode: bool,
        resolver: Option<IpcSessionResolver>,
    ) -> (IpcTransport, Arc<InProcessIpc>) {
        let config = RegistryConfig {
            dev_mode,
            ..RegistryConfig::default()
        };
        let registry = spy_registry(config, spy);
        let ipc = Arc::new(InProcessIpc::new());
        let transport = IpcTransport::new(
            registry,
            Arc::clone(&ipc) as _,
            IpcTransportConfig::default().with_dev_mode(dev_mode),
            resolver,
        );
        (transport, ipc)
    }

    fn renderer(ipc: &Arc<InProcessIpc>, sender_id: u64) -> IpcRenderer {
        IpcRenderer::new(Arc::clone(ipc), DEFAULT_IPC_CHANNEL, IpcEvent::new(sender_id))
    }

    // =========================================================================
    // AUTHORIZED ROUND TRIP
    // =========================================================================

    #[tokio::test]
    async fn test_authorized_round_trip() {
        let spy = Spy::new();
        let resolver: IpcSessionResolver = Arc::new(StaticSessionResolver::new(Some(
            AuthContext::new("u1", "s1").with_capability(CHAT_READ),
        )));
        let (transport, ipc) = wire(&spy, false, Some(resolver));
        transport.start().await.unwrap();

        let client = renderer(&ipc, 1);
        let env = client
            .invoke("chat:exportHistory", json!({"topicId": "t"}))
            .await
            .unwrap();

        assert!(env.success);
        assert_eq!(env.operation, "chat:exportHistory");
        assert_eq!(env.result, Some(json!({"count": 3})));
        assert!(env.error.is_none());
        assert!(env.request_id.as_str().starts_with("ipc-"));
        assert_eq!(spy.calls(), 1);

        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_invocations_get_unique_request_ids() {
        let spy = Spy::new();
        let (transport, ipc) = wire(&spy, true, None);
        transport.start().await.unwrap();
        let client = renderer(&ipc, 7);

        let calls = (0..64).map(|i| {
            let client = client.clone();
            async move { client.invoke("chat:echo", json!({"i": i})).await.unwrap() }
        });
        let envelopes = join_all(calls).await;

        let ids: HashSet<String> = envelopes
            .iter()
            .map(|env| env.request_id.as_str().to_string())
            .collect();
        assert_eq!(ids.len(), 64);
        assert!(envelopes.iter().all(|env| env.success));
        assert_eq!(spy.calls(), 64);

        transport.stop().await.unwrap();
    }

    // =========================================================================
    // FAILURE CODES
    // =========================================================================

    #[tokio::test]
    async fn test_plan_failure_is_execution_error() {
        let spy = Spy::new();
        let (transport, ipc) = wire(&spy, true, None);
        transport.start().await.unwrap();

        let env = renderer(&ipc, 1)
            .invoke("chat:fail", json!({}))
            .await
            .unwrap();

        assert!(!env.success);
        assert!(env.result.is_none());
        let error = env.error.unwrap();
        assert_eq!(error.code, ErrorCode::ExecutionError);
        assert_eq!(error.message, "boom");
        // Dev mode carries diagnostic detail
        assert!(error.stack.is_some());

        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_operation_is_not_found() {
        let spy = Spy::new();
        let (transport, ipc) = wire(&spy, true, None);
        transport.start().await.unwrap();

        let env = renderer(&ipc, 1)
            .invoke("chat:doesNotExist", json!({}))
            .await
            .unwrap();

        assert_eq!(env.error_code(), Some(ErrorCode::NotFound));
        assert_eq!(
            env.error.unwrap().message,
            "operation not found: chat:doesNotExist"
        );
        assert_eq!(spy.calls(), 0);

        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_production_without_resolver_fails_closed() {
        let spy = Spy::new();
        let (transport, ipc) = wire(&spy, false, None);
        transport.start().await.unwrap();

        // Even an operation with no capability needs an identity
        for operation in ["chat:exportHistory", "chat:echo"] {
            let env = renderer(&ipc, 1).invoke(operation, json!({})).await.unwrap();
            assert_eq!(env.error_code(), Some(ErrorCode::Unauthorized));
            let error = env.error.unwrap();
            assert_eq!(error.message, "authentication not configured");
            assert!(error.stack.is_none());
        }
        assert_eq!(spy.calls(), 0);

        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_capability_is_unauthorized() {
        let spy = Spy::new();
        let resolver: IpcSessionResolver =
            Arc::new(StaticSessionResolver::new(Some(AuthContext::new("u1", "s1"))));
        let (transport, ipc) = wire(&spy, false, Some(resolver));
        transport.start().await.unwrap();

        let env = renderer(&ipc, 1)
            .invoke("chat:exportHistory", json!({}))
            .await
            .unwrap();
        assert_eq!(env.error_code(), Some(ErrorCode::Unauthorized));
        assert_eq!(spy.calls(), 0);

        transport.stop().await.unwrap();
    }

    // =========================================================================
    // SESSIONS
    // =========================================================================

    #[tokio::test]
    async fn test_resolver_sees_sender_identity() {
        let spy = Spy::new();
        let resolver: IpcSessionResolver = Arc::new(ResolverFn(|event: &IpcEvent| {
            (event.sender_id == 42)
                .then(|| AuthContext::new("owner", "s42").with_capability(CHAT_READ))
        }));
        let (transport, ipc) = wire(&spy, false, Some(resolver));
        transport.start().await.unwrap();

        let allowed = renderer(&ipc, 42)
            .invoke("chat:exportHistory", json!({}))
            .await
            .unwrap();
        let denied = renderer(&ipc, 43)
            .invoke("chat:exportHistory", json!({}))
            .await
            .unwrap();

        assert!(allowed.success);
        assert_eq!(denied.error_code(), Some(ErrorCode::Unauthorized));
        assert_eq!(spy.calls(), 1);

        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_session_table_revocation_takes_effect() {
        let spy = Spy::new();
        let sessions = Arc::new(SessionTable::new());
        let resolver = Arc::clone(&sessions) as IpcSessionResolver;
        let (transport, ipc) = wire(&spy, false, Some(resolver));
        transport.start().await.unwrap();

        let client = IpcRenderer::new(
            Arc::clone(&ipc),
            DEFAULT_IPC_CHANNEL,
            IpcEvent::new(9).with_session_token("tok-9"),
        );
        sessions.bind_token("tok-9", AuthContext::new("u9", "s9").with_capability(CHAT_READ));

        let before = client.invoke("chat:exportHistory", json!({})).await.unwrap();
        assert!(before.success);

        sessions.revoke_token("tok-9");
        let after = client.invoke("chat:exportHistory", json!({})).await.unwrap();
        assert_eq!(after.error_code(), Some(ErrorCode::Unauthorized));
        assert_eq!(spy.calls(), 1);

        transport.stop().await.unwrap();
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    #[tokio::test]
    async fn test_restart_reinstalls_handler() {
        let spy = Spy::new();
        let (transport, ipc) = wire(&spy, true, None);

        transport.start().await.unwrap();
        assert!(transport.start().await.is_err());
        transport.stop().await.unwrap();
        assert!(!ipc.has_handler(DEFAULT_IPC_CHANNEL));
        assert!(renderer(&ipc, 1)
            .invoke("chat:echo", json!({}))
            .await
            .is_err());

        transport.start().await.unwrap();
        let env = renderer(&ipc, 1)
            .invoke("chat:echo", json!({"again": true}))
            .await
            .unwrap();
        assert_eq!(env.result, Some(json!({"again": true})));

        transport.stop().await.unwrap();
        // Stopping twice is harmless
        transport.stop().await.unwrap();
    }
}
