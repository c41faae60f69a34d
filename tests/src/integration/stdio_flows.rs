//! # Stdio Flows
//!
//! Newline-delimited JSON in, one envelope line out per request. The same
//! registry can be fronted by the IPC transport at the same time.

#[cfg(test)]
mod tests {
    use crate::fixtures::{spy_registry, Spy, CHAT_READ};
    use dispatch_core::{
        AuthContext, ErrorCode, Invoker, RegistryConfig, ResultEnvelope, Transport,
    };
    use dispatch_runtime::SessionTable;
    use dispatch_transport::{
        InProcessIpc, IpcEvent, IpcRenderer, IpcSessionResolver, IpcTransport, IpcTransportConfig,
        StdioSessionResolver, StdioTransport, StdioTransportConfig, DEFAULT_IPC_CHANNEL,
        UNPARSED_OPERATION,
    };
    use serde_json::json;
    use std::sync::Arc;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};

    struct Pipe {
        input: DuplexStream,
        output: Lines<BufReader<DuplexStream>>,
    }

    impl Pipe {
        async fn send(&mut self, line: &str) {
            self.input.write_all(line.as_bytes()).await.unwrap();
            self.input.write_all(b"\n").await.unwrap();
        }

        async fn recv(&mut self) -> ResultEnvelope {
            let line = self.output.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }
    }

    fn stdio(
        registry: Arc<dispatch_core::OperationRegistry>,
        config: StdioTransportConfig,
        sessions: Option<Arc<SessionTable>>,
    ) -> (StdioTransport, Pipe) {
        let (input, transport_in) = duplex(8192);
        let (transport_out, output) = duplex(8192);
        let transport = StdioTransport::new(
            registry,
            config,
            BufReader::new(transport_in),
            transport_out,
            sessions.map(|s| s as StdioSessionResolver),
        );
        let pipe = Pipe {
            input,
            output: BufReader::new(output).lines(),
        };
        (transport, pipe)
    }

    // =========================================================================
    // ORDERING AND SHAPE
    // =========================================================================

    #[tokio::test]
    async fn test_pipelined_lines_answered_in_order() {
        let spy = Spy::new();
        let registry = spy_registry(RegistryConfig::development(), &spy);
        let (transport, mut pipe) = stdio(
            registry,
            StdioTransportConfig::default().with_dev_mode(true),
            None,
        );
        transport.start().await.unwrap();

        for i in 0..5 {
            pipe.send(&format!(
                r#"{{"operation":"chat:echo","request":{{"i":{}}}}}"#,
                i
            ))
            .await;
        }
        for i in 0..5 {
            let env = pipe.recv().await;
            assert!(env.success);
            assert_eq!(env.result, Some(json!({"i": i})));
            assert!(env.timing.is_some());
        }

        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_lines_do_not_stop_the_loop() {
        let spy = Spy::new();
        let registry = spy_registry(RegistryConfig::development(), &spy);
        let (transport, mut pipe) = stdio(
            registry,
            StdioTransportConfig::default().with_dev_mode(true),
            None,
        );
        transport.start().await.unwrap();

        pipe.send("not json").await;
        pipe.send(r#"{"operation":""}"#).await;
        pipe.send(r#"{"operation":"chat:exportHistory"}"#).await;

        let first = pipe.recv().await;
        assert_eq!(first.operation, UNPARSED_OPERATION);
        assert_eq!(first.error_code(), Some(ErrorCode::InvalidRequest));

        let second = pipe.recv().await;
        assert_eq!(second.error_code(), Some(ErrorCode::InvalidRequest));

        let third = pipe.recv().await;
        assert!(third.success);
        assert_eq!(third.result, Some(json!({"count": 3})));
        assert_eq!(spy.calls(), 1);

        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_utf8_line_answered_and_loop_continues() {
        let spy = Spy::new();
        let registry = spy_registry(RegistryConfig::development(), &spy);
        let (transport, mut pipe) = stdio(
            Arc::clone(&registry),
            StdioTransportConfig::default().with_dev_mode(true),
            None,
        );
        transport.start().await.unwrap();

        pipe.input
            .write_all(b"{\"operation\":\"\xff\xfe\"}\n")
            .await
            .unwrap();
        pipe.send(r#"{"operation":"chat:exportHistory"}"#).await;

        let rejected = pipe.recv().await;
        assert_eq!(rejected.operation, UNPARSED_OPERATION);
        assert_eq!(rejected.error_code(), Some(ErrorCode::InvalidRequest));

        let answered = pipe.recv().await;
        assert!(answered.success);
        assert!(transport.is_running());
        assert_eq!(spy.calls(), 1);
        assert_eq!(
            registry.metrics().failures(ErrorCode::InvalidRequest),
            1
        );

        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_line_rejected() {
        let spy = Spy::new();
        let registry = spy_registry(RegistryConfig::development(), &spy);
        let config = StdioTransportConfig {
            max_line_bytes: 64,
            ..StdioTransportConfig::default().with_dev_mode(true)
        };
        let (transport, mut pipe) = stdio(registry, config, None);
        transport.start().await.unwrap();

        let padding = "x".repeat(128);
        pipe.send(&format!(
            r#"{{"operation":"chat:echo","request":{{"pad":"{}"}}}}"#,
            padding
        ))
        .await;

        let env = pipe.recv().await;
        assert_eq!(env.error_code(), Some(ErrorCode::InvalidRequest));
        assert_eq!(spy.calls(), 0);

        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_end_of_input_closes_transport() {
        let spy = Spy::new();
        let registry = spy_registry(RegistryConfig::development(), &spy);
        let (transport, pipe) = stdio(
            registry,
            StdioTransportConfig::default().with_dev_mode(true),
            None,
        );
        transport.start().await.unwrap();

        drop(pipe.input);
        transport.closed().await;

        transport.stop().await.unwrap();
        assert!(!transport.is_running());
    }

    // =========================================================================
    // SHARED REGISTRY
    // =========================================================================

    #[tokio::test]
    async fn test_ipc_and_stdio_share_one_registry() {
        let spy = Spy::new();
        let registry = spy_registry(RegistryConfig::default(), &spy);
        let sessions = Arc::new(SessionTable::new());
        sessions.bind_token(
            "operator",
            AuthContext::new("op", "stdio").with_capability(CHAT_READ),
        );
        sessions.bind_sender(
            3,
            AuthContext::new("ui", "window-3").with_capability(CHAT_READ),
        );

        let ipc = Arc::new(InProcessIpc::new());
        let ipc_transport = IpcTransport::new(
            Arc::clone(&registry),
            Arc::clone(&ipc) as _,
            IpcTransportConfig::default(),
            Some(Arc::clone(&sessions) as IpcSessionResolver),
        );
        let (stdio_transport, mut pipe) = stdio(
            Arc::clone(&registry),
            StdioTransportConfig::default(),
            Some(Arc::clone(&sessions)),
        );
        ipc_transport.start().await.unwrap();
        stdio_transport.start().await.unwrap();

        let from_ipc = IpcRenderer::new(Arc::clone(&ipc), DEFAULT_IPC_CHANNEL, IpcEvent::new(3))
            .invoke("chat:exportHistory", json!({}))
            .await
            .unwrap();
        pipe.send(r#"{"operation":"chat:exportHistory","token":"operator"}"#)
            .await;
        let from_stdio = pipe.recv().await;
        pipe.send(r#"{"operation":"chat:exportHistory","token":"stranger"}"#)
            .await;
        let rejected = pipe.recv().await;

        assert!(from_ipc.success);
        assert!(from_stdio.success);
        assert_eq!(rejected.error_code(), Some(ErrorCode::Unauthorized));
        assert!(from_ipc.request_id.as_str().starts_with("ipc-"));
        assert!(from_stdio.request_id.as_str().starts_with("stdio-"));
        assert_eq!(spy.calls(), 2);

        let snapshot = registry.metrics().snapshot();
        assert_eq!(snapshot.invocations_total, 3);
        assert_eq!(snapshot.failures_by_code.get("UNAUTHORIZED"), Some(&1));

        stdio_transport.stop().await.unwrap();
        ipc_transport.stop().await.unwrap();
    }
}
