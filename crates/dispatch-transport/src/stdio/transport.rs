//! # Stdio Transport
//!
//! Serves newline-delimited JSON requests from an `AsyncBufRead` and writes
//! one envelope line per request to an `AsyncWrite`. Lines are handled in
//! order, one at a time. Malformed lines are answered with an
//! `INVALID_REQUEST` envelope for operation `<unparsed>`. That includes lines
//! that are not UTF-8 and lines over `max_line_bytes`; at most that many bytes
//! of one line are buffered.
//!
//! The serve loop ends on end of input, on a write failure, or on `stop()`.
//! After end of input the transport stays running until `stop()` is called;
//! [`StdioTransport::closed`] resolves when the loop has ended.

use super::codec::{self, UNPARSED_OPERATION};
use crate::config::StdioTransportConfig;
use async_trait::async_trait;
use dispatch_core::{
    AuthContext, DispatchError, OperationRegistry, ResultEnvelope, SessionResolver, Transport,
    TransportCore, TransportError,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Per-line context used for authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StdioContext {
    pub token: Option<String>,
}

pub type StdioSessionResolver = Arc<dyn SessionResolver<StdioContext>>;

type BoxedReader = Box<dyn AsyncBufRead + Unpin + Send>;
type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

struct StdioIo {
    reader: BoxedReader,
    writer: BoxedWriter,
}

#[derive(Default)]
struct ServeState {
    running: bool,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<StdioIo>>,
}

struct StdioShared {
    core: TransportCore,
    max_line_bytes: usize,
    session_resolver: Option<StdioSessionResolver>,
    // Streams live here while stopped and inside the serve task while running
    io: Mutex<Option<StdioIo>>,
    state: Mutex<ServeState>,
    closed: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct StdioTransport {
    shared: Arc<StdioShared>,
}

impl StdioTransport {
    pub fn new<R, W>(
        registry: Arc<OperationRegistry>,
        config: StdioTransportConfig,
        reader: R,
        writer: W,
        session_resolver: Option<StdioSessionResolver>,
    ) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let StdioTransportConfig {
            max_line_bytes,
            transport,
        } = config;
        let (closed, _) = watch::channel(false);
        Self {
            shared: Arc::new(StdioShared {
                core: TransportCore::new(registry, transport),
                max_line_bytes,
                session_resolver,
                io: Mutex::new(Some(StdioIo {
                    reader: Box::new(reader),
                    writer: Box::new(writer),
                })),
                state: Mutex::new(ServeState::default()),
                closed,
            }),
        }
    }

    /// Transport over the process's stdin and stdout.
    pub fn stdio(
        registry: Arc<OperationRegistry>,
        config: StdioTransportConfig,
        session_resolver: Option<StdioSessionResolver>,
    ) -> Self {
        Self::new(
            registry,
            config,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            session_resolver,
        )
    }

    /// Resolves once the serve loop has ended.
    pub async fn closed(&self) {
        let mut rx = self.shared.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    async fn handle_line(&self, line: &str) -> ResultEnvelope {
        match codec::decode_line(line, self.shared.max_line_bytes) {
            Ok(req) => {
                let request_id = self.generate_request_id();
                let context = StdioContext { token: req.token };
                self.invoke_operation(&req.operation, req.request, &context, request_id)
                    .await
            }
            Err(err) => self.reject_line(err),
        }
    }

    fn reject_line(&self, err: DispatchError) -> ResultEnvelope {
        let request_id = self.generate_request_id();
        warn!(request_id = %request_id, error = %err, "Rejected stdio request line");
        let err = anyhow::Error::from(err);
        self.format_error(&err, request_id, UNPARSED_OPERATION)
    }

    async fn serve(self, mut io: StdioIo, mut shutdown: watch::Receiver<bool>) -> StdioIo {
        let max_line_bytes = self.shared.max_line_bytes;
        let mut line = Vec::new();
        loop {
            let frame = tokio::select! {
                _ = shutdown.changed() => break,
                frame = read_frame(&mut io.reader, &mut line, max_line_bytes) => frame,
            };

            let envelope = match frame {
                Ok(Frame::Eof) => {
                    debug!("stdio input closed");
                    break;
                }
                Ok(Frame::Oversized) => self.reject_line(DispatchError::InvalidRequest(format!(
                    "request line exceeds {} bytes",
                    max_line_bytes
                ))),
                Ok(Frame::Line) => match std::str::from_utf8(&line) {
                    Ok(text) => {
                        let trimmed = text.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        self.handle_line(trimmed).await
                    }
                    Err(e) => self.reject_line(DispatchError::InvalidRequest(format!(
                        "request line is not valid UTF-8: {}",
                        e
                    ))),
                },
                Err(e) => {
                    error!(error = %e, "Failed to read stdio request");
                    break;
                }
            };

            if let Err(e) = write_envelope(&mut io.writer, &envelope).await {
                error!(error = %e, "Failed to write stdio response");
                break;
            }
        }

        self.shared.closed.send_replace(true);
        io
    }
}

/// Outcome of reading one request line.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    /// A complete line (without its newline) is in the buffer.
    Line,
    /// The line was longer than the limit and has been skipped.
    Oversized,
    Eof,
}

/// Read one newline-terminated line into `line`, holding at most
/// `max_line_bytes` in memory. Bytes past the limit are discarded up to the
/// next newline.
async fn read_frame<R>(
    reader: &mut R,
    line: &mut Vec<u8>,
    max_line_bytes: usize,
) -> std::io::Result<Frame>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    line.clear();
    let mut oversized = false;
    let mut read_any = false;
    loop {
        let (used, complete) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(match (oversized, read_any) {
                    (true, _) => Frame::Oversized,
                    (false, true) => Frame::Line,
                    (false, false) => Frame::Eof,
                });
            }
            let (chunk, used, complete) = match available.iter().position(|b| *b == b'\n') {
                Some(i) => (&available[..i], i + 1, true),
                None => (available, available.len(), false),
            };
            if !oversized {
                if line.len() + chunk.len() > max_line_bytes {
                    oversized = true;
                    line.clear();
                } else {
                    line.extend_from_slice(chunk);
                }
            }
            (used, complete)
        };
        reader.consume(used);
        read_any = true;

        if complete {
            return Ok(if oversized { Frame::Oversized } else { Frame::Line });
        }
    }
}

async fn write_envelope(
    writer: &mut BoxedWriter,
    envelope: &ResultEnvelope,
) -> Result<(), TransportError> {
    let line = codec::encode_envelope(envelope).map_err(std::io::Error::from)?;
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[async_trait]
impl Transport for StdioTransport {
    type Context = StdioContext;

    fn core(&self) -> &TransportCore {
        &self.shared.core
    }

    async fn extract_auth_context(
        &self,
        context: &StdioContext,
    ) -> anyhow::Result<Option<AuthContext>> {
        if let Some(resolver) = &self.shared.session_resolver {
            return Ok(resolver.resolve(context).await);
        }
        if self.core().dev_mode() {
            warn!("No session resolver configured; granting development identity");
            return Ok(Some(AuthContext::development()));
        }
        Err(DispatchError::authentication_not_configured().into())
    }

    async fn start(&self) -> Result<(), TransportError> {
        let mut state = self.shared.state.lock();
        if state.running {
            return Err(TransportError::AlreadyRunning);
        }
        let io = self
            .shared
            .io
            .lock()
            .take()
            .ok_or_else(|| TransportError::Bind("stdio streams unavailable".to_string()))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shared.closed.send_replace(false);
        let task = tokio::spawn(self.clone().serve(io, shutdown_rx));

        state.running = true;
        state.shutdown = Some(shutdown_tx);
        state.task = Some(task);

        info!(max_line_bytes = self.shared.max_line_bytes, "Stdio transport started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let (shutdown, task) = {
            let mut state = self.shared.state.lock();
            if !state.running {
                return Ok(());
            }
            state.running = false;
            (state.shutdown.take(), state.task.take())
        };

        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(true);
        }
        if let Some(task) = task {
            match task.await {
                Ok(io) => *self.shared.io.lock() = Some(io),
                Err(e) => error!(error = %e, "Stdio serve task failed"),
            }
        }

        info!("Stdio transport stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }
}

impl fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdioTransport")
            .field("max_line_bytes", &self.shared.max_line_bytes)
            .field("dev_mode", &self.shared.core.dev_mode())
            .field("running", &self.is_running())
            .finish()
    }
}
