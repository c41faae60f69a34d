//! # Dispatch Transports
//!
//! Concrete [`dispatch_core::Transport`] implementations.
//!
//! - [`ipc::IpcTransport`]: one named request/response channel on an
//!   [`ipc::IpcMain`] host.
//! - [`stdio::StdioTransport`]: newline-delimited JSON over any async
//!   reader/writer pair, stdin/stdout by default.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod ipc;
pub mod stdio;

pub use config::{
    IpcTransportConfig, StdioTransportConfig, DEFAULT_IPC_CHANNEL, DEFAULT_MAX_LINE_BYTES,
};
pub use ipc::{
    ChannelHandler, InProcessIpc, IpcError, IpcEvent, IpcMain, IpcRenderer, IpcSessionResolver,
    IpcTransport,
};
pub use stdio::{
    StdioContext, StdioRequest, StdioSessionResolver, StdioTransport, UNPARSED_OPERATION,
};
