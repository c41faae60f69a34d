//! Request/response IPC: channel host plus the transport bound to it.

pub mod channel;
pub mod transport;

pub use channel::{ChannelHandler, InProcessIpc, IpcError, IpcEvent, IpcMain, IpcRenderer};
pub use transport::{IpcSessionResolver, IpcTransport};
