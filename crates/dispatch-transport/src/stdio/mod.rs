//! Newline-delimited JSON over stdin/stdout.

pub mod codec;
pub mod transport;

pub use codec::{StdioRequest, UNPARSED_OPERATION};
pub use transport::{StdioContext, StdioSessionResolver, StdioTransport};
