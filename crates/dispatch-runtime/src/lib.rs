//! # Dispatch Runtime
//!
//! Process wiring for the dispatch core:
//!
//! - [`config`]: `RuntimeConfig` from defaults, an optional JSON file and
//!   `DISPATCH_*` environment variables
//! - [`bootstrap`]: registry + Plans + IPC transport as one unit
//! - [`sessions`]: the session table used as the production resolver
//! - [`plans`]: the reference chat Plan and registry introspection
//! - [`client`]: typed clients over any `Invoker`

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod bootstrap;
pub mod client;
pub mod config;
pub mod plans;
pub mod sessions;

pub use bootstrap::{Bootstrap, BootstrapDeps, BootstrapError, SystemHandles};
pub use client::{ChatClient, SystemClient};
pub use config::{ConfigLoadError, Environment, RuntimeConfig};
pub use sessions::SessionTable;
