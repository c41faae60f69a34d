//! # Dispatch Core
//!
//! Transport-agnostic operation dispatch: a registry mapping `domain:method`
//! keys to Plans, capability-based authorization, uniform result envelopes,
//! and the contract every transport implements.
//!
//! ```text
//! caller → Transport::invoke_operation
//!            → Transport::extract_auth_context
//!            → OperationRegistry::invoke_with_id
//!                → Plan method
//!            ← ResultEnvelope
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use dispatch_core::{OperationRecord, OperationRegistry, PlanTable, RegistryConfig};
//!
//! let registry = OperationRegistry::new(RegistryConfig::default());
//! let plan = Arc::new(PlanTable::new("chat").method("exportHistory", export));
//! registry.register(OperationRecord::new("chat", "exportHistory", plan).with_capability("chat:read"))?;
//! let envelope = registry.invoke("chat:exportHistory", json!({}), Some(&auth)).await;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod metrics;
pub mod ports;
pub mod registry;
pub mod transport;

pub use domain::*;
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use ports::*;
pub use registry::{LocalInvoker, OperationRecord, OperationRegistry, DEFAULT_VERSION};
pub use transport::{Transport, TransportCore, TransportError};
