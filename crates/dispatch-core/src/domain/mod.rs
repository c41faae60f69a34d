//! Domain layer: envelopes, errors, identities and configuration.

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod operation;
pub mod request_id;

pub use auth::{AuthContext, DEV_SESSION_ID, DEV_USER_ID, WILDCARD_CAPABILITY};
pub use config::{ConfigError, RegistryConfig, TransportConfig};
pub use envelope::{ErrorDetail, ResultEnvelope, Timing};
pub use error::{codes, DispatchError, ErrorCode, RegistrationError};
pub use operation::{OperationInfo, OperationKey};
pub use request_id::{RequestId, RequestIdGenerator};
