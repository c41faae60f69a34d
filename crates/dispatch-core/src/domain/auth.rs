//! Per-invocation authorization context.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Capability that authorizes every operation.
pub const WILDCARD_CAPABILITY: &str = "*";

/// Identity used by the development fallback.
pub const DEV_USER_ID: &str = "dev-user";
pub const DEV_SESSION_ID: &str = "dev-session";

/// Caller identity and capabilities, derived fresh by a transport for each
/// invocation and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub user_id: String,
    pub session_id: String,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            capabilities: BTreeSet::new(),
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Fixed development identity holding the wildcard capability.
    pub fn development() -> Self {
        Self::new(DEV_USER_ID, DEV_SESSION_ID).with_capability(WILDCARD_CAPABILITY)
    }

    /// True if the context holds `capability` or the wildcard.
    pub fn grants(&self, capability: &str) -> bool {
        self.capabilities.contains(WILDCARD_CAPABILITY) || self.capabilities.contains(capability)
    }
}
