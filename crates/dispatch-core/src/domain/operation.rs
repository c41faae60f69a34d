//! Operation keys (`domain:method`) and their listing form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between domain and method.
pub const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey(String);

impl OperationKey {
    pub fn new(domain: &str, method: &str) -> Self {
        Self(format!("{}{}{}", domain, SEPARATOR, method))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Introspection record returned by `OperationRegistry::list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationInfo {
    pub operation: String,
    pub version: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_capability: Option<String>,
}
