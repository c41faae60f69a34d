//! Registry introspection Plan.
//!
//! - `system:listOperations` (no capability): `OperationRegistry::list()`.
//! - `system:metrics` (`system:read`): dispatch counters.
//!
//! The Plan holds a weak registry reference; the registry owns the Plan.

use anyhow::anyhow;
use dispatch_core::{
    MetricsSnapshot, OperationInfo, OperationRecord, OperationRegistry, Plan, PlanTable,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Weak};

pub const SYSTEM_DOMAIN: &str = "system";
pub const SYSTEM_READ: &str = "system:read";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListOperationsResponse {
    pub operations: Vec<OperationInfo>,
}

fn upgrade(registry: &Weak<OperationRegistry>) -> anyhow::Result<Arc<OperationRegistry>> {
    registry
        .upgrade()
        .ok_or_else(|| anyhow!("operation registry is no longer available"))
}

pub fn system_plan(registry: &Arc<OperationRegistry>) -> Arc<dyn Plan> {
    let for_list = Arc::downgrade(registry);
    let for_metrics = Arc::downgrade(registry);
    Arc::new(
        PlanTable::new(SYSTEM_DOMAIN)
            .method("listOperations", move |_: Value| {
                let listed = upgrade(&for_list).map(|registry| ListOperationsResponse {
                    operations: registry.list(),
                });
                async move { listed }
            })
            .method("metrics", move |_: Value| {
                let snapshot: anyhow::Result<MetricsSnapshot> =
                    upgrade(&for_metrics).map(|registry| registry.metrics().snapshot());
                async move { snapshot }
            }),
    )
}

pub fn system_operations(registry: &Arc<OperationRegistry>) -> Vec<OperationRecord> {
    let plan = system_plan(registry);
    vec![
        OperationRecord::new(SYSTEM_DOMAIN, "listOperations", Arc::clone(&plan))
            .with_description("List registered operations in registration order"),
        OperationRecord::new(SYSTEM_DOMAIN, "metrics", plan)
            .with_description("Dispatch counters")
            .with_capability(SYSTEM_READ),
    ]
}
