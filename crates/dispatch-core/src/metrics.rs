//! Dispatch counters, recorded by the registry on every invocation.

use crate::domain::ErrorCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DispatchMetrics {
    pub invocations_total: AtomicU64,
    pub invocations_success: AtomicU64,
    pub invocations_failed: AtomicU64,

    // One slot per ErrorCode
    failures_by_code: [AtomicU64; ErrorCode::COUNT],

    pub total_latency_ms: AtomicU64,
}

/// Point-in-time copy of [`DispatchMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub invocations_total: u64,
    pub invocations_success: u64,
    pub invocations_failed: u64,
    pub failures_by_code: BTreeMap<String, u64>,
    pub average_latency_ms: f64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished invocation. `failure` is `None` on success.
    pub fn record(&self, failure: Option<ErrorCode>, latency_ms: u64) {
        self.invocations_total.fetch_add(1, Ordering::Relaxed);
        match failure {
            None => {
                self.invocations_success.fetch_add(1, Ordering::Relaxed);
            }
            Some(code) => {
                self.invocations_failed.fetch_add(1, Ordering::Relaxed);
                self.failures_by_code[code.slot()].fetch_add(1, Ordering::Relaxed);
            }
        }
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn failures(&self, code: ErrorCode) -> u64 {
        self.failures_by_code[code.slot()].load(Ordering::Relaxed)
    }

    pub fn average_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let count = self.invocations_total.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let failures_by_code = ErrorCode::ALL
            .iter()
            .map(|code| (code.as_str().to_string(), self.failures(*code)))
            .filter(|(_, n)| *n > 0)
            .collect();
        MetricsSnapshot {
            invocations_total: self.invocations_total.load(Ordering::Relaxed),
            invocations_success: self.invocations_success.load(Ordering::Relaxed),
            invocations_failed: self.invocations_failed.load(Ordering::Relaxed),
            failures_by_code,
            average_latency_ms: self.average_latency_ms(),
        }
    }

    /// Export as JSON for diagnostics.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or(serde_json::Value::Null)
    }
}
