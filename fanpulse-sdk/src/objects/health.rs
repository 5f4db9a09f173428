//! Health and metrics snapshot served by `GET /metrics`.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Counters that are never reset while the pipeline runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTotals {
    pub processed: u64,
    pub errors: u64,
    pub malformed: u64,
    pub stage_errors: u64,
    pub overflow_evictions: u64,
    pub critical_events: u64,
    pub latency_breaches: u64,
    pub persist_failures: u64,
    pub persist_dropped: u64,
    pub out_of_order: u64,
    /// Redelivered events carrying the last seen sequence number.
    #[serde(default)]
    pub duplicate_sequences: u64,
}

/// Snapshot of one reporting interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub events_per_sec: f64,
    pub avg_latency_ms: f64,
    pub error_count: u64,
    pub buffer_depth: usize,
    pub interval_secs: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub taken_at: OffsetDateTime,
    pub totals: MetricTotals,
}

impl Default for HealthSnapshot {
    fn default() -> Self {
        Self {
            events_per_sec: 0.0,
            avg_latency_ms: 0.0,
            error_count: 0,
            buffer_depth: 0,
            interval_secs: 0.0,
            taken_at: OffsetDateTime::UNIX_EPOCH,
            totals: MetricTotals::default(),
        }
    }
}
