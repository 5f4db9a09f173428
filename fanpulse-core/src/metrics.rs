//! Pipeline counters.
//!
//! Interval counters (processed, processing time, errors) are swapped to
//! zero by [`PipelineMetrics::take_snapshot`]; cumulative totals are never
//! reset. All counters are relaxed atomics, safe to bump from any task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use fanpulse_sdk::objects::{HealthSnapshot, MetricTotals};
use time::OffsetDateTime;

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    interval_processed: AtomicU64,
    interval_latency_us: AtomicU64,
    interval_errors: AtomicU64,

    processed: AtomicU64,
    errors: AtomicU64,
    malformed: AtomicU64,
    stage_errors: AtomicU64,
    overflow_evictions: AtomicU64,
    critical_events: AtomicU64,
    latency_breaches: AtomicU64,
    persist_failures: AtomicU64,
    persist_dropped: AtomicU64,
    out_of_order: AtomicU64,
    duplicate_sequences: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// An event was folded; `latency` is measured from ingestion.
    pub fn record_processed(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        bump(&self.interval_processed);
        self.interval_latency_us.fetch_add(micros, Ordering::Relaxed);
        bump(&self.processed);
    }

    fn record_error(&self) {
        bump(&self.interval_errors);
        bump(&self.errors);
    }

    /// Rejected by the adapter.
    pub fn record_malformed(&self) {
        bump(&self.malformed);
        self.record_error();
    }

    /// Dropped by a failing or panicking topology stage.
    pub fn record_stage_error(&self) {
        bump(&self.stage_errors);
        self.record_error();
    }

    /// Retries exhausted for one snapshot write.
    pub fn record_persist_failure(&self) {
        bump(&self.persist_failures);
        self.record_error();
    }

    /// Writer queue full, snapshot not enqueued.
    pub fn record_persist_dropped(&self) {
        bump(&self.persist_dropped);
    }

    pub fn record_overflow(&self) {
        bump(&self.overflow_evictions);
    }

    pub fn record_critical(&self) {
        bump(&self.critical_events);
    }

    pub fn record_latency_breach(&self) {
        bump(&self.latency_breaches);
    }

    pub fn record_out_of_order(&self) {
        bump(&self.out_of_order);
    }

    pub fn record_duplicate_sequence(&self) {
        bump(&self.duplicate_sequences);
    }

    pub fn totals(&self) -> MetricTotals {
        MetricTotals {
            processed: self.processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            stage_errors: self.stage_errors.load(Ordering::Relaxed),
            overflow_evictions: self.overflow_evictions.load(Ordering::Relaxed),
            critical_events: self.critical_events.load(Ordering::Relaxed),
            latency_breaches: self.latency_breaches.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            persist_dropped: self.persist_dropped.load(Ordering::Relaxed),
            out_of_order: self.out_of_order.load(Ordering::Relaxed),
            duplicate_sequences: self.duplicate_sequences.load(Ordering::Relaxed),
        }
    }

    /// Errors in the current interval, not yet reset.
    pub fn interval_errors(&self) -> u64 {
        self.interval_errors.load(Ordering::Relaxed)
    }

    /// Build a snapshot for an interval of length `elapsed` and reset the
    /// interval counters.
    pub fn take_snapshot(&self, elapsed: Duration, buffer_depth: usize) -> HealthSnapshot {
        let processed = self.interval_processed.swap(0, Ordering::Relaxed);
        let latency_us = self.interval_latency_us.swap(0, Ordering::Relaxed);
        let errors = self.interval_errors.swap(0, Ordering::Relaxed);

        let secs = elapsed.as_secs_f64();
        let events_per_sec = if secs > 0.0 {
            processed as f64 / secs
        } else {
            0.0
        };
        let avg_latency_ms = if processed > 0 {
            latency_us as f64 / processed as f64 / 1000.0
        } else {
            0.0
        };

        HealthSnapshot {
            events_per_sec,
            avg_latency_ms,
            error_count: errors,
            buffer_depth,
            interval_secs: secs,
            taken_at: OffsetDateTime::now_utc(),
            totals: self.totals(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_resets_interval_but_keeps_totals() {
        let metrics = PipelineMetrics::new();
        metrics.record_processed(Duration::from_millis(2));
        metrics.record_processed(Duration::from_millis(4));
        metrics.record_malformed();
        metrics.record_overflow();

        let first = metrics.take_snapshot(Duration::from_secs(2), 7);
        assert_eq!(first.events_per_sec, 1.0);
        assert!((first.avg_latency_ms - 3.0).abs() < 1e-9);
        assert_eq!(first.error_count, 1);
        assert_eq!(first.buffer_depth, 7);
        assert_eq!(first.totals.processed, 2);
        assert_eq!(first.totals.overflow_evictions, 1);

        let second = metrics.take_snapshot(Duration::from_secs(2), 0);
        assert_eq!(second.events_per_sec, 0.0);
        assert_eq!(second.avg_latency_ms, 0.0);
        assert_eq!(second.error_count, 0);
        assert_eq!(second.totals.processed, 2);
        assert_eq!(second.totals.malformed, 1);
        assert_eq!(second.totals.errors, 1);
    }

    #[test]
    fn persist_drops_are_not_errors() {
        let metrics = PipelineMetrics::new();
        metrics.record_persist_dropped();
        metrics.record_persist_failure();
        let totals = metrics.totals();
        assert_eq!(totals.persist_dropped, 1);
        assert_eq!(totals.persist_failures, 1);
        assert_eq!(totals.errors, 1);
    }
}
