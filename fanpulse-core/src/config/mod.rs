//! Runtime configuration for the pipeline.
//!
//! These are plain values with defaults; the server builds them from its
//! TOML file. Reloadable parts (the scoring table) are held in a
//! [`ConfigStore`].

pub mod config_store;

pub use config_store::{ConfigStore, ConfigWatcher};

use std::time::Duration;

use fanpulse_sdk::objects::{EventType, Stat};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Scheduling and sizing of the ingestion/topology side.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capacity of each partition's ingestion buffer.
    pub buffer_capacity: usize,
    /// Pending batch size that forces an emission without waiting for a tick.
    pub batch_size: usize,
    /// Maximum number of events drained per runner iteration.
    pub drain_max: usize,
    /// Period of the forced flush tick.
    pub flush_interval: Duration,
    /// Runner sleep when its buffer is empty.
    pub idle_backoff: Duration,
    /// Number of independent buffer + topology partitions, routed by `gameId`.
    pub partitions: usize,
    /// Period of the metrics reporter.
    pub metrics_interval: Duration,
    /// Upper bound on the shutdown sequence once stop has been requested.
    pub shutdown_grace: Duration,
    /// Capacity of the subscriber notification channel.
    pub notification_buffer: usize,
    /// Event types dropped by the topology before they reach state.
    pub ignored_types: Vec<EventType>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 10_000,
            batch_size: 10_000,
            drain_max: 512,
            flush_interval: Duration::from_millis(100),
            idle_backoff: Duration::from_millis(1),
            partitions: 1,
            metrics_interval: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
            notification_buffer: crate::events::DEFAULT_NOTIFICATION_BUFFER,
            ignored_types: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Validation(
                "buffer_capacity must be at least 1".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Validation("batch_size must be at least 1".into()));
        }
        if self.drain_max == 0 {
            return Err(ConfigError::Validation("drain_max must be at least 1".into()));
        }
        if self.partitions == 0 {
            return Err(ConfigError::Validation("partitions must be at least 1".into()));
        }
        if self.flush_interval.is_zero() || self.metrics_interval.is_zero() {
            return Err(ConfigError::Validation(
                "flush_interval and metrics_interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Momentum heuristic parameters.
///
/// `momentum = momentum * exp(-Δt / half_life) + impact`, clamped to `[-1, 1]`.
/// The constants are not derived from data.
#[derive(Debug, Clone, Copy)]
pub struct MomentumConfig {
    pub half_life: Duration,
    /// Impact used when an event carries no explicit one.
    pub default_impact: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            half_life: Duration::from_secs(600),
            default_impact: 0.1,
        }
    }
}

/// Classification and latency budget of the critical-event fast path.
#[derive(Debug, Clone)]
pub struct CriticalConfig {
    pub types: Vec<EventType>,
    /// Any of these stats with a positive delta makes an event critical.
    pub touchdown_stats: Vec<Stat>,
    pub latency_target: Duration,
}

impl Default for CriticalConfig {
    fn default() -> Self {
        Self {
            types: vec![EventType::Score, EventType::Injury],
            touchdown_stats: Stat::ALL.into_iter().filter(Stat::is_touchdown).collect(),
            latency_target: Duration::from_millis(10),
        }
    }
}

/// Retry policy and queue size of the state writer.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub queue_capacity: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub max_attempts: u32,
    /// Maximum snapshots pulled from the queue and coalesced per write round.
    pub coalesce_max: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: crate::events::DEFAULT_PERSIST_QUEUE,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(5),
            max_attempts: 5,
            coalesce_max: 256,
        }
    }
}

impl WriterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Validation("max_attempts must be at least 1".into()));
        }
        if self.max_backoff < self.base_backoff {
            return Err(ConfigError::Validation(
                "max_backoff must not be smaller than base_backoff".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
        WriterConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_partitions_rejected() {
        let config = PipelineConfig {
            partitions: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn default_critical_stats_are_touchdowns() {
        let critical = CriticalConfig::default();
        assert_eq!(critical.touchdown_stats.len(), 3);
        assert!(critical.touchdown_stats.iter().all(Stat::is_touchdown));
    }
}
