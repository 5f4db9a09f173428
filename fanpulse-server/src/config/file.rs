//! TOML file configuration structures.
//!
//! These structs directly map to the `fanpulse.toml` file format. Every
//! section is optional and falls back to the pipeline defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use fanpulse_core::scoring::ScoringTable;
use fanpulse_sdk::objects::{EventType, Stat};
use serde::Deserialize;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub pipeline: PipelineSection,
    pub momentum: MomentumSection,
    pub critical: CriticalSection,
    pub persistence: PersistenceSection,
    pub feed: FeedSection,
    pub scoring: ScoringSection,
    pub teams: TeamsSection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    pub listen: SocketAddr,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub buffer_capacity: usize,
    pub batch_size: usize,
    pub drain_max: usize,
    pub flush_interval_ms: u64,
    pub idle_backoff_ms: u64,
    pub partitions: usize,
    pub metrics_interval_secs: u64,
    pub shutdown_grace_secs: u64,
    pub notification_buffer: usize,
    pub ignored_types: Vec<EventType>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            buffer_capacity: 10_000,
            batch_size: 10_000,
            drain_max: 512,
            flush_interval_ms: 100,
            idle_backoff_ms: 1,
            partitions: 1,
            metrics_interval_secs: 10,
            shutdown_grace_secs: 5,
            notification_buffer: 1024,
            ignored_types: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MomentumSection {
    pub half_life_secs: u64,
    pub default_impact: f64,
}

impl Default for MomentumSection {
    fn default() -> Self {
        Self {
            half_life_secs: 600,
            default_impact: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CriticalSection {
    pub types: Vec<EventType>,
    /// When omitted, every touchdown stat counts.
    pub touchdown_stats: Option<Vec<Stat>>,
    pub latency_target_ms: u64,
}

impl Default for CriticalSection {
    fn default() -> Self {
        Self {
            types: vec![EventType::Score, EventType::Injury],
            touchdown_stats: None,
            latency_target_ms: 10,
        }
    }
}

/// Player snapshot persistence. Requires `DATABASE_URL` when enabled.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceSection {
    pub enabled: bool,
    pub max_connections: u32,
    pub queue_capacity: usize,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_attempts: u32,
    pub coalesce_max: usize,
}

impl Default for PersistenceSection {
    fn default() -> Self {
        Self {
            enabled: false,
            max_connections: 10,
            queue_capacity: 4096,
            base_backoff_ms: 50,
            max_backoff_ms: 5_000,
            max_attempts: 5,
            coalesce_max: 256,
        }
    }
}

/// Optional upstream WebSocket feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedSection {
    pub upstream: Option<Url>,
    pub reconnect_delay_ms: u64,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            upstream: None,
            reconnect_delay_ms: 1_000,
        }
    }
}

/// Scoring table: either a separate file (`path`, relative to this config
/// file) or inline `weights` / `scored_types` / `type_bonus` tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSection {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(flatten)]
    pub inline: ScoringTable,
}

/// Player to fantasy-team roster file, relative to this config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TeamsSection {
    pub roster: Option<PathBuf>,
}
