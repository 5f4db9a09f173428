//! Configuration module for fanpulse-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments and
//! environment variables, and turns it into the pipeline's runtime configs.

pub mod file;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fanpulse_core::config::{
    ConfigError as PipelineConfigError, CriticalConfig, MomentumConfig, PipelineConfig,
    WriterConfig,
};
use fanpulse_core::scoring::ScoringTable;
use fanpulse_core::sink::StaticTeamIndex;
use fanpulse_sdk::objects::Stat;
use thiserror::Error;
use url::Url;

use crate::config::file::{FileConfig, LogFormat};

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid pipeline config: {0}")]
    PipelineError(#[from] PipelineConfigError),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listen: SocketAddr,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct PersistenceSettings {
    pub enabled: bool,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub upstream: Option<Url>,
    pub reconnect_delay: Duration,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub server: ServerSettings,
    pub pipeline: PipelineConfig,
    pub momentum: MomentumConfig,
    pub critical: CriticalConfig,
    pub writer: WriterConfig,
    pub persistence: PersistenceSettings,
    pub feed: FeedSettings,
    pub scoring: ScoringTable,
    pub teams: StaticTeamIndex,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Load the scoring table and roster files it points to
    /// 4. Validate everything
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let mut file_config = self.read_file()?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        let scoring = self.scoring_table(&file_config)?;
        let teams = match &file_config.teams.roster {
            Some(path) => {
                let content = std::fs::read_to_string(self.resolve(path))?;
                StaticTeamIndex::from_toml_str(&content)?
            }
            None => StaticTeamIndex::default(),
        };

        let loaded = build_loaded_config(file_config, scoring, teams);
        loaded.pipeline.validate()?;
        loaded.writer.validate()?;
        if let Some(upstream) = &loaded.feed.upstream
            && !matches!(upstream.scheme(), "ws" | "wss")
        {
            return Err(ConfigError::ValidationError(format!(
                "feed upstream must be a ws:// or wss:// URL, got {upstream}"
            )));
        }
        Ok(loaded)
    }

    /// Re-read only the scoring table (used during SIGHUP).
    pub fn reload_scoring(&self) -> Result<ScoringTable, ConfigError> {
        let file_config = self.read_file()?;
        self.scoring_table(&file_config)
    }

    fn read_file(&self) -> Result<FileConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        Ok(toml::from_str(&config_content)?)
    }

    fn scoring_table(&self, file_config: &FileConfig) -> Result<ScoringTable, ConfigError> {
        let table = match &file_config.scoring.path {
            Some(path) => ScoringTable::from_path(self.resolve(path))?,
            None => file_config.scoring.inline.clone(),
        };
        table.validate()?;
        Ok(table)
    }

    /// Paths in the config file are relative to the file itself.
    fn resolve(&self, path: &Path) -> PathBuf {
        match self.config_path.parent() {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

fn build_loaded_config(
    file_config: FileConfig,
    scoring: ScoringTable,
    teams: StaticTeamIndex,
) -> LoadedConfig {
    let FileConfig {
        server,
        pipeline,
        momentum,
        critical,
        persistence,
        feed,
        ..
    } = file_config;

    LoadedConfig {
        server: ServerSettings {
            listen: server.listen,
            log_format: server.log_format,
        },
        pipeline: PipelineConfig {
            buffer_capacity: pipeline.buffer_capacity,
            batch_size: pipeline.batch_size,
            drain_max: pipeline.drain_max,
            flush_interval: Duration::from_millis(pipeline.flush_interval_ms),
            idle_backoff: Duration::from_millis(pipeline.idle_backoff_ms),
            partitions: pipeline.partitions,
            metrics_interval: Duration::from_secs(pipeline.metrics_interval_secs),
            shutdown_grace: Duration::from_secs(pipeline.shutdown_grace_secs),
            notification_buffer: pipeline.notification_buffer,
            ignored_types: pipeline.ignored_types,
        },
        momentum: MomentumConfig {
            half_life: Duration::from_secs(momentum.half_life_secs),
            default_impact: momentum.default_impact,
        },
        critical: CriticalConfig {
            types: critical.types,
            touchdown_stats: critical
                .touchdown_stats
                .unwrap_or_else(|| Stat::ALL.into_iter().filter(Stat::is_touchdown).collect()),
            latency_target: Duration::from_millis(critical.latency_target_ms),
        },
        writer: WriterConfig {
            queue_capacity: persistence.queue_capacity,
            base_backoff: Duration::from_millis(persistence.base_backoff_ms),
            max_backoff: Duration::from_millis(persistence.max_backoff_ms),
            max_attempts: persistence.max_attempts,
            coalesce_max: persistence.coalesce_max,
        },
        persistence: PersistenceSettings {
            enabled: persistence.enabled,
            max_connections: persistence.max_connections,
        },
        feed: FeedSettings {
            upstream: feed.upstream,
            reconnect_delay: Duration::from_millis(feed.reconnect_delay_ms),
        },
        scoring,
        teams,
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
