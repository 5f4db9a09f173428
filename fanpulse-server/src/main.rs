//! FanPulse Server
//!
//! Ingests live game events, keeps fantasy player and team state current,
//! and streams processed updates to subscribers.

mod api;
mod config;
mod feed;
mod server;
mod shutdown;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use config::file::LogFormat;
use config::{ConfigLoader, get_database_url};
use fanpulse_core::Pipeline;
use fanpulse_core::config::ConfigStore;
use fanpulse_core::framework::DatabaseProcessor;
use fanpulse_core::sink::{NoopRepository, PgStateRepository, StateRepository};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// FanPulse - real-time fantasy sports event pipeline
#[derive(Parser, Debug)]
#[command(name = "fanpulse-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./fanpulse.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration before tracing so the log format can come from it
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load()?;

    init_tracing(loaded_config.server.log_format);
    tracing::info!("Starting fanpulse-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Configuration loaded from {:?}", args.config);

    let listen_addr = loaded_config.server.listen;

    // Persistence is optional; without it the writer drains into a no-op store
    let db_pool = if loaded_config.persistence.enabled {
        let database_url = get_database_url().map_err(|e| {
            tracing::error!("DATABASE_URL environment variable not set");
            e
        })?;

        tracing::info!("Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(loaded_config.persistence.max_connections)
            .connect(&database_url)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to database: {}", e);
                e
            })?;
        tracing::info!("Database connection established");

        if args.migrate {
            tracing::info!("Running database migrations...");
            sqlx::migrate!("../migrations")
                .run(&pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to run migrations: {}", e);
                    e
                })?;
            tracing::info!("Migrations completed successfully");
        }
        Some(pool)
    } else {
        tracing::info!("Persistence disabled, player state is kept in memory only");
        None
    };

    let repository: Arc<dyn StateRepository> = match &db_pool {
        Some(pool) => Arc::new(PgStateRepository::new(DatabaseProcessor::new(pool.clone()))),
        None => Arc::new(NoopRepository),
    };

    let scoring = ConfigStore::new(loaded_config.scoring);
    let pipeline = Pipeline::builder()
        .config(loaded_config.pipeline)
        .momentum(loaded_config.momentum)
        .critical(loaded_config.critical)
        .writer(loaded_config.writer)
        .scoring_store(scoring.clone())
        .repository(repository)
        .team_index(Arc::new(loaded_config.teams))
        .start()
        .await
        .map_err(|e| {
            tracing::error!("Failed to start pipeline: {}", e);
            e
        })?;
    let handle = pipeline.handle();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let feed_task = loaded_config.feed.upstream.map(|url| {
        tracing::info!(%url, "Starting upstream feed");
        feed::spawn_upstream_feed(
            url,
            loaded_config.feed.reconnect_delay,
            handle.clone(),
            shutdown_rx.clone(),
        )
    });

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify = spawn_config_reload_handler(config_loader, scoring);

    let router = build_router(AppState::new(handle, shutdown_rx));

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr, shutdown_tx.clone()).await;

    // Stop the sources first, then let the pipeline drain
    shutdown_tx.send_replace(true);
    if let Some(feed_task) = feed_task
        && let Err(e) = feed_task.await
    {
        tracing::error!("Upstream feed task failed: {}", e);
    }
    reload_notify.notify_one();

    tracing::info!("Draining pipeline...");
    pipeline.shutdown().await;

    if let Some(pool) = db_pool {
        tracing::info!("Closing database connections...");
        pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
