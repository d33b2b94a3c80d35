use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leafy::config::{Config, StorageBackend};
use leafy::engine::spawn_recalc_task;
use leafy::storage::connect_storage;
use leafy::AppState;

#[derive(Parser, Debug)]
#[command(name = "leafy")]
#[command(author, version, about = "Plant watering tracker backend", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "leafy.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Override the SQLite database URL
    #[arg(long, env = "LEAFY_DATABASE_URL")]
    database_url: Option<String>,

    /// Override the S3 bucket holding plant images
    #[arg(long, env = "LEAFY_S3_BUCKET")]
    bucket: Option<String>,

    /// Override the S3 region
    #[arg(long, env = "LEAFY_S3_REGION")]
    region: Option<String>,

    /// Override the elapsed-time recalculation interval, in minutes
    #[arg(long, env = "LEAFY_RECALC_INTERVAL_MINUTES")]
    recalc_interval: Option<u64>,

    /// Override the listen port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Keep everything in memory (database and images)
    #[arg(long)]
    ephemeral: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if let Some(bucket) = &self.bucket {
            config.storage.bucket = bucket.clone();
        }
        if let Some(region) = &self.region {
            config.storage.region = region.clone();
        }
        if let Some(minutes) = self.recalc_interval {
            config.recalc.interval_minutes = minutes;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.ephemeral {
            config.storage.backend = StorageBackend::Memory;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config)?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Leafy v{}", env!("CARGO_PKG_VERSION"));

    // Initialize database
    let db = if cli.ephemeral {
        tracing::warn!("Running with an in-memory database; all data is lost on exit");
        leafy::db::init_memory().await?
    } else {
        leafy::db::init(&config.database.url, config.database.max_connections).await?
    };

    let storage = connect_storage(&config.storage).await;
    tracing::info!(storage = storage.storage_type(), "Object storage ready");

    let state = Arc::new(AppState::new(config.clone(), db.clone(), storage)?);

    // Start the elapsed-time sweep
    let recalc_task = spawn_recalc_task(db.clone(), config.recalc.clone());

    let app = leafy::api::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = recalc_task {
        task.abort();
    }
    db.close().await;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
