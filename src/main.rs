use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use offline_snapshot::capture::{ChromiumVisitor, PageVisitor};
use offline_snapshot::config::Config;
use offline_snapshot::snapshot::SnapshotEngine;
use offline_snapshot::web::{self, AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Initialize logging
    init_tracing()?;

    info!("Starting offline-snapshot");

    // Load and validate configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        cache_dir = %config.cache_dir.display(),
        policy = ?config.snapshot_policy,
        max_depth_limit = config.max_depth_limit,
        "Configuration loaded"
    );

    // Ensure the cache directory exists
    tokio::fs::create_dir_all(&config.cache_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create cache directory: {}",
                config.cache_dir.display()
            )
        })?;

    let config = Arc::new(config);

    // The browser is launched lazily on the first capture
    let visitor: Arc<dyn PageVisitor> = Arc::new(ChromiumVisitor::new(Arc::clone(&config)));
    let engine = Arc::new(SnapshotEngine::new(Arc::clone(&config), visitor));

    let state = AppState {
        config,
        engine: Arc::clone(&engine),
    };

    if let Err(e) = web::serve(state, shutdown_signal()).await {
        error!("Web server error: {e:#}");
    }

    info!("Shutting down...");

    engine.shutdown().await;

    info!("Shutdown complete");

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,offline_snapshot=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        // Pretty-printed logging for development
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

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
        () = ctrl_c => {},
        () = terminate => {},
    }
}
