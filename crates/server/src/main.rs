use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tubepipe_core::{
    load_config, validate_config, verify_tools, JobStore, SqliteJobStore, StreamContext,
    StreamOrchestrator,
};
use tubepipe_server::{create_router, AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("tubepipe v{}", VERSION);

    // An explicit config path must exist; the default one is optional.
    let (config_path, required) = match std::env::var("TUBEPIPE_CONFIG") {
        Ok(path) => (PathBuf::from(path), true),
        Err(_) => (PathBuf::from("config.toml"), false),
    };

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path, required)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    if config.tools.verify_on_startup {
        verify_tools(&config)
            .await
            .context("External tool check failed")?;
        info!("External tools verified");
    } else {
        warn!("Skipping external tool verification");
    }

    info!("Database path: {:?}", config.database.path);
    info!(
        acquisition = ?config.tools.acquisition_path,
        transcode = ?config.tools.transcode_path,
        "Using external tools"
    );

    let jobs: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::new(&config.database.path).context("Failed to open job store")?,
    );

    let context = StreamContext::new(&config, jobs);
    let orchestrator = Arc::new(StreamOrchestrator::new(context));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, orchestrator));
    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
