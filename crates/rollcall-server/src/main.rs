//! Rollcall Server - Main entry point

use anyhow::Result;
use rollcall_common::logging::{init_logging, LogConfig};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing::info;

use rollcall_server::{
    api::{self, AppState},
    config::Config,
    db,
    ingest::{IngestionCoordinator, PgStudentStore},
    progress::{ProgressBroadcaster, ProgressTracker},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; environment variables take precedence
    let log_config = LogConfig::builder()
        .log_file_prefix("rollcall-server")
        .filter_directives("rollcall_server=debug,tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;

    init_logging(&log_config)?;

    info!("Starting Rollcall Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}",
        config.bind_address()
    );

    let db_pool = db::create_pool(&db::DbConfig::from(&config.database)).await?;
    info!("Database connection pool established");

    db::run_migrations(&db_pool).await?;

    tokio::fs::create_dir_all(&config.ingest.upload_dir).await?;

    let broadcaster = Arc::new(ProgressBroadcaster::new(config.ingest.subscriber_buffer));
    let tracker = Arc::new(ProgressTracker::new(broadcaster));
    let store = Arc::new(PgStudentStore::new(db_pool.clone()));
    let coordinator = Arc::new(IngestionCoordinator::new(
        tracker,
        store,
        config.ingest.clone(),
    ));
    info!(
        max_concurrency = config.ingest.max_concurrency,
        batch_size = config.ingest.batch_size,
        upload_dir = %config.ingest.upload_dir.display(),
        "Ingestion pipeline ready"
    );

    let state = AppState {
        db: db_pool,
        coordinator,
    };
    let app = api::create_router(state, &config);

    let addr: SocketAddr = config.bind_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
