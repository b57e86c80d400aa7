//! BOPS Server - Main entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{routing::get, Json, Router};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use bops_common::logging::{init_logging, LogConfig};
use bops_ingest::collector::Collector;
use bops_ingest::orchestrator::SyncOrchestrator;
use bops_ingest::processor::Processor;
use bops_ingest::store::postgres::{PgJobStore, PgNormalizedStore, PgStagingStore};
use bops_ingest::IngestConfig;
use bops_server::{config::Config, features::sync::sync_routes, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("bops-server".to_string())
        .filter_directives("bops_server=debug,bops_ingest=debug,tower_http=debug,sqlx=info".to_string())
        .build();
    let log_config = LogConfig::from_env().unwrap_or(log_config);
    init_logging(&log_config)?;

    info!("Starting BOPS Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let ingest_config = IngestConfig::from_env()?;

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .connect(&config.database.url)
        .await?;

    info!("Database connection pool established");

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

    info!("Database migrations completed");

    // cancelling this token stops running jobs between periods
    let cancel = CancellationToken::new();

    let staging = Arc::new(PgStagingStore::new(db_pool.clone()));
    let normalized = Arc::new(PgNormalizedStore::new(db_pool.clone()));
    let jobs = Arc::new(PgJobStore::new(db_pool.clone()));

    let orchestrator = Arc::new(SyncOrchestrator::new(
        Collector::new(ingest_config.client_registry()?, staging.clone()),
        Processor::new(
            staging,
            normalized,
            ingest_config.processor_config(),
            cancel.clone(),
        ),
        jobs.clone(),
        ingest_config.notification_sink(),
        ingest_config.orchestrator_config(),
        cancel.clone(),
    ));

    let state = AppState {
        db: db_pool,
        orchestrator,
        jobs,
    };

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", sync_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Liveness probe
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Resolve on ctrl-c or SIGTERM and cancel running jobs
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, cancelling running jobs");
    cancel.cancel();
}
