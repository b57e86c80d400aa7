//! Shared application state

use std::sync::Arc;

use sqlx::PgPool;

use bops_ingest::orchestrator::SyncOrchestrator;
use bops_ingest::store::postgres::{PgJobStore, PgNormalizedStore, PgStagingStore};

/// Orchestrator over the Postgres-backed pipeline
pub type PgSyncOrchestrator = SyncOrchestrator<PgStagingStore, PgNormalizedStore, PgJobStore>;

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub orchestrator: Arc<PgSyncOrchestrator>,
    pub jobs: Arc<PgJobStore>,
}
