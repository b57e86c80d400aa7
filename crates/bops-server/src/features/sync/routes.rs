//! Sync routes
//!
//! POST /sync/run executes a single-period sync inside the request and
//! answers with the counters; partial sub-batch failures are a 200 with a
//! non-zero errors field, never a failure status. POST /sync/jobs spawns a
//! continuous or backlog job and answers 202; progress is read back through
//! the job endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use bops_ingest::jobs::{BatchJob, JobStatus, SyncMode};
use bops_ingest::store::JobStore;

use super::types::{
    ListJobsQuery, RunSyncRequest, RunSyncResponse, StartJobRequest, StartJobResponse,
};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Create sync routes
pub fn sync_routes() -> Router<AppState> {
    Router::new()
        .route("/sync/run", post(run_sync))
        .route("/sync/jobs", post(start_job).get(list_jobs))
        .route("/sync/jobs/:job_id", get(get_job))
}

/// Run one business day synchronously
///
/// POST /sync/run {"tenant_id": 3, "period": "2026-02-01", "data_types": ["sales"]}
async fn run_sync(
    State(state): State<AppState>,
    Json(request): Json<RunSyncRequest>,
) -> AppResult<Json<RunSyncResponse>> {
    let (tenant_id, period, data_types) = request.validate()?;

    let mut job = BatchJob::new(tenant_id, data_types, SyncMode::SinglePeriod { period });
    let summary = state
        .orchestrator
        .run_job(&mut job)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    if summary.status == JobStatus::Failed {
        return Err(AppError::Upstream(
            job.error.unwrap_or_else(|| "vendor unavailable".to_string()),
        ));
    }

    Ok(Json(RunSyncResponse::from(summary)))
}

/// Start a continuous or backlog job
///
/// POST /sync/jobs {"tenant_id": 3, "mode": "backlog", "start": "2026-01-01"}
async fn start_job(
    State(state): State<AppState>,
    Json(request): Json<StartJobRequest>,
) -> AppResult<(StatusCode, Json<StartJobResponse>)> {
    let (tenant_id, data_types, mode) = request.validate()?;

    let job = BatchJob::new(tenant_id, data_types, mode);
    let response = StartJobResponse {
        job_id: job.job_id,
        status: job.status,
    };

    state.orchestrator.clone().spawn(job);

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Get a job snapshot
///
/// GET /sync/jobs/:job_id
async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<BatchJob>> {
    let job = state
        .jobs
        .fetch_job(job_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("job {} not found", job_id)))?;

    Ok(Json(job))
}

/// List recent jobs
///
/// GET /sync/jobs?tenant_id=3&status=running&limit=20
async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let status = query.status_filter()?;
    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    let jobs = state
        .jobs
        .list_jobs(query.tenant_id, status, limit)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "count": jobs.len(),
        "jobs": jobs,
    })))
}
