//! Store contracts
//!
//! The pipeline touches storage only through these traits: staged vendor
//! payloads, normalized-table upserts keyed on the idempotency key, and
//! batch-job snapshots. Postgres implementations live in
//! [`postgres`]; in-memory implementations in [`memory`] back the pipeline
//! tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::jobs::{BatchJob, JobStatus, SyncSummary};
use crate::model::{DataType, NormalizedRow};

/// New staging row produced by the collector
#[derive(Debug, Clone)]
pub struct NewStagingRecord {
    pub tenant_id: i32,
    pub data_type: DataType,
    pub period: NaiveDate,
    pub payload: Value,
    /// Vendor-reported record count, advisory only
    pub record_count: i32,
}

/// Durable unprocessed vendor payload, the unit of replay
#[derive(Debug, Clone)]
pub struct StagingRecord {
    pub id: i64,
    pub tenant_id: i32,
    pub data_type: DataType,
    pub period: NaiveDate,
    pub payload: Value,
    pub record_count: i32,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one sub-batch upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Rows that did not exist under their idempotency key
    pub inserted: u64,
    /// Rows that overwrote an existing key
    pub updated: u64,
}

impl UpsertOutcome {
    pub fn written(&self) -> u64 {
        self.inserted + self.updated
    }
}

/// Raw staging storage, natural key (tenant, data type, period)
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Write a collected payload. An existing unprocessed row for the same
    /// natural key is overwritten; a processed row is returned untouched
    /// (re-syncing a finished period goes through explicit reprocessing).
    async fn upsert_raw(&self, record: NewStagingRecord) -> anyhow::Result<StagingRecord>;

    async fn fetch(&self, id: i64) -> anyhow::Result<Option<StagingRecord>>;

    /// Unprocessed records for a tenant, oldest first
    async fn select_unprocessed(
        &self,
        tenant_id: i32,
        limit: i64,
    ) -> anyhow::Result<Vec<StagingRecord>>;

    /// Flip `processed` to true. The flag never reverts.
    async fn mark_processed(&self, id: i64, at: DateTime<Utc>) -> anyhow::Result<()>;
}

/// Normalized-table upserts, conflict target = idempotency key
#[async_trait]
pub trait NormalizedStore: Send + Sync {
    /// Upsert one sub-batch. All rows in a call share a data type; a row
    /// whose key already exists is overwritten, never duplicated.
    async fn upsert_rows(&self, rows: &[NormalizedRow]) -> anyhow::Result<UpsertOutcome>;
}

/// Batch-job persistence for the job-control surface
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: &BatchJob) -> anyhow::Result<()>;

    /// Persist the current snapshot of a job the orchestrator owns
    async fn update_job(&self, job: &BatchJob) -> anyhow::Result<()>;

    async fn fetch_job(&self, job_id: Uuid) -> anyhow::Result<Option<BatchJob>>;

    async fn list_jobs(
        &self,
        tenant_id: Option<i32>,
        status: Option<JobStatus>,
        limit: i64,
    ) -> anyhow::Result<Vec<BatchJob>>;

    /// Append a terminal summary to the run log
    async fn record_run(&self, summary: &SyncSummary) -> anyhow::Result<()>;
}
