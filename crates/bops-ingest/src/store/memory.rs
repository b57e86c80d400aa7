//! In-memory store implementations
//!
//! Back the pipeline tests; behavior mirrors the Postgres implementations,
//! including the processed-row upsert rule and insert-vs-update counting.
//! The normalized store can be scripted to fail specific upsert calls.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    JobStore, NewStagingRecord, NormalizedStore, StagingRecord, StagingStore, UpsertOutcome,
};
use crate::jobs::{BatchJob, JobStatus, SyncSummary};
use crate::model::NormalizedRow;

/// In-memory [`StagingStore`]
#[derive(Default)]
pub struct MemoryStagingStore {
    state: Mutex<StagingState>,
}

#[derive(Default)]
struct StagingState {
    records: Vec<StagingRecord>,
    next_id: i64,
}

impl MemoryStagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<StagingRecord> {
        self.state.lock().await.records.clone()
    }
}

#[async_trait]
impl StagingStore for MemoryStagingStore {
    async fn upsert_raw(&self, record: NewStagingRecord) -> anyhow::Result<StagingRecord> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.records.iter_mut().find(|r| {
            r.tenant_id == record.tenant_id
                && r.data_type == record.data_type
                && r.period == record.period
        }) {
            if !existing.processed {
                existing.payload = record.payload;
                existing.record_count = record.record_count;
            }
            return Ok(existing.clone());
        }

        state.next_id += 1;
        let staged = StagingRecord {
            id: state.next_id,
            tenant_id: record.tenant_id,
            data_type: record.data_type,
            period: record.period,
            payload: record.payload,
            record_count: record.record_count,
            processed: false,
            processed_at: None,
            created_at: Utc::now(),
        };
        state.records.push(staged.clone());
        Ok(staged)
    }

    async fn fetch(&self, id: i64) -> anyhow::Result<Option<StagingRecord>> {
        let state = self.state.lock().await;
        Ok(state.records.iter().find(|r| r.id == id).cloned())
    }

    async fn select_unprocessed(
        &self,
        tenant_id: i32,
        limit: i64,
    ) -> anyhow::Result<Vec<StagingRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .iter()
            .filter(|r| r.tenant_id == tenant_id && !r.processed)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_processed(&self, id: i64, at: DateTime<Utc>) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow::anyhow!("staging record {} not found", id))?;
        record.processed = true;
        record.processed_at = Some(at);
        Ok(())
    }
}

/// In-memory [`NormalizedStore`] with scriptable per-call failures
#[derive(Default)]
pub struct MemoryNormalizedStore {
    rows: Mutex<HashMap<String, NormalizedRow>>,
    batch_sizes: Mutex<Vec<usize>>,
    failure_plan: Mutex<VecDeque<bool>>,
}

impl MemoryNormalizedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script upcoming calls: `true` entries fail, `false` entries succeed.
    /// Calls past the end of the plan succeed.
    pub async fn plan_failures(&self, plan: Vec<bool>) {
        *self.failure_plan.lock().await = plan.into();
    }

    pub async fn rows(&self) -> Vec<NormalizedRow> {
        self.rows.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    /// Sizes of the sub-batches received so far
    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().await.clone()
    }
}

#[async_trait]
impl NormalizedStore for MemoryNormalizedStore {
    async fn upsert_rows(&self, rows: &[NormalizedRow]) -> anyhow::Result<UpsertOutcome> {
        self.batch_sizes.lock().await.push(rows.len());

        if self.failure_plan.lock().await.pop_front().unwrap_or(false) {
            anyhow::bail!("scripted upsert failure");
        }

        let mut stored = self.rows.lock().await;
        let mut outcome = UpsertOutcome::default();
        for row in rows {
            match stored.insert(row.idempotency_key(), row.clone()) {
                None => outcome.inserted += 1,
                Some(_) => outcome.updated += 1,
            }
        }
        Ok(outcome)
    }
}

/// In-memory [`JobStore`]
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, BatchJob>>,
    runs: Mutex<Vec<SyncSummary>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn runs(&self) -> Vec<SyncSummary> {
        self.runs.lock().await.clone()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert_job(&self, job: &BatchJob) -> anyhow::Result<()> {
        self.jobs.lock().await.insert(job.job_id, job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &BatchJob) -> anyhow::Result<()> {
        self.jobs.lock().await.insert(job.job_id, job.clone());
        Ok(())
    }

    async fn fetch_job(&self, job_id: Uuid) -> anyhow::Result<Option<BatchJob>> {
        Ok(self.jobs.lock().await.get(&job_id).cloned())
    }

    async fn list_jobs(
        &self,
        tenant_id: Option<i32>,
        status: Option<JobStatus>,
        limit: i64,
    ) -> anyhow::Result<Vec<BatchJob>> {
        let jobs = self.jobs.lock().await;
        Ok(jobs
            .values()
            .filter(|j| tenant_id.is_none_or(|t| j.tenant_id == t))
            .filter(|j| status.is_none_or(|s| j.status == s))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn record_run(&self, summary: &SyncSummary) -> anyhow::Result<()> {
        self.runs.lock().await.push(summary.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataType;
    use chrono::NaiveDate;
    use serde_json::json;

    fn new_record(payload: serde_json::Value) -> NewStagingRecord {
        NewStagingRecord {
            tenant_id: 3,
            data_type: DataType::Sales,
            period: NaiveDate::parse_from_str("2026-02-01", "%Y-%m-%d").unwrap(),
            payload,
            record_count: 1,
        }
    }

    #[tokio::test]
    async fn test_staging_upsert_overwrites_unprocessed_row() {
        let store = MemoryStagingStore::new();

        let first = store.upsert_raw(new_record(json!({"records": [1]}))).await.unwrap();
        let second = store.upsert_raw(new_record(json!({"records": [2]}))).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.payload, json!({"records": [2]}));
        assert_eq!(store.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_processed_flag_never_reverts() {
        let store = MemoryStagingStore::new();

        let record = store.upsert_raw(new_record(json!({"records": [1]}))).await.unwrap();
        store.mark_processed(record.id, Utc::now()).await.unwrap();

        // a later collection of the same period cannot flip the flag back
        // or clobber the processed payload
        let after = store.upsert_raw(new_record(json!({"records": [2]}))).await.unwrap();
        assert!(after.processed);
        assert_eq!(after.payload, json!({"records": [1]}));

        let reread = store.fetch(record.id).await.unwrap().unwrap();
        assert!(reread.processed);
        assert!(reread.processed_at.is_some());
    }

    #[tokio::test]
    async fn test_select_unprocessed_filters_by_tenant() {
        let store = MemoryStagingStore::new();

        let mine = store.upsert_raw(new_record(json!({"records": []}))).await.unwrap();
        let mut other = new_record(json!({"records": []}));
        other.tenant_id = 4;
        store.upsert_raw(other).await.unwrap();

        let pending = store.select_unprocessed(3, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, mine.id);
    }
}
