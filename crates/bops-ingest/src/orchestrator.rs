//! Sync orchestrator
//!
//! The control loop over a [`BatchJob`]: walks periods strictly in
//! sequence, runs collect-then-process for each of the job's data types,
//! accumulates counters, applies the backlog empty-period heuristic, and
//! reports a terminal summary to the run log and the notification sink.
//!
//! Failure scoping per mode: a collector failure fails a single-period job,
//! but in continuous and backlog modes it is recorded and the loop moves to
//! the next period, so one bad day cannot abort a multi-month sync.
//! Processor errors never bubble past the counters.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use bops_common::period::PeriodRange;

use crate::collector::Collector;
use crate::jobs::{BatchJob, SyncMode, SyncSummary};
use crate::notify::NotificationSink;
use crate::processor::Processor;
use crate::store::{JobStore, NormalizedStore, StagingStore};

/// Orchestrator tuning
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Consecutive empty periods that stop a backlog crawl
    pub empty_period_threshold: u32,
    /// Pause between periods
    pub period_pause: Duration,
    /// Upper bound for backlog crawls; None means the current date
    pub backlog_end: Option<NaiveDate>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            empty_period_threshold: 3,
            period_pause: Duration::from_millis(250),
            backlog_end: None,
        }
    }
}

/// What one period yielded across the job's data types
#[derive(Debug, Default)]
struct PeriodOutcome {
    inserted: i64,
    had_failure: bool,
    last_error: Option<String>,
}

pub struct SyncOrchestrator<S, N, J> {
    collector: Collector<S>,
    processor: Processor<S, N>,
    jobs: Arc<J>,
    sink: Arc<dyn NotificationSink>,
    config: OrchestratorConfig,
    cancel: CancellationToken,
}

impl<S, N, J> SyncOrchestrator<S, N, J>
where
    S: StagingStore,
    N: NormalizedStore,
    J: JobStore,
{
    pub fn new(
        collector: Collector<S>,
        processor: Processor<S, N>,
        jobs: Arc<J>,
        sink: Arc<dyn NotificationSink>,
        config: OrchestratorConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            collector,
            processor,
            jobs,
            sink,
            config,
            cancel,
        }
    }

    /// Drive a job to a terminal state and report its summary.
    ///
    /// Returns Ok even when the job itself failed; the summary carries the
    /// status. Err means the pipeline's own storage gave out.
    pub async fn run_job(&self, job: &mut BatchJob) -> anyhow::Result<SyncSummary> {
        info!(
            job_id = %job.job_id,
            tenant_id = job.tenant_id,
            mode = job.mode.as_str(),
            data_types = ?job.data_types,
            "sync job starting"
        );

        job.begin();
        self.jobs.insert_job(job).await?;

        let outcome = match job.mode {
            SyncMode::SinglePeriod { period } => self.run_single(job, period).await,
            SyncMode::Continuous { start, end } => self.run_continuous(job, start, end).await,
            SyncMode::Backlog { start } => self.run_backlog(job, start).await,
        };

        match outcome {
            Ok(()) => {
                if !job.status.is_terminal() {
                    job.complete();
                }
            },
            Err(e) => {
                error!(job_id = %job.job_id, error = %e, "sync job aborted");
                job.fail(e.to_string());
            },
        }

        self.jobs.update_job(job).await?;

        let summary = job.summary();
        if let Err(e) = self.jobs.record_run(&summary).await {
            warn!(job_id = %job.job_id, error = %e, "failed to write run log");
        }
        if let Err(e) = self.sink.notify(&summary).await {
            warn!(job_id = %job.job_id, error = %e, "notification sink failed");
        }

        info!(
            job_id = %job.job_id,
            status = job.status.as_str(),
            periods = summary.periods_processed,
            inserted = summary.total_inserted,
            errors = summary.total_errors,
            duration_secs = summary.duration_seconds,
            "sync job finished"
        );

        Ok(summary)
    }

    /// Run a job on the current task, detached from the caller.
    pub fn spawn(self: Arc<Self>, mut job: BatchJob) -> tokio::task::JoinHandle<()>
    where
        S: 'static,
        N: 'static,
        J: 'static,
    {
        tokio::spawn(async move {
            if let Err(e) = self.run_job(&mut job).await {
                error!(job_id = %job.job_id, error = %e, "sync job crashed");
            }
        })
    }

    async fn run_single(&self, job: &mut BatchJob, period: NaiveDate) -> anyhow::Result<()> {
        let outcome = self.sync_period(job, period).await;

        if outcome.had_failure {
            // the whole job fails: operators re-invoke single-period mode
            // for a failed day instead of relying on in-place retries
            job.record_failed_period(period);
            job.fail(
                outcome
                    .last_error
                    .unwrap_or_else(|| "collector failed".to_string()),
            );
            return Ok(());
        }

        if outcome.inserted > 0 {
            job.record_data_period(period);
        } else {
            job.record_empty_period(period);
        }
        Ok(())
    }

    async fn run_continuous(
        &self,
        job: &mut BatchJob,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<()> {
        let range = PeriodRange::new(start, end).map_err(|e| anyhow::anyhow!(e))?;
        let total = range.len();

        for (index, period) in range.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                job.cancel();
                break;
            }

            info!(
                job_id = %job.job_id,
                %period,
                period_index = index + 1,
                period_count = total,
                "processing period"
            );

            let outcome = self.sync_period(job, period).await;
            self.observe_period(job, period, &outcome);
            self.jobs.update_job(job).await?;

            if (index as u64) + 1 < total {
                self.pause_between_periods().await;
            }
        }

        Ok(())
    }

    async fn run_backlog(&self, job: &mut BatchJob, start: NaiveDate) -> anyhow::Result<()> {
        let end = self
            .config
            .backlog_end
            .unwrap_or_else(|| Utc::now().date_naive());
        let mut period = start;

        while period <= end {
            if self.cancel.is_cancelled() {
                job.cancel();
                break;
            }

            let outcome = self.sync_period(job, period).await;
            self.observe_period(job, period, &outcome);
            self.jobs.update_job(job).await?;

            if job.consecutive_empty_periods >= self.config.empty_period_threshold {
                info!(
                    job_id = %job.job_id,
                    threshold = self.config.empty_period_threshold,
                    last_period_with_data = ?job.last_period_with_data,
                    "empty-period threshold reached, stopping backlog crawl"
                );
                break;
            }

            period = match period.succ_opt() {
                Some(next) => next,
                None => break,
            };
            self.pause_between_periods().await;
        }

        Ok(())
    }

    /// Collect and process every data type of the job for one period.
    async fn sync_period(&self, job: &mut BatchJob, period: NaiveDate) -> PeriodOutcome {
        let mut outcome = PeriodOutcome::default();
        let data_types = job.data_types.clone();

        for data_type in data_types {
            match self.collector.collect(job.tenant_id, data_type, period).await {
                Ok(staged) => {
                    job.totals.collected += staged.record_count as i64;

                    match self.processor.process(&staged).await {
                        Ok(result) => {
                            job.totals.processed += result.processed as i64;
                            job.totals.inserted += result.inserted as i64;
                            job.totals.updated += result.updated as i64;
                            job.totals.errors += result.errors as i64;
                            outcome.inserted += result.inserted as i64;
                        },
                        Err(e) => {
                            // counted, never fatal; the staging record is
                            // still there for reprocessing
                            warn!(
                                job_id = %job.job_id,
                                data_type = %data_type,
                                %period,
                                error = %e,
                                "processor failed for period"
                            );
                            job.totals.errors += 1;
                            outcome.had_failure = true;
                            outcome.last_error = Some(e.to_string());
                        },
                    }
                },
                Err(e) => {
                    warn!(
                        job_id = %job.job_id,
                        data_type = %data_type,
                        %period,
                        error = %e,
                        "collector failed for period"
                    );
                    job.totals.errors += 1;
                    outcome.had_failure = true;
                    outcome.last_error = Some(e.to_string());
                },
            }
        }

        outcome
    }

    /// Fold a period's outcome into the job's streak bookkeeping.
    fn observe_period(&self, job: &mut BatchJob, period: NaiveDate, outcome: &PeriodOutcome) {
        if outcome.inserted > 0 {
            job.record_data_period(period);
        } else if outcome.had_failure {
            job.record_failed_period(period);
        } else {
            job.record_empty_period(period);
        }
    }

    async fn pause_between_periods(&self) {
        if !self.config.period_pause.is_zero() {
            sleep(self.config.period_pause).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::memory::StaticVendorClient;
    use crate::client::ClientRegistry;
    use crate::jobs::JobStatus;
    use crate::model::{DataType, Vendor};
    use crate::processor::ProcessorConfig;
    use crate::store::memory::{MemoryJobStore, MemoryNormalizedStore, MemoryStagingStore};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[derive(Default)]
    struct CollectingSink {
        summaries: Mutex<Vec<SyncSummary>>,
    }

    #[async_trait]
    impl NotificationSink for CollectingSink {
        async fn notify(&self, summary: &SyncSummary) -> anyhow::Result<()> {
            self.summaries.lock().await.push(summary.clone());
            Ok(())
        }
    }

    struct Harness {
        pos: Arc<StaticVendorClient>,
        staging: Arc<MemoryStagingStore>,
        normalized: Arc<MemoryNormalizedStore>,
        jobs: Arc<MemoryJobStore>,
        sink: Arc<CollectingSink>,
        orchestrator:
            SyncOrchestrator<MemoryStagingStore, MemoryNormalizedStore, MemoryJobStore>,
    }

    fn harness(threshold: u32, backlog_end: &str) -> Harness {
        let pos = Arc::new(StaticVendorClient::new(Vendor::Pos));
        let books = Arc::new(StaticVendorClient::new(Vendor::Books));
        let staging = Arc::new(MemoryStagingStore::new());
        let normalized = Arc::new(MemoryNormalizedStore::new());
        let jobs = Arc::new(MemoryJobStore::new());
        let sink = Arc::new(CollectingSink::default());
        let cancel = CancellationToken::new();

        let orchestrator = SyncOrchestrator::new(
            Collector::new(
                ClientRegistry::new(pos.clone(), books.clone()),
                staging.clone(),
            ),
            Processor::new(
                staging.clone(),
                normalized.clone(),
                ProcessorConfig {
                    max_batch_rows: 1000,
                    batch_pause: Duration::ZERO,
                },
                cancel.clone(),
            ),
            jobs.clone(),
            sink.clone(),
            OrchestratorConfig {
                empty_period_threshold: threshold,
                period_pause: Duration::ZERO,
                backlog_end: Some(d(backlog_end)),
            },
            cancel,
        );

        Harness {
            pos,
            staging,
            normalized,
            jobs,
            sink,
            orchestrator,
        }
    }

    async fn put_sales(h: &Harness, day: &str, receipts: i64) {
        let records: Vec<serde_json::Value> = (0..receipts)
            .map(|i| json!({"receipt": i, "item": 1, "qty": 1.0, "value": 12.0}))
            .collect();
        h.pos.put_records(DataType::Sales, d(day), records).await;
    }

    #[tokio::test]
    async fn test_backlog_stops_after_empty_streak() {
        let h = harness(3, "2026-02-10");
        put_sales(&h, "2026-02-01", 2).await;
        put_sales(&h, "2026-02-02", 1).await;
        put_sales(&h, "2026-02-04", 3).await;
        // 02-05 through 02-07 have no data; 02-03 is empty but mid-stream

        let mut job = BatchJob::new(
            3,
            vec![DataType::Sales],
            SyncMode::Backlog { start: d("2026-02-01") },
        );
        let summary = h.orchestrator.run_job(&mut job).await.unwrap();

        // stops at 02-07 after three consecutive empties, never reaches 02-08
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.period_cursor, Some(d("2026-02-07")));
        assert_eq!(job.consecutive_empty_periods, 3);
        assert_eq!(job.last_period_with_data, Some(d("2026-02-04")));
        assert_eq!(summary.periods_processed, 7);

        let staged_periods: Vec<NaiveDate> = h
            .staging
            .records()
            .await
            .iter()
            .map(|r| r.period)
            .collect();
        assert!(!staged_periods.contains(&d("2026-02-08")));
        assert_eq!(h.normalized.len().await, 6);
    }

    #[tokio::test]
    async fn test_empty_periods_are_staged_and_marked_processed() {
        let h = harness(2, "2026-02-10");

        let mut job = BatchJob::new(
            3,
            vec![DataType::Sales],
            SyncMode::Backlog { start: d("2026-02-01") },
        );
        h.orchestrator.run_job(&mut job).await.unwrap();

        // the crawl observed 02-01 and 02-02 as empty and stopped
        let records = h.staging.records().await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.record_count == 0 && r.processed));
        assert_eq!(job.last_period_with_data, None);
    }

    #[tokio::test]
    async fn test_collector_failure_does_not_extend_streak() {
        let h = harness(2, "2026-02-10");
        put_sales(&h, "2026-02-01", 1).await;
        h.pos.fail_on(DataType::Sales, d("2026-02-02")).await;
        // 02-03 and 02-04 empty: the streak is built from them alone

        let mut job = BatchJob::new(
            3,
            vec![DataType::Sales],
            SyncMode::Backlog { start: d("2026-02-01") },
        );
        let summary = h.orchestrator.run_job(&mut job).await.unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.period_cursor, Some(d("2026-02-04")));
        assert_eq!(summary.total_errors, 1);
        assert_eq!(job.last_period_with_data, Some(d("2026-02-01")));
        // the failed period produced no staging record
        let staged_periods: Vec<NaiveDate> = h
            .staging
            .records()
            .await
            .iter()
            .map(|r| r.period)
            .collect();
        assert!(!staged_periods.contains(&d("2026-02-02")));
    }

    #[tokio::test]
    async fn test_continuous_range_survives_a_bad_day() {
        let h = harness(3, "2026-02-10");
        put_sales(&h, "2026-02-01", 2).await;
        h.pos.fail_on(DataType::Sales, d("2026-02-02")).await;
        put_sales(&h, "2026-02-03", 1).await;

        let mut job = BatchJob::new(
            3,
            vec![DataType::Sales],
            SyncMode::Continuous {
                start: d("2026-02-01"),
                end: d("2026-02-03"),
            },
        );
        let summary = h.orchestrator.run_job(&mut job).await.unwrap();

        // a single bad day does not abort the range
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(summary.periods_processed, 3);
        assert_eq!(summary.total_errors, 1);
        assert_eq!(summary.total_inserted, 3);
        assert_eq!(h.normalized.len().await, 3);
    }

    #[tokio::test]
    async fn test_single_period_fails_on_collector_error() {
        let h = harness(3, "2026-02-10");
        h.pos.fail_on(DataType::Sales, d("2026-02-01")).await;

        let mut job = BatchJob::new(
            3,
            vec![DataType::Sales],
            SyncMode::SinglePeriod { period: d("2026-02-01") },
        );
        let summary = h.orchestrator.run_job(&mut job).await.unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.is_some());
        assert_eq!(summary.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_single_period_success_reports_counts() {
        let h = harness(3, "2026-02-10");
        put_sales(&h, "2026-02-01", 4).await;

        let mut job = BatchJob::new(
            3,
            vec![DataType::Sales],
            SyncMode::SinglePeriod { period: d("2026-02-01") },
        );
        let summary = h.orchestrator.run_job(&mut job).await.unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(summary.total_collected, 4);
        assert_eq!(summary.total_inserted, 4);
        assert_eq!(summary.total_errors, 0);

        // summary reached both the run log and the sink
        assert_eq!(h.jobs.runs().await.len(), 1);
        assert_eq!(h.sink.summaries.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_job_snapshot_is_persisted() {
        let h = harness(3, "2026-02-10");
        put_sales(&h, "2026-02-01", 1).await;

        let mut job = BatchJob::new(
            3,
            vec![DataType::Sales],
            SyncMode::SinglePeriod { period: d("2026-02-01") },
        );
        let job_id = job.job_id;
        h.orchestrator.run_job(&mut job).await.unwrap();

        let stored = h.jobs.fetch_job(job_id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.totals.inserted, 1);
    }

    #[tokio::test]
    async fn test_cancelled_job_stops_between_periods() {
        let h = harness(3, "2026-02-10");
        h.orchestrator.cancel.cancel();

        let mut job = BatchJob::new(
            3,
            vec![DataType::Sales],
            SyncMode::Continuous {
                start: d("2026-02-01"),
                end: d("2026-02-05"),
            },
        );
        h.orchestrator.run_job(&mut job).await.unwrap();

        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.periods_processed, 0);
    }
}
