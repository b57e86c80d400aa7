//! Batch job model
//!
//! A [`BatchJob`] is the orchestration unit: one sync request, one tenant,
//! one set of data types, walked strictly one period at a time. The
//! orchestrator owns all job state; stores only persist snapshots of it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::DataType;

/// How a sync request walks periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SyncMode {
    /// Exactly one business day
    SinglePeriod { period: NaiveDate },
    /// A caller-supplied inclusive date range
    Continuous { start: NaiveDate, end: NaiveDate },
    /// Forward from a start boundary until the empty-period heuristic stops
    Backlog { start: NaiveDate },
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::SinglePeriod { .. } => "single_period",
            SyncMode::Continuous { .. } => "continuous",
            SyncMode::Backlog { .. } => "backlog",
        }
    }

    /// (first period, last period if bounded)
    pub fn period_bounds(&self) -> (NaiveDate, Option<NaiveDate>) {
        match *self {
            SyncMode::SinglePeriod { period } => (period, Some(period)),
            SyncMode::Continuous { start, end } => (start, Some(end)),
            SyncMode::Backlog { start } => (start, None),
        }
    }

    /// Rebuild from persisted columns
    pub fn from_parts(
        mode: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> anyhow::Result<Self> {
        match mode {
            "single_period" => Ok(SyncMode::SinglePeriod { period: start }),
            "continuous" => {
                let end = end.ok_or_else(|| anyhow::anyhow!("continuous mode without end period"))?;
                Ok(SyncMode::Continuous { start, end })
            },
            "backlog" => Ok(SyncMode::Backlog { start }),
            other => Err(anyhow::anyhow!("unknown sync mode: {}", other)),
        }
    }
}

/// Batch job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Pending,
        }
    }
}

/// Counters accumulated across a job's periods
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTotals {
    /// Records reported by the vendor at collection time
    pub collected: i64,
    /// Rows derived from staged payloads
    pub processed: i64,
    /// Rows newly inserted downstream
    pub inserted: i64,
    /// Rows overwritten downstream
    pub updated: i64,
    /// Period-level collector failures plus sub-batch upsert failures
    pub errors: i64,
}

/// One sync request walking periods sequentially
#[derive(Debug, Clone, Serialize)]
pub struct BatchJob {
    pub job_id: Uuid,
    pub tenant_id: i32,
    pub data_types: Vec<DataType>,
    pub mode: SyncMode,
    pub status: JobStatus,
    /// Most recent period the loop touched
    pub period_cursor: Option<NaiveDate>,
    /// Current run of periods with zero inserted rows (backlog heuristic)
    pub consecutive_empty_periods: u32,
    pub last_period_with_data: Option<NaiveDate>,
    pub periods_processed: i64,
    pub totals: JobTotals,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    pub fn new(tenant_id: i32, data_types: Vec<DataType>, mode: SyncMode) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            tenant_id,
            data_types,
            mode,
            status: JobStatus::Pending,
            period_cursor: None,
            consecutive_empty_periods: 0,
            last_period_with_data: None,
            periods_processed: 0,
            totals: JobTotals::default(),
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn begin(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Utc::now();
    }

    /// A period that yielded at least one inserted row resets the streak.
    pub fn record_data_period(&mut self, period: NaiveDate) {
        self.periods_processed += 1;
        self.period_cursor = Some(period);
        self.consecutive_empty_periods = 0;
        self.last_period_with_data = Some(period);
    }

    /// A fully-observed period with zero inserted rows extends the streak.
    pub fn record_empty_period(&mut self, period: NaiveDate) {
        self.periods_processed += 1;
        self.period_cursor = Some(period);
        self.consecutive_empty_periods += 1;
    }

    /// A period the collector could not observe leaves the streak alone: an
    /// unobserved period is not evidence of missing data.
    pub fn record_failed_period(&mut self, period: NaiveDate) {
        self.periods_processed += 1;
        self.period_cursor = Some(period);
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn cancel(&mut self) {
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    pub fn duration_seconds(&self) -> f64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn summary(&self) -> SyncSummary {
        let (period_start, period_end) = self.mode.period_bounds();
        SyncSummary {
            job_id: self.job_id,
            tenant_id: self.tenant_id,
            mode: self.mode.as_str().to_string(),
            status: self.status,
            periods_processed: self.periods_processed,
            total_collected: self.totals.collected,
            total_inserted: self.totals.inserted,
            total_updated: self.totals.updated,
            total_errors: self.totals.errors,
            duration_seconds: self.duration_seconds(),
            period_start,
            period_end: period_end.or(self.period_cursor),
            last_period_with_data: self.last_period_with_data,
            started_at: self.started_at,
            finished_at: self.completed_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Terminal report propagated to the notification sink and the run log
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub job_id: Uuid,
    pub tenant_id: i32,
    pub mode: String,
    pub status: JobStatus,
    pub periods_processed: i64,
    pub total_collected: i64,
    pub total_inserted: i64,
    pub total_updated: i64,
    pub total_errors: i64,
    pub duration_seconds: f64,
    pub period_start: NaiveDate,
    pub period_end: Option<NaiveDate>,
    pub last_period_with_data: Option<NaiveDate>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn job() -> BatchJob {
        BatchJob::new(
            3,
            vec![DataType::Sales],
            SyncMode::Backlog { start: d("2026-02-01") },
        )
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.consecutive_empty_periods, 0);
        assert!(job.period_cursor.is_none());
    }

    #[test]
    fn test_empty_streak_resets_on_data() {
        let mut job = job();
        job.begin();

        job.record_empty_period(d("2026-02-01"));
        job.record_empty_period(d("2026-02-02"));
        assert_eq!(job.consecutive_empty_periods, 2);

        job.record_data_period(d("2026-02-03"));
        assert_eq!(job.consecutive_empty_periods, 0);
        assert_eq!(job.last_period_with_data, Some(d("2026-02-03")));

        job.record_empty_period(d("2026-02-04"));
        assert_eq!(job.consecutive_empty_periods, 1);
        assert_eq!(job.periods_processed, 4);
    }

    #[test]
    fn test_failed_period_leaves_streak_untouched() {
        let mut job = job();
        job.begin();

        job.record_empty_period(d("2026-02-01"));
        job.record_failed_period(d("2026-02-02"));
        assert_eq!(job.consecutive_empty_periods, 1);
        assert_eq!(job.period_cursor, Some(d("2026-02-02")));
        assert_eq!(job.periods_processed, 2);
    }

    #[test]
    fn test_terminal_states() {
        let mut a = job();
        a.begin();
        a.complete();
        assert!(a.status.is_terminal());
        assert!(a.completed_at.is_some());

        let mut b = job();
        b.begin();
        b.fail("vendor down");
        assert_eq!(b.status, JobStatus::Failed);
        assert_eq!(b.error.as_deref(), Some("vendor down"));
    }

    #[test]
    fn test_mode_round_trip() {
        let modes = [
            SyncMode::SinglePeriod { period: d("2026-02-01") },
            SyncMode::Continuous { start: d("2026-02-01"), end: d("2026-02-07") },
            SyncMode::Backlog { start: d("2026-01-01") },
        ];
        for mode in modes {
            let (start, end) = mode.period_bounds();
            let rebuilt = SyncMode::from_parts(mode.as_str(), start, end).unwrap();
            assert_eq!(rebuilt, mode);
        }
        assert!(SyncMode::from_parts("continuous", d("2026-02-01"), None).is_err());
        assert!(SyncMode::from_parts("nightly", d("2026-02-01"), None).is_err());
    }

    #[test]
    fn test_summary_reflects_totals() {
        let mut job = job();
        job.begin();
        job.totals.collected = 120;
        job.totals.inserted = 100;
        job.totals.errors = 2;
        job.record_data_period(d("2026-02-01"));
        job.complete();

        let summary = job.summary();
        assert_eq!(summary.total_collected, 120);
        assert_eq!(summary.total_inserted, 100);
        assert_eq!(summary.total_errors, 2);
        assert_eq!(summary.periods_processed, 1);
        assert_eq!(summary.last_period_with_data, Some(d("2026-02-01")));
        assert_eq!(summary.mode, "backlog");
    }
}
