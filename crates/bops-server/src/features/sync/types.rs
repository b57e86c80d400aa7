//! Request and response bodies for the sync routes

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bops_ingest::jobs::{JobStatus, SyncMode, SyncSummary};
use bops_ingest::model::DataType;

use crate::error::AppError;

fn parse_data_types(raw: Option<Vec<String>>) -> Result<Vec<DataType>, AppError> {
    let Some(raw) = raw else {
        return Ok(DataType::ALL.to_vec());
    };
    if raw.is_empty() {
        return Ok(DataType::ALL.to_vec());
    }
    raw.iter()
        .map(|s| {
            s.parse::<DataType>()
                .map_err(AppError::Validation)
        })
        .collect()
}

/// Body of POST /sync/run
#[derive(Debug, Deserialize)]
pub struct RunSyncRequest {
    pub tenant_id: Option<i32>,
    pub period: Option<NaiveDate>,
    pub data_types: Option<Vec<String>>,
}

impl RunSyncRequest {
    pub fn validate(self) -> Result<(i32, NaiveDate, Vec<DataType>), AppError> {
        let tenant_id = self
            .tenant_id
            .ok_or_else(|| AppError::Validation("tenant_id is required".to_string()))?;
        let period = self
            .period
            .ok_or_else(|| AppError::Validation("period is required".to_string()))?;
        let data_types = parse_data_types(self.data_types)?;
        Ok((tenant_id, period, data_types))
    }
}

/// Body of POST /sync/jobs
#[derive(Debug, Deserialize)]
pub struct StartJobRequest {
    pub tenant_id: Option<i32>,
    pub mode: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub data_types: Option<Vec<String>>,
}

impl StartJobRequest {
    pub fn validate(self) -> Result<(i32, Vec<DataType>, SyncMode), AppError> {
        let tenant_id = self
            .tenant_id
            .ok_or_else(|| AppError::Validation("tenant_id is required".to_string()))?;
        let data_types = parse_data_types(self.data_types)?;
        let start = self
            .start
            .ok_or_else(|| AppError::Validation("start is required".to_string()))?;

        let mode = match self.mode.as_deref() {
            Some("continuous") => {
                let end = self
                    .end
                    .ok_or_else(|| AppError::Validation("end is required for continuous mode".to_string()))?;
                if start > end {
                    return Err(AppError::Validation(format!(
                        "start {} is after end {}",
                        start, end
                    )));
                }
                SyncMode::Continuous { start, end }
            },
            Some("backlog") => SyncMode::Backlog { start },
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "mode must be continuous or backlog, got {}",
                    other
                )))
            },
            None => return Err(AppError::Validation("mode is required".to_string())),
        };

        Ok((tenant_id, data_types, mode))
    }
}

/// Query string of GET /sync/jobs
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    pub tenant_id: Option<i32>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

impl ListJobsQuery {
    pub fn status_filter(&self) -> Result<Option<JobStatus>, AppError> {
        match self.status.as_deref() {
            None => Ok(None),
            Some(raw) => match raw {
                "pending" | "running" | "completed" | "failed" | "cancelled" => {
                    Ok(Some(JobStatus::from(raw.to_string())))
                },
                other => Err(AppError::Validation(format!("unknown status: {}", other))),
            },
        }
    }
}

/// Body returned by POST /sync/run
#[derive(Debug, Serialize)]
pub struct RunSyncResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub periods_processed: i64,
    pub collected: i64,
    pub inserted: i64,
    pub updated: i64,
    pub errors: i64,
    pub duration_seconds: f64,
    pub last_period_with_data: Option<NaiveDate>,
}

impl From<SyncSummary> for RunSyncResponse {
    fn from(summary: SyncSummary) -> Self {
        Self {
            job_id: summary.job_id,
            status: summary.status,
            periods_processed: summary.periods_processed,
            collected: summary.total_collected,
            inserted: summary.total_inserted,
            updated: summary.total_updated,
            errors: summary.total_errors,
            duration_seconds: summary.duration_seconds,
            last_period_with_data: summary.last_period_with_data,
        }
    }
}

/// Body returned by POST /sync/jobs
#[derive(Debug, Serialize)]
pub struct StartJobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_run_request_requires_tenant_and_period() {
        let missing_tenant = RunSyncRequest {
            tenant_id: None,
            period: Some(d("2026-02-01")),
            data_types: None,
        };
        assert!(missing_tenant.validate().is_err());

        let missing_period = RunSyncRequest {
            tenant_id: Some(3),
            period: None,
            data_types: None,
        };
        assert!(missing_period.validate().is_err());
    }

    #[test]
    fn test_run_request_defaults_to_all_data_types() {
        let request = RunSyncRequest {
            tenant_id: Some(3),
            period: Some(d("2026-02-01")),
            data_types: None,
        };
        let (_, _, types) = request.validate().unwrap();
        assert_eq!(types, DataType::ALL.to_vec());
    }

    #[test]
    fn test_run_request_rejects_unknown_data_type() {
        let request = RunSyncRequest {
            tenant_id: Some(3),
            period: Some(d("2026-02-01")),
            data_types: Some(vec!["sales".to_string(), "stocktake".to_string()]),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_start_request_modes() {
        let continuous = StartJobRequest {
            tenant_id: Some(3),
            mode: Some("continuous".to_string()),
            start: Some(d("2026-02-01")),
            end: Some(d("2026-02-07")),
            data_types: None,
        };
        let (_, _, mode) = continuous.validate().unwrap();
        assert_eq!(
            mode,
            SyncMode::Continuous { start: d("2026-02-01"), end: d("2026-02-07") }
        );

        let backlog = StartJobRequest {
            tenant_id: Some(3),
            mode: Some("backlog".to_string()),
            start: Some(d("2026-01-01")),
            end: None,
            data_types: None,
        };
        let (_, _, mode) = backlog.validate().unwrap();
        assert_eq!(mode, SyncMode::Backlog { start: d("2026-01-01") });
    }

    #[test]
    fn test_start_request_rejects_bad_ranges_and_modes() {
        let inverted = StartJobRequest {
            tenant_id: Some(3),
            mode: Some("continuous".to_string()),
            start: Some(d("2026-02-07")),
            end: Some(d("2026-02-01")),
            data_types: None,
        };
        assert!(inverted.validate().is_err());

        let unknown = StartJobRequest {
            tenant_id: Some(3),
            mode: Some("nightly".to_string()),
            start: Some(d("2026-02-01")),
            end: None,
            data_types: None,
        };
        assert!(unknown.validate().is_err());

        let missing_end = StartJobRequest {
            tenant_id: Some(3),
            mode: Some("continuous".to_string()),
            start: Some(d("2026-02-01")),
            end: None,
            data_types: None,
        };
        assert!(missing_end.validate().is_err());
    }

    #[test]
    fn test_list_query_status_filter() {
        let query = ListJobsQuery {
            status: Some("running".to_string()),
            ..Default::default()
        };
        assert_eq!(query.status_filter().unwrap(), Some(JobStatus::Running));

        let bad = ListJobsQuery {
            status: Some("paused".to_string()),
            ..Default::default()
        };
        assert!(bad.status_filter().is_err());

        assert_eq!(ListJobsQuery::default().status_filter().unwrap(), None);
    }
}
