//! Postgres store implementations
//!
//! Staging rows live in `vendor_raw_data`; normalized rows in one table per
//! data type, upserted with `ON CONFLICT (idempotency_key) DO UPDATE`;
//! job snapshots in `sync_jobs` with a `sync_runs` terminal log.
//!
//! Timestamps derived from vendor wall-clock values are stored as
//! `TIMESTAMP` without time zone on purpose: they are local-frame readings,
//! not instants.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use super::{
    JobStore, NewStagingRecord, NormalizedStore, StagingRecord, StagingStore, UpsertOutcome,
};
use crate::jobs::{BatchJob, JobStatus, JobTotals, SyncMode, SyncSummary};
use crate::model::{
    DataType, NormalizedRow, PaymentRow, ProductionRow, SalesRow, ScheduleRow,
};

/// [`StagingStore`] backed by the `vendor_raw_data` table
#[derive(Clone)]
pub struct PgStagingStore {
    pool: PgPool,
}

impl PgStagingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StagingRow {
    id: i64,
    tenant_id: i32,
    data_type: String,
    period: NaiveDate,
    payload: serde_json::Value,
    record_count: i32,
    processed: bool,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<StagingRow> for StagingRecord {
    type Error = anyhow::Error;

    fn try_from(row: StagingRow) -> anyhow::Result<Self> {
        let data_type = row
            .data_type
            .parse::<DataType>()
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(StagingRecord {
            id: row.id,
            tenant_id: row.tenant_id,
            data_type,
            period: row.period,
            payload: row.payload,
            record_count: row.record_count,
            processed: row.processed,
            processed_at: row.processed_at,
            created_at: row.created_at,
        })
    }
}

const STAGING_COLUMNS: &str =
    "id, tenant_id, data_type, period, payload, record_count, processed, processed_at, created_at";

#[async_trait]
impl StagingStore for PgStagingStore {
    async fn upsert_raw(&self, record: NewStagingRecord) -> anyhow::Result<StagingRecord> {
        // the conditional update returns no row when the existing record is
        // already processed; fall through to reading it back untouched
        let upserted: Option<StagingRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO vendor_raw_data (tenant_id, data_type, period, payload, record_count)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tenant_id, data_type, period) DO UPDATE
            SET payload = EXCLUDED.payload,
                record_count = EXCLUDED.record_count
            WHERE vendor_raw_data.processed = FALSE
            RETURNING {STAGING_COLUMNS}
            "#
        ))
        .bind(record.tenant_id)
        .bind(record.data_type.as_str())
        .bind(record.period)
        .bind(&record.payload)
        .bind(record.record_count)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to upsert staging record")?;

        if let Some(row) = upserted {
            return row.try_into();
        }

        let existing: StagingRow = sqlx::query_as(&format!(
            r#"
            SELECT {STAGING_COLUMNS}
            FROM vendor_raw_data
            WHERE tenant_id = $1 AND data_type = $2 AND period = $3
            "#
        ))
        .bind(record.tenant_id)
        .bind(record.data_type.as_str())
        .bind(record.period)
        .fetch_one(&self.pool)
        .await
        .context("Failed to read back processed staging record")?;

        existing.try_into()
    }

    async fn fetch(&self, id: i64) -> anyhow::Result<Option<StagingRecord>> {
        let row: Option<StagingRow> = sqlx::query_as(&format!(
            "SELECT {STAGING_COLUMNS} FROM vendor_raw_data WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch staging record")?;

        row.map(StagingRecord::try_from).transpose()
    }

    async fn select_unprocessed(
        &self,
        tenant_id: i32,
        limit: i64,
    ) -> anyhow::Result<Vec<StagingRecord>> {
        let rows: Vec<StagingRow> = sqlx::query_as(&format!(
            r#"
            SELECT {STAGING_COLUMNS}
            FROM vendor_raw_data
            WHERE tenant_id = $1 AND processed = FALSE
            ORDER BY period, data_type
            LIMIT $2
            "#
        ))
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to select unprocessed staging records")?;

        rows.into_iter().map(StagingRecord::try_from).collect()
    }

    async fn mark_processed(&self, id: i64, at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE vendor_raw_data
            SET processed = TRUE, processed_at = $1
            WHERE id = $2
            "#,
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to mark staging record processed")?;

        Ok(())
    }
}

/// [`NormalizedStore`] writing to the per-data-type warehouse tables
#[derive(Clone)]
pub struct PgNormalizedStore {
    pool: PgPool,
}

impl PgNormalizedStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Count true inserts vs overwrites from the RETURNING rows;
    /// `xmax = 0` marks rows created by this statement.
    async fn run_upsert(&self, mut builder: QueryBuilder<'_, sqlx::Postgres>) -> anyhow::Result<UpsertOutcome> {
        let flags: Vec<(bool,)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .context("Failed to upsert sub-batch")?;

        let inserted = flags.iter().filter(|f| f.0).count() as u64;
        Ok(UpsertOutcome {
            inserted,
            updated: flags.len() as u64 - inserted,
        })
    }

    async fn upsert_sales(&self, rows: &[(String, &SalesRow)]) -> anyhow::Result<UpsertOutcome> {
        let mut qb = QueryBuilder::new(
            "INSERT INTO pos_sales_items (idempotency_key, tenant_id, period, week, item_id, \
             receipt_id, location, table_label, product_id, product, group_name, staff, \
             sale_kind, qty, discount, gross_value, cost) ",
        );
        qb.push_values(rows, |mut b, (key, row)| {
            b.push_bind(key)
                .push_bind(row.tenant_id)
                .push_bind(row.period)
                .push_bind(row.week)
                .push_bind(row.item_id)
                .push_bind(row.receipt_id)
                .push_bind(&row.location)
                .push_bind(&row.table_label)
                .push_bind(&row.product_id)
                .push_bind(&row.product)
                .push_bind(&row.group_name)
                .push_bind(&row.staff)
                .push_bind(&row.sale_kind)
                .push_bind(row.qty)
                .push_bind(row.discount)
                .push_bind(row.gross_value)
                .push_bind(row.cost);
        });
        qb.push(
            " ON CONFLICT (idempotency_key) DO UPDATE SET \
             table_label = EXCLUDED.table_label, product_id = EXCLUDED.product_id, \
             product = EXCLUDED.product, group_name = EXCLUDED.group_name, \
             staff = EXCLUDED.staff, sale_kind = EXCLUDED.sale_kind, qty = EXCLUDED.qty, \
             discount = EXCLUDED.discount, gross_value = EXCLUDED.gross_value, \
             cost = EXCLUDED.cost, updated_at = NOW() \
             RETURNING (xmax = 0) AS inserted",
        );
        self.run_upsert(qb).await
    }

    async fn upsert_payments(
        &self,
        rows: &[(String, &PaymentRow)],
    ) -> anyhow::Result<UpsertOutcome> {
        let mut qb = QueryBuilder::new(
            "INSERT INTO pos_payments (idempotency_key, tenant_id, period, week, payment_id, \
             receipt_id, recorded_at, settled_at, table_label, customer, method, card_brand, \
             auth_code, gross, fee, fee_pct, net, credit_date) ",
        );
        qb.push_values(rows, |mut b, (key, row)| {
            b.push_bind(key)
                .push_bind(row.tenant_id)
                .push_bind(row.period)
                .push_bind(row.week)
                .push_bind(&row.payment_id)
                .push_bind(&row.receipt_id)
                .push_bind(row.recorded_at)
                .push_bind(row.settled_at)
                .push_bind(&row.table_label)
                .push_bind(&row.customer)
                .push_bind(&row.method)
                .push_bind(&row.card_brand)
                .push_bind(&row.auth_code)
                .push_bind(row.gross)
                .push_bind(row.fee)
                .push_bind(row.fee_pct)
                .push_bind(row.net)
                .push_bind(row.credit_date);
        });
        qb.push(
            " ON CONFLICT (idempotency_key) DO UPDATE SET \
             recorded_at = EXCLUDED.recorded_at, settled_at = EXCLUDED.settled_at, \
             table_label = EXCLUDED.table_label, customer = EXCLUDED.customer, \
             method = EXCLUDED.method, card_brand = EXCLUDED.card_brand, \
             auth_code = EXCLUDED.auth_code, gross = EXCLUDED.gross, fee = EXCLUDED.fee, \
             fee_pct = EXCLUDED.fee_pct, net = EXCLUDED.net, \
             credit_date = EXCLUDED.credit_date, updated_at = NOW() \
             RETURNING (xmax = 0) AS inserted",
        );
        self.run_upsert(qb).await
    }

    async fn upsert_production(
        &self,
        rows: &[(String, &ProductionRow)],
    ) -> anyhow::Result<UpsertOutcome> {
        let mut qb = QueryBuilder::new(
            "INSERT INTO pos_production_events (idempotency_key, tenant_id, period, order_item, \
             product_id, product, group_name, station, table_label, location, ordered_at, \
             prep_started_at, prep_finished_at, delivered_at, order_to_start_secs, \
             order_to_finish_secs, order_to_delivery_secs, start_to_finish_secs, \
             finish_to_delivery_secs, qty) ",
        );
        qb.push_values(rows, |mut b, (key, row)| {
            b.push_bind(key)
                .push_bind(row.tenant_id)
                .push_bind(row.period)
                .push_bind(&row.order_item)
                .push_bind(&row.product_id)
                .push_bind(&row.product)
                .push_bind(&row.group_name)
                .push_bind(&row.station)
                .push_bind(&row.table_label)
                .push_bind(&row.location)
                .push_bind(row.ordered_at)
                .push_bind(row.prep_started_at)
                .push_bind(row.prep_finished_at)
                .push_bind(row.delivered_at)
                .push_bind(row.order_to_start_secs)
                .push_bind(row.order_to_finish_secs)
                .push_bind(row.order_to_delivery_secs)
                .push_bind(row.start_to_finish_secs)
                .push_bind(row.finish_to_delivery_secs)
                .push_bind(row.qty);
        });
        qb.push(
            " ON CONFLICT (idempotency_key) DO UPDATE SET \
             product_id = EXCLUDED.product_id, product = EXCLUDED.product, \
             group_name = EXCLUDED.group_name, station = EXCLUDED.station, \
             table_label = EXCLUDED.table_label, location = EXCLUDED.location, \
             ordered_at = EXCLUDED.ordered_at, prep_started_at = EXCLUDED.prep_started_at, \
             prep_finished_at = EXCLUDED.prep_finished_at, delivered_at = EXCLUDED.delivered_at, \
             order_to_start_secs = EXCLUDED.order_to_start_secs, \
             order_to_finish_secs = EXCLUDED.order_to_finish_secs, \
             order_to_delivery_secs = EXCLUDED.order_to_delivery_secs, \
             start_to_finish_secs = EXCLUDED.start_to_finish_secs, \
             finish_to_delivery_secs = EXCLUDED.finish_to_delivery_secs, \
             qty = EXCLUDED.qty, updated_at = NOW() \
             RETURNING (xmax = 0) AS inserted",
        );
        self.run_upsert(qb).await
    }

    async fn upsert_schedules(
        &self,
        rows: &[(String, &ScheduleRow)],
    ) -> anyhow::Result<UpsertOutcome> {
        let mut qb = QueryBuilder::new(
            "INSERT INTO books_schedule_entries (idempotency_key, tenant_id, period, \
             schedule_id, entry_kind, status, value, paid_value, due_date, payment_date, \
             accrual_date, description, category_id, category, stakeholder_id, stakeholder, \
             document_number, installment, installments, deleted) ",
        );
        qb.push_values(rows, |mut b, (key, row)| {
            b.push_bind(key)
                .push_bind(row.tenant_id)
                .push_bind(row.period)
                .push_bind(&row.schedule_id)
                .push_bind(&row.entry_kind)
                .push_bind(&row.status)
                .push_bind(row.value)
                .push_bind(row.paid_value)
                .push_bind(row.due_date)
                .push_bind(row.payment_date)
                .push_bind(row.accrual_date)
                .push_bind(&row.description)
                .push_bind(&row.category_id)
                .push_bind(&row.category)
                .push_bind(&row.stakeholder_id)
                .push_bind(&row.stakeholder)
                .push_bind(&row.document_number)
                .push_bind(row.installment)
                .push_bind(row.installments)
                .push_bind(row.deleted);
        });
        qb.push(
            " ON CONFLICT (idempotency_key) DO UPDATE SET \
             period = EXCLUDED.period, entry_kind = EXCLUDED.entry_kind, \
             status = EXCLUDED.status, value = EXCLUDED.value, \
             paid_value = EXCLUDED.paid_value, due_date = EXCLUDED.due_date, \
             payment_date = EXCLUDED.payment_date, accrual_date = EXCLUDED.accrual_date, \
             description = EXCLUDED.description, category_id = EXCLUDED.category_id, \
             category = EXCLUDED.category, stakeholder_id = EXCLUDED.stakeholder_id, \
             stakeholder = EXCLUDED.stakeholder, document_number = EXCLUDED.document_number, \
             installment = EXCLUDED.installment, installments = EXCLUDED.installments, \
             deleted = EXCLUDED.deleted, updated_at = NOW() \
             RETURNING (xmax = 0) AS inserted",
        );
        self.run_upsert(qb).await
    }
}

#[async_trait]
impl NormalizedStore for PgNormalizedStore {
    async fn upsert_rows(&self, rows: &[NormalizedRow]) -> anyhow::Result<UpsertOutcome> {
        let Some(first) = rows.first() else {
            return Ok(UpsertOutcome::default());
        };

        match first {
            NormalizedRow::Sales(_) => {
                let typed = collect_typed(rows, |r| match r {
                    NormalizedRow::Sales(row) => Some(row),
                    _ => None,
                })?;
                self.upsert_sales(&typed).await
            },
            NormalizedRow::Payments(_) => {
                let typed = collect_typed(rows, |r| match r {
                    NormalizedRow::Payments(row) => Some(row),
                    _ => None,
                })?;
                self.upsert_payments(&typed).await
            },
            NormalizedRow::Production(_) => {
                let typed = collect_typed(rows, |r| match r {
                    NormalizedRow::Production(row) => Some(row),
                    _ => None,
                })?;
                self.upsert_production(&typed).await
            },
            NormalizedRow::Schedules(_) => {
                let typed = collect_typed(rows, |r| match r {
                    NormalizedRow::Schedules(row) => Some(row),
                    _ => None,
                })?;
                self.upsert_schedules(&typed).await
            },
        }
    }
}

/// Pair each row with its idempotency key, rejecting mixed sub-batches
fn collect_typed<'a, T>(
    rows: &'a [NormalizedRow],
    select: impl Fn(&'a NormalizedRow) -> Option<&'a T>,
) -> anyhow::Result<Vec<(String, &'a T)>> {
    rows.iter()
        .map(|row| {
            select(row)
                .map(|typed| (row.idempotency_key(), typed))
                .ok_or_else(|| anyhow::anyhow!("mixed data types in sub-batch"))
        })
        .collect()
}

/// [`JobStore`] backed by `sync_jobs` and `sync_runs`
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    job_id: Uuid,
    tenant_id: i32,
    data_types: Vec<String>,
    mode: String,
    period_start: NaiveDate,
    period_end: Option<NaiveDate>,
    status: String,
    period_cursor: Option<NaiveDate>,
    consecutive_empty_periods: i32,
    last_period_with_data: Option<NaiveDate>,
    periods_processed: i64,
    collected: i64,
    processed: i64,
    inserted: i64,
    updated: i64,
    errors: i64,
    error: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for BatchJob {
    type Error = anyhow::Error;

    fn try_from(row: JobRow) -> anyhow::Result<Self> {
        let data_types = row
            .data_types
            .iter()
            .map(|s| s.parse::<DataType>().map_err(|e| anyhow::anyhow!(e)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let mode = SyncMode::from_parts(&row.mode, row.period_start, row.period_end)?;

        Ok(BatchJob {
            job_id: row.job_id,
            tenant_id: row.tenant_id,
            data_types,
            mode,
            status: JobStatus::from(row.status),
            period_cursor: row.period_cursor,
            consecutive_empty_periods: row.consecutive_empty_periods.max(0) as u32,
            last_period_with_data: row.last_period_with_data,
            periods_processed: row.periods_processed,
            totals: JobTotals {
                collected: row.collected,
                processed: row.processed,
                inserted: row.inserted,
                updated: row.updated,
                errors: row.errors,
            },
            error: row.error,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

const JOB_COLUMNS: &str = "job_id, tenant_id, data_types, mode, period_start, period_end, \
                           status, period_cursor, consecutive_empty_periods, \
                           last_period_with_data, periods_processed, collected, processed, \
                           inserted, updated, errors, error, started_at, completed_at";

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert_job(&self, job: &BatchJob) -> anyhow::Result<()> {
        let (period_start, period_end) = job.mode.period_bounds();
        let data_types: Vec<String> = job.data_types.iter().map(|d| d.to_string()).collect();

        sqlx::query(
            r#"
            INSERT INTO sync_jobs (
                job_id, tenant_id, data_types, mode, period_start, period_end, status,
                periods_processed, collected, processed, inserted, updated, errors, started_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(job.job_id)
        .bind(job.tenant_id)
        .bind(&data_types)
        .bind(job.mode.as_str())
        .bind(period_start)
        .bind(period_end)
        .bind(job.status.as_str())
        .bind(job.periods_processed)
        .bind(job.totals.collected)
        .bind(job.totals.processed)
        .bind(job.totals.inserted)
        .bind(job.totals.updated)
        .bind(job.totals.errors)
        .bind(job.started_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert job")?;

        Ok(())
    }

    async fn update_job(&self, job: &BatchJob) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE sync_jobs
            SET status = $1,
                period_cursor = $2,
                consecutive_empty_periods = $3,
                last_period_with_data = $4,
                periods_processed = $5,
                collected = $6,
                processed = $7,
                inserted = $8,
                updated = $9,
                errors = $10,
                error = $11,
                completed_at = $12,
                updated_at = NOW()
            WHERE job_id = $13
            "#,
        )
        .bind(job.status.as_str())
        .bind(job.period_cursor)
        .bind(job.consecutive_empty_periods as i32)
        .bind(job.last_period_with_data)
        .bind(job.periods_processed)
        .bind(job.totals.collected)
        .bind(job.totals.processed)
        .bind(job.totals.inserted)
        .bind(job.totals.updated)
        .bind(job.totals.errors)
        .bind(&job.error)
        .bind(job.completed_at)
        .bind(job.job_id)
        .execute(&self.pool)
        .await
        .context("Failed to update job")?;

        Ok(())
    }

    async fn fetch_job(&self, job_id: Uuid) -> anyhow::Result<Option<BatchJob>> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM sync_jobs WHERE job_id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch job")?;

        row.map(BatchJob::try_from).transpose()
    }

    async fn list_jobs(
        &self,
        tenant_id: Option<i32>,
        status: Option<JobStatus>,
        limit: i64,
    ) -> anyhow::Result<Vec<BatchJob>> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {JOB_COLUMNS} FROM sync_jobs WHERE TRUE"
        ));
        if let Some(tenant_id) = tenant_id {
            qb.push(" AND tenant_id = ").push_bind(tenant_id);
        }
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status.as_str().to_string());
        }
        qb.push(" ORDER BY started_at DESC LIMIT ").push_bind(limit);

        let rows: Vec<JobRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list jobs")?;

        rows.into_iter().map(BatchJob::try_from).collect()
    }

    async fn record_run(&self, summary: &SyncSummary) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_runs (
                job_id, tenant_id, mode, status, periods_processed, total_collected,
                total_inserted, total_updated, total_errors, duration_seconds,
                period_start, period_end, last_period_with_data, started_at, finished_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(summary.job_id)
        .bind(summary.tenant_id)
        .bind(&summary.mode)
        .bind(summary.status.as_str())
        .bind(summary.periods_processed)
        .bind(summary.total_collected)
        .bind(summary.total_inserted)
        .bind(summary.total_updated)
        .bind(summary.total_errors)
        .bind(summary.duration_seconds)
        .bind(summary.period_start)
        .bind(summary.period_end)
        .bind(summary.last_period_with_data)
        .bind(summary.started_at)
        .bind(summary.finished_at)
        .execute(&self.pool)
        .await
        .context("Failed to record sync run")?;

        Ok(())
    }
}
