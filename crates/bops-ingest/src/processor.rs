//! Staging processor
//!
//! Parses one staged payload into normalized rows and upserts them in
//! size-bounded sub-batches. A failed sub-batch is counted and does not
//! abort its siblings; partial progress survives. The `processed` flag only
//! flips once at least one row landed downstream (or the payload legally
//! derives zero rows), so a failed record can always be retried without
//! skipping real data.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::parse::{parse_rows, ParseContext};
use crate::store::{NormalizedStore, StagingRecord, StagingStore};

/// Processor tuning
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Upper bound on rows per atomic upsert call
    pub max_batch_rows: usize,
    /// Cooperative pause between sub-batches
    pub batch_pause: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_batch_rows: 1000,
            batch_pause: Duration::from_millis(100),
        }
    }
}

/// Counters for one processed staging record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingResult {
    /// Rows derived from the payload
    pub processed: u64,
    /// Rows newly inserted downstream
    pub inserted: u64,
    /// Rows that overwrote an existing idempotency key
    pub updated: u64,
    /// Sub-batches that failed to upsert
    pub errors: u64,
}

impl ProcessingResult {
    /// Rows that landed downstream, inserted or overwritten
    pub fn written(&self) -> u64 {
        self.inserted + self.updated
    }

    pub fn merge(&mut self, other: ProcessingResult) {
        self.processed += other.processed;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.errors += other.errors;
    }
}

pub struct Processor<S, N> {
    staging: Arc<S>,
    normalized: Arc<N>,
    config: ProcessorConfig,
    cancel: CancellationToken,
}

impl<S: StagingStore, N: NormalizedStore> Processor<S, N> {
    pub fn new(
        staging: Arc<S>,
        normalized: Arc<N>,
        config: ProcessorConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            staging,
            normalized,
            config,
            cancel,
        }
    }

    /// Process one staging record. Re-invoking on a processed record is a
    /// no-op; sub-batch failures are counted, never fatal.
    pub async fn process(&self, record: &StagingRecord) -> anyhow::Result<ProcessingResult> {
        if record.processed {
            debug!(staging_id = record.id, "record already processed, skipping");
            return Ok(ProcessingResult::default());
        }

        let ctx = ParseContext {
            tenant_id: record.tenant_id,
            period: record.period,
        };

        let rows = match parse_rows(record.data_type, &ctx, &record.payload) {
            Ok(rows) => rows,
            Err(e) => {
                // left unprocessed: eligible for reprocessing, not data loss
                warn!(
                    staging_id = record.id,
                    data_type = %record.data_type,
                    error = %e,
                    "staging payload malformed"
                );
                return Ok(ProcessingResult::default());
            },
        };

        if rows.is_empty() {
            self.staging.mark_processed(record.id, Utc::now()).await?;
            debug!(staging_id = record.id, "empty payload marked processed");
            return Ok(ProcessingResult::default());
        }

        let mut result = ProcessingResult {
            processed: rows.len() as u64,
            ..Default::default()
        };

        let batch_count = rows.len().div_ceil(self.config.max_batch_rows);
        for (index, chunk) in rows.chunks(self.config.max_batch_rows).enumerate() {
            if self.cancel.is_cancelled() {
                warn!(
                    staging_id = record.id,
                    batches_done = index,
                    batch_count,
                    "cancelled between sub-batches"
                );
                break;
            }

            match self.normalized.upsert_rows(chunk).await {
                Ok(outcome) => {
                    result.inserted += outcome.inserted;
                    result.updated += outcome.updated;
                    debug!(
                        staging_id = record.id,
                        batch = index + 1,
                        batch_count,
                        rows = chunk.len(),
                        inserted = outcome.inserted,
                        updated = outcome.updated,
                        "sub-batch upserted"
                    );
                },
                Err(e) => {
                    result.errors += 1;
                    warn!(
                        staging_id = record.id,
                        batch = index + 1,
                        batch_count,
                        error = %e,
                        "sub-batch upsert failed, continuing"
                    );
                },
            }

            if index + 1 < batch_count && !self.config.batch_pause.is_zero() {
                sleep(self.config.batch_pause).await;
            }
        }

        if result.written() > 0 {
            self.staging.mark_processed(record.id, Utc::now()).await?;
        }

        info!(
            staging_id = record.id,
            data_type = %record.data_type,
            period = %record.period,
            processed = result.processed,
            inserted = result.inserted,
            updated = result.updated,
            errors = result.errors,
            "staging record processed"
        );

        Ok(result)
    }

    /// Reprocess whatever is still unprocessed for a tenant, oldest first.
    pub async fn process_pending(
        &self,
        tenant_id: i32,
        limit: i64,
    ) -> anyhow::Result<ProcessingResult> {
        let pending = self.staging.select_unprocessed(tenant_id, limit).await?;
        info!(tenant_id, records = pending.len(), "reprocessing pending staging records");

        let mut total = ProcessingResult::default();
        for record in pending {
            if self.cancel.is_cancelled() {
                break;
            }
            total.merge(self.process(&record).await?);
        }
        Ok(total)
    }
}
