//! BOPS Ingest - vendor sync tool
//!
//! Manual entry point for period, range, backlog, and reprocessing syncs.

use std::sync::Arc;

use anyhow::{Context, Result};
use bops_common::logging::{init_logging, LogConfig, LogLevel};
use bops_ingest::collector::Collector;
use bops_ingest::jobs::{BatchJob, JobStatus, SyncMode};
use bops_ingest::model::DataType;
use bops_ingest::orchestrator::SyncOrchestrator;
use bops_ingest::processor::Processor;
use bops_ingest::store::postgres::{PgJobStore, PgNormalizedStore, PgStagingStore};
use bops_ingest::IngestConfig;
use chrono::NaiveDate;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "bops-ingest")]
#[command(author, version, about = "BOPS vendor sync tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Sync a single business day
    Sync {
        /// Tenant (bar) id
        #[arg(short, long)]
        tenant: i32,

        /// Business day (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Data types to sync; defaults to all
        #[arg(long, value_delimiter = ',')]
        types: Vec<DataType>,
    },

    /// Sync an inclusive date range
    Range {
        #[arg(short, long)]
        tenant: i32,

        /// First business day (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Last business day (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,

        #[arg(long, value_delimiter = ',')]
        types: Vec<DataType>,
    },

    /// Crawl forward from a start date until the data runs out
    Backlog {
        #[arg(short, long)]
        tenant: i32,

        /// Start boundary (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        #[arg(long, value_delimiter = ',')]
        types: Vec<DataType>,
    },

    /// Reprocess staged records that never made it downstream
    Reprocess {
        #[arg(short, long)]
        tenant: i32,

        /// Maximum staged records to pick up
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
}

fn data_types(types: Vec<DataType>) -> Vec<DataType> {
    if types.is_empty() {
        DataType::ALL.to_vec()
    } else {
        types
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("bops-ingest".to_string())
        .build();
    let log_config = LogConfig::from_env().unwrap_or(log_config);
    init_logging(&log_config)?;

    let config = IngestConfig::from_env().context("Failed to load ingest configuration")?;

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    let staging = Arc::new(PgStagingStore::new(pool.clone()));
    let normalized = Arc::new(PgNormalizedStore::new(pool.clone()));
    let jobs = Arc::new(PgJobStore::new(pool));
    let cancel = CancellationToken::new();

    let orchestrator = SyncOrchestrator::new(
        Collector::new(config.client_registry()?, staging.clone()),
        Processor::new(
            staging.clone(),
            normalized.clone(),
            config.processor_config(),
            cancel.clone(),
        ),
        jobs,
        config.notification_sink(),
        config.orchestrator_config(),
        cancel.clone(),
    );

    let job = match cli.command {
        Command::Sync { tenant, date, types } => Some(BatchJob::new(
            tenant,
            data_types(types),
            SyncMode::SinglePeriod { period: date },
        )),
        Command::Range { tenant, from, to, types } => Some(BatchJob::new(
            tenant,
            data_types(types),
            SyncMode::Continuous { start: from, end: to },
        )),
        Command::Backlog { tenant, from, types } => Some(BatchJob::new(
            tenant,
            data_types(types),
            SyncMode::Backlog { start: from },
        )),
        Command::Reprocess { tenant, limit } => {
            let processor = Processor::new(
                staging,
                normalized,
                config.processor_config(),
                cancel,
            );
            let result = processor.process_pending(tenant, limit).await?;
            info!(
                processed = result.processed,
                inserted = result.inserted,
                updated = result.updated,
                errors = result.errors,
                "reprocessing finished"
            );
            None
        },
    };

    if let Some(mut job) = job {
        let summary = orchestrator.run_job(&mut job).await?;
        info!(
            job_id = %summary.job_id,
            status = summary.status.as_str(),
            periods = summary.periods_processed,
            inserted = summary.total_inserted,
            errors = summary.total_errors,
            "sync finished"
        );

        if summary.status == JobStatus::Failed {
            anyhow::bail!("sync job failed: {}", job.error.unwrap_or_default());
        }
    }

    Ok(())
}
