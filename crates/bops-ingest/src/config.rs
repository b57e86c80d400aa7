//! Ingestion configuration
//!
//! Env-var driven configuration for the vendor clients and the pipeline
//! knobs: sub-batch size, pauses, retry/backoff, and the backlog
//! empty-period threshold. Thresholds are global rather than per vendor;
//! nothing in the data has motivated per-type overrides.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::books::BooksClient;
use crate::client::credentials::{BooksCredentials, PosLogin, PosSessionProvider};
use crate::client::pos::PosClient;
use crate::client::retry::{RetryPolicy, Throttle};
use crate::client::ClientRegistry;
use crate::notify::{NoopSink, NotificationSink, WebhookSink};
use crate::orchestrator::OrchestratorConfig;
use crate::processor::ProcessorConfig;

/// POS vendor connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosConfig {
    pub base_url: String,
    pub email: String,
    pub password: String,
}

/// Accounting vendor connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BooksConfig {
    pub base_url: String,
    pub api_token: String,
    pub organization_id: String,
    /// Page size for `$skip`/`$top` pagination
    pub page_size: u64,
}

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub pos: PosConfig,
    pub books: BooksConfig,
    /// Minimum spacing between calls to one vendor, in milliseconds
    pub min_call_interval_ms: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    /// Upper bound on rows per atomic upsert call
    pub max_batch_rows: usize,
    /// Pause between sub-batches, in milliseconds
    pub batch_pause_ms: u64,
    /// Consecutive empty periods that stop a backlog crawl
    pub empty_period_threshold: u32,
    /// Pause between periods, in milliseconds
    pub period_pause_ms: u64,
    /// Webhook for terminal job summaries; None disables notifications
    pub webhook_url: Option<String>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl IngestConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            pos: PosConfig {
                base_url: env_or("BOPS_POS_BASE_URL", "https://api.pos.example.com"),
                email: env_or("BOPS_POS_EMAIL", ""),
                password: env_or("BOPS_POS_PASSWORD", ""),
            },
            books: BooksConfig {
                base_url: env_or("BOPS_BOOKS_BASE_URL", "https://api.books.example.com/v1"),
                api_token: env_or("BOPS_BOOKS_API_TOKEN", ""),
                organization_id: env_or("BOPS_BOOKS_ORGANIZATION_ID", ""),
                page_size: env_parse("BOPS_BOOKS_PAGE_SIZE", 500),
            },
            min_call_interval_ms: env_parse("BOPS_MIN_CALL_INTERVAL_MS", 200),
            retry_max_attempts: env_parse("BOPS_RETRY_MAX_ATTEMPTS", 3),
            retry_base_delay_ms: env_parse("BOPS_RETRY_BASE_DELAY_MS", 500),
            max_batch_rows: env_parse("BOPS_MAX_BATCH_ROWS", 1000),
            batch_pause_ms: env_parse("BOPS_BATCH_PAUSE_MS", 100),
            empty_period_threshold: env_parse("BOPS_EMPTY_PERIOD_THRESHOLD", 3),
            period_pause_ms: env_parse("BOPS_PERIOD_PAUSE_MS", 250),
            webhook_url: std::env::var("BOPS_WEBHOOK_URL").ok().filter(|s| !s.is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pos.base_url.is_empty() {
            anyhow::bail!("BOPS_POS_BASE_URL cannot be empty");
        }
        if self.pos.email.is_empty() || self.pos.password.is_empty() {
            anyhow::bail!("BOPS_POS_EMAIL and BOPS_POS_PASSWORD must be set");
        }
        if self.books.base_url.is_empty() {
            anyhow::bail!("BOPS_BOOKS_BASE_URL cannot be empty");
        }
        if self.books.api_token.is_empty() || self.books.organization_id.is_empty() {
            anyhow::bail!("BOPS_BOOKS_API_TOKEN and BOPS_BOOKS_ORGANIZATION_ID must be set");
        }
        if self.books.page_size == 0 {
            anyhow::bail!("BOPS_BOOKS_PAGE_SIZE must be greater than 0");
        }
        if self.max_batch_rows == 0 {
            anyhow::bail!("BOPS_MAX_BATCH_ROWS must be greater than 0");
        }
        if self.empty_period_threshold == 0 {
            anyhow::bail!("BOPS_EMPTY_PERIOD_THRESHOLD must be greater than 0");
        }
        if self.retry_max_attempts == 0 {
            anyhow::bail!("BOPS_RETRY_MAX_ATTEMPTS must be greater than 0");
        }
        Ok(())
    }

    pub fn min_call_interval(&self) -> Duration {
        Duration::from_millis(self.min_call_interval_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            max_batch_rows: self.max_batch_rows,
            batch_pause: Duration::from_millis(self.batch_pause_ms),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            empty_period_threshold: self.empty_period_threshold,
            period_pause: Duration::from_millis(self.period_pause_ms),
            backlog_end: None,
        }
    }

    /// Build the vendor clients this configuration describes
    pub fn client_registry(&self) -> anyhow::Result<ClientRegistry> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let pos = PosClient::new(
            http.clone(),
            self.pos.base_url.clone(),
            PosSessionProvider::new(
                http.clone(),
                self.pos.base_url.clone(),
                PosLogin {
                    email: self.pos.email.clone(),
                    password: self.pos.password.clone(),
                },
            ),
            Throttle::new(self.min_call_interval()),
            self.retry_policy(),
        );

        let books = BooksClient::new(
            http,
            self.books.base_url.clone(),
            BooksCredentials {
                api_token: self.books.api_token.clone(),
                organization_id: self.books.organization_id.clone(),
            },
            self.books.page_size,
            Throttle::new(self.min_call_interval()),
            self.retry_policy(),
        );

        Ok(ClientRegistry::new(Arc::new(pos), Arc::new(books)))
    }

    /// Build the notification sink this configuration describes
    pub fn notification_sink(&self) -> Arc<dyn NotificationSink> {
        match &self.webhook_url {
            Some(url) => Arc::new(WebhookSink::new(reqwest::Client::new(), url.clone())),
            None => Arc::new(NoopSink),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            pos: PosConfig {
                base_url: "https://api.pos.example.com".to_string(),
                email: String::new(),
                password: String::new(),
            },
            books: BooksConfig {
                base_url: "https://api.books.example.com/v1".to_string(),
                api_token: String::new(),
                organization_id: String::new(),
                page_size: 500,
            },
            min_call_interval_ms: 200,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
            max_batch_rows: 1000,
            batch_pause_ms: 100,
            empty_period_threshold: 3,
            period_pause_ms: 250,
            webhook_url: None,
        }
    }
}
