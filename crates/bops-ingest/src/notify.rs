//! Notification sink
//!
//! Terminal job summaries go out as a webhook embed (Discord-compatible
//! shape): green on a clean run, amber on partial errors, red on a failed
//! job. Sink failures are the caller's warning, never a pipeline failure.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::jobs::{JobStatus, SyncSummary};

const COLOR_SUCCESS: u32 = 0x2ecc71;
const COLOR_PARTIAL: u32 = 0xe67e22;
const COLOR_FAILURE: u32 = 0xe74c3c;

/// Receives terminal job summaries
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, summary: &SyncSummary) -> anyhow::Result<()>;
}

/// Sink for deployments without a webhook configured
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn notify(&self, summary: &SyncSummary) -> anyhow::Result<()> {
        debug!(job_id = %summary.job_id, "no webhook configured, summary not sent");
        Ok(())
    }
}

/// Webhook sink posting one embed per finished job
pub struct WebhookSink {
    http: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(http: reqwest::Client, url: String) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn notify(&self, summary: &SyncSummary) -> anyhow::Result<()> {
        let response = self
            .http
            .post(&self.url)
            .json(&embed_payload(summary))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("webhook returned status {}", response.status());
        }
        Ok(())
    }
}

/// Build the embed body for a summary
pub fn embed_payload(summary: &SyncSummary) -> Value {
    let (title, color) = match summary.status {
        JobStatus::Failed => ("Vendor sync failed", COLOR_FAILURE),
        JobStatus::Cancelled => ("Vendor sync cancelled", COLOR_PARTIAL),
        _ if summary.total_errors > 0 => ("Vendor sync completed with errors", COLOR_PARTIAL),
        _ => ("Vendor sync completed", COLOR_SUCCESS),
    };

    let mut lines = vec![
        format!("**Tenant:** {}", summary.tenant_id),
        format!("**Mode:** {}", summary.mode),
        format!("**Periods processed:** {}", summary.periods_processed),
        format!("**Records collected:** {}", summary.total_collected),
        format!(
            "**Rows written:** {} ({} new, {} updated)",
            summary.total_inserted + summary.total_updated,
            summary.total_inserted,
            summary.total_updated
        ),
        format!("**Errors:** {}", summary.total_errors),
        format!("**Duration:** {:.1}s", summary.duration_seconds),
    ];
    if let Some(last) = summary.last_period_with_data {
        lines.push(format!("**Last period with data:** {}", last));
    }

    json!({
        "embeds": [{
            "title": title,
            "description": lines.join("\n"),
            "color": color,
            "timestamp": summary.finished_at.to_rfc3339(),
            "footer": { "text": "BOPS vendor sync" }
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn summary(status: JobStatus, errors: i64) -> SyncSummary {
        SyncSummary {
            job_id: Uuid::new_v4(),
            tenant_id: 3,
            mode: "backlog".to_string(),
            status,
            periods_processed: 7,
            total_collected: 120,
            total_inserted: 100,
            total_updated: 15,
            total_errors: errors,
            duration_seconds: 42.5,
            period_start: NaiveDate::parse_from_str("2026-02-01", "%Y-%m-%d").unwrap(),
            period_end: None,
            last_period_with_data: NaiveDate::parse_from_str("2026-02-04", "%Y-%m-%d").ok(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_embed_color_by_outcome() {
        let clean = embed_payload(&summary(JobStatus::Completed, 0));
        assert_eq!(clean["embeds"][0]["color"], COLOR_SUCCESS);
        assert_eq!(clean["embeds"][0]["title"], "Vendor sync completed");

        let partial = embed_payload(&summary(JobStatus::Completed, 2));
        assert_eq!(partial["embeds"][0]["color"], COLOR_PARTIAL);

        let failed = embed_payload(&summary(JobStatus::Failed, 0));
        assert_eq!(failed["embeds"][0]["color"], COLOR_FAILURE);
        assert_eq!(failed["embeds"][0]["title"], "Vendor sync failed");
    }

    #[test]
    fn test_embed_carries_summary_fields() {
        let payload = embed_payload(&summary(JobStatus::Completed, 1));
        let description = payload["embeds"][0]["description"].as_str().unwrap();

        assert!(description.contains("**Tenant:** 3"));
        assert!(description.contains("**Periods processed:** 7"));
        assert!(description.contains("115 (100 new, 15 updated)"));
        assert!(description.contains("**Errors:** 1"));
        assert!(description.contains("**Last period with data:** 2026-02-04"));
        assert_eq!(payload["embeds"][0]["footer"]["text"], "BOPS vendor sync");
    }
}
