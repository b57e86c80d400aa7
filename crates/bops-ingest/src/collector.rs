//! Period collector
//!
//! Drains vendor pagination for one (tenant, data type, period) and writes
//! exactly one staging record. An empty period still writes a record: the
//! orchestrator's empty-period heuristic needs the difference between
//! "collected, nothing there" and "never attempted". A vendor failure
//! writes nothing, staging is all-or-nothing per period.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, info};

use crate::client::{ClientRegistry, PageQuery};
use crate::error::CollectError;
use crate::model::DataType;
use crate::store::{NewStagingRecord, StagingRecord, StagingStore};

pub struct Collector<S> {
    clients: ClientRegistry,
    staging: Arc<S>,
}

impl<S: StagingStore> Collector<S> {
    pub fn new(clients: ClientRegistry, staging: Arc<S>) -> Self {
        Self { clients, staging }
    }

    /// Collect one data type for one business day into staging.
    pub async fn collect(
        &self,
        tenant_id: i32,
        data_type: DataType,
        period: NaiveDate,
    ) -> Result<StagingRecord, CollectError> {
        let client = self.clients.client_for(data_type);
        let query = PageQuery {
            tenant_id,
            data_type,
            period,
        };

        let mut records = Vec::new();
        let mut cursor = None;
        loop {
            let page = client.fetch_page(&query, cursor).await?;
            debug!(
                tenant_id,
                data_type = %data_type,
                %period,
                page_records = page.records.len(),
                "vendor page received"
            );
            records.extend(page.records);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let record_count = records.len();
        let staged = self
            .staging
            .upsert_raw(NewStagingRecord {
                tenant_id,
                data_type,
                period,
                payload: json!({ "records": records }),
                record_count: record_count as i32,
            })
            .await
            .map_err(CollectError::Staging)?;

        info!(
            tenant_id,
            data_type = %data_type,
            %period,
            record_count,
            staging_id = staged.id,
            "period collected"
        );

        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::memory::StaticVendorClient;
    use crate::error::VendorError;
    use crate::model::Vendor;
    use crate::store::memory::MemoryStagingStore;
    use serde_json::json;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn registry() -> (Arc<StaticVendorClient>, Arc<StaticVendorClient>, ClientRegistry) {
        let pos = Arc::new(StaticVendorClient::new(Vendor::Pos));
        let books = Arc::new(StaticVendorClient::new(Vendor::Books));
        let registry = ClientRegistry::new(pos.clone(), books.clone());
        (pos, books, registry)
    }

    #[tokio::test]
    async fn test_collect_writes_one_staging_record() {
        let (pos, _books, registry) = registry();
        pos.put_records(
            DataType::Sales,
            d("2026-02-01"),
            vec![json!({"receipt": 1, "item": 1}), json!({"receipt": 1, "item": 2})],
        )
        .await;

        let staging = Arc::new(MemoryStagingStore::new());
        let collector = Collector::new(registry, staging.clone());

        let staged = collector
            .collect(3, DataType::Sales, d("2026-02-01"))
            .await
            .unwrap();

        assert_eq!(staged.record_count, 2);
        assert!(!staged.processed);
        assert_eq!(staged.payload["records"].as_array().unwrap().len(), 2);
        assert_eq!(staging.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_period_still_writes_a_record() {
        let (_pos, _books, registry) = registry();
        let staging = Arc::new(MemoryStagingStore::new());
        let collector = Collector::new(registry, staging.clone());

        let staged = collector
            .collect(3, DataType::Payments, d("2026-02-01"))
            .await
            .unwrap();

        assert_eq!(staged.record_count, 0);
        assert_eq!(staged.payload["records"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_vendor_failure_writes_nothing() {
        let (pos, _books, registry) = registry();
        pos.fail_on(DataType::Sales, d("2026-02-01")).await;

        let staging = Arc::new(MemoryStagingStore::new());
        let collector = Collector::new(registry, staging.clone());

        let err = collector
            .collect(3, DataType::Sales, d("2026-02-01"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CollectError::Vendor(VendorError::Unavailable(_))
        ));
        assert!(staging.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_schedules_route_to_books_client() {
        let (_pos, books, registry) = registry();
        books
            .put_records(
                DataType::Schedules,
                d("2026-02-01"),
                vec![json!({"schedule_id": "sch-1"})],
            )
            .await;

        let staging = Arc::new(MemoryStagingStore::new());
        let collector = Collector::new(registry, staging);

        let staged = collector
            .collect(3, DataType::Schedules, d("2026-02-01"))
            .await
            .unwrap();

        assert_eq!(staged.record_count, 1);
    }
}
