//! Canned vendor client for tests
//!
//! Serves scripted record sets keyed by (data type, period) and fails on
//! demand, so pipeline behavior can be exercised without a vendor endpoint.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{PageCursor, PageQuery, VendorClient, VendorPage};
use crate::error::VendorError;
use crate::model::{DataType, Vendor};

#[derive(Default)]
struct State {
    records: HashMap<(DataType, NaiveDate), Vec<Value>>,
    failures: HashSet<(DataType, NaiveDate)>,
}

/// In-memory [`VendorClient`] with scripted responses
pub struct StaticVendorClient {
    vendor: Vendor,
    state: Mutex<State>,
}

impl StaticVendorClient {
    pub fn new(vendor: Vendor) -> Self {
        Self {
            vendor,
            state: Mutex::new(State::default()),
        }
    }

    /// Script the records one (data type, period) query returns
    pub async fn put_records(&self, data_type: DataType, period: NaiveDate, records: Vec<Value>) {
        self.state
            .lock()
            .await
            .records
            .insert((data_type, period), records);
    }

    /// Make one (data type, period) query fail as vendor-unavailable
    pub async fn fail_on(&self, data_type: DataType, period: NaiveDate) {
        self.state
            .lock()
            .await
            .failures
            .insert((data_type, period));
    }
}

#[async_trait]
impl VendorClient for StaticVendorClient {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    async fn fetch_page(
        &self,
        query: &PageQuery,
        _cursor: Option<PageCursor>,
    ) -> Result<VendorPage, VendorError> {
        let state = self.state.lock().await;
        let key = (query.data_type, query.period);

        if state.failures.contains(&key) {
            return Err(VendorError::Unavailable("scripted outage".to_string()));
        }

        // unscripted queries behave as valid empty periods
        let records = state.records.get(&key).cloned().unwrap_or_default();
        Ok(VendorPage {
            records,
            next: None,
        })
    }
}
