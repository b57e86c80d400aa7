//! Accounting vendor client
//!
//! Token-authenticated OData-style API: `$skip`/`$top` pagination ordered
//! by id, filtered to the accrual day being synced. A page shorter than the
//! requested size terminates pagination.

use async_trait::async_trait;

use super::credentials::BooksCredentials;
use super::retry::{RetryPolicy, Throttle};
use super::{PageCursor, PageQuery, VendorClient, VendorPage};
use crate::error::VendorError;
use crate::model::{DataType, Vendor};

pub struct BooksClient {
    http: reqwest::Client,
    base_url: String,
    credentials: BooksCredentials,
    page_size: u64,
    throttle: Throttle,
    retry: RetryPolicy,
}

impl BooksClient {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        credentials: BooksCredentials,
        page_size: u64,
        throttle: Throttle,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url,
            credentials,
            page_size: page_size.max(1),
            throttle,
            retry,
        }
    }

    fn endpoint(data_type: DataType) -> Result<&'static str, VendorError> {
        match data_type {
            DataType::Schedules => Ok("schedules"),
            other => Err(VendorError::Unsupported(other)),
        }
    }

    async fn fetch_offset(
        &self,
        query: &PageQuery,
        offset: u64,
    ) -> Result<VendorPage, VendorError> {
        let endpoint = Self::endpoint(query.data_type)?;

        let url = format!(
            "{}/organizations/{}/{}",
            self.base_url, self.credentials.organization_id, endpoint
        );

        let response = self
            .http
            .get(&url)
            .header("apitoken", &self.credentials.api_token)
            .query(&[
                ("$orderby", "id".to_string()),
                ("$top", self.page_size.to_string()),
                ("$skip", offset.to_string()),
                ("accrualDate", query.period.to_string()),
            ])
            .send()
            .await
            .map_err(|e| VendorError::Unavailable(format!("schedules request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(VendorError::Auth(format!(
                "api token rejected with status {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(VendorError::Unavailable(format!(
                "schedules returned status {}",
                status
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VendorError::Unavailable(format!("schedules response not JSON: {}", e)))?;

        let records = body
            .get("items")
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default();

        let next = (records.len() as u64 == self.page_size).then(|| PageCursor {
            offset: offset + self.page_size,
        });

        Ok(VendorPage { records, next })
    }
}

#[async_trait]
impl VendorClient for BooksClient {
    fn vendor(&self) -> Vendor {
        Vendor::Books
    }

    async fn fetch_page(
        &self,
        query: &PageQuery,
        cursor: Option<PageCursor>,
    ) -> Result<VendorPage, VendorError> {
        let offset = cursor.map_or(0, |c| c.offset);
        self.throttle.wait().await;
        self.retry
            .run("books_schedules", || self.fetch_offset(query, offset))
            .await
    }
}
