//! Point-of-sale vendor client
//!
//! The POS API multiplexes every data type through one query endpoint
//! distinguished by a numeric query code, scoped to the session's account.
//! A day's worth of records comes back in a single `{"list": [...]}`
//! response, so pagination terminates after the first page.

use async_trait::async_trait;

use super::credentials::PosSessionProvider;
use super::retry::{RetryPolicy, Throttle};
use super::{PageCursor, PageQuery, VendorClient, VendorPage};
use crate::error::VendorError;
use crate::model::{DataType, Vendor};

pub struct PosClient {
    http: reqwest::Client,
    base_url: String,
    credentials: PosSessionProvider,
    throttle: Throttle,
    retry: RetryPolicy,
}

impl PosClient {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        credentials: PosSessionProvider,
        throttle: Throttle,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url,
            credentials,
            throttle,
            retry,
        }
    }

    /// Vendor query code for a data type
    fn query_code(data_type: DataType) -> Result<u32, VendorError> {
        match data_type {
            DataType::Sales => Ok(77),
            DataType::Payments => Ok(7),
            DataType::Production => Ok(81),
            DataType::Schedules => Err(VendorError::Unsupported(data_type)),
        }
    }

    async fn fetch_day(&self, query: &PageQuery) -> Result<VendorPage, VendorError> {
        let code = Self::query_code(query.data_type)?;
        let session = self.credentials.session().await?;

        let url = format!(
            "{}/query/{}?day={}&account={}",
            self.base_url, code, query.period, session.account
        );

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::COOKIE, &session.cookie)
            .send()
            .await
            .map_err(|e| VendorError::Unavailable(format!("query request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            // session expired server-side; next attempt re-establishes it
            self.credentials.invalidate().await;
            return Err(VendorError::Unavailable(format!(
                "session rejected with status {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(VendorError::Unavailable(format!(
                "query returned status {}",
                status
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VendorError::Unavailable(format!("query response not JSON: {}", e)))?;

        let records = body
            .get("list")
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(VendorPage {
            records,
            next: None,
        })
    }
}

#[async_trait]
impl VendorClient for PosClient {
    fn vendor(&self) -> Vendor {
        Vendor::Pos
    }

    async fn fetch_page(
        &self,
        query: &PageQuery,
        _cursor: Option<PageCursor>,
    ) -> Result<VendorPage, VendorError> {
        self.throttle.wait().await;
        self.retry
            .run("pos_query", || self.fetch_day(query))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_codes() {
        assert_eq!(PosClient::query_code(DataType::Sales).unwrap(), 77);
        assert_eq!(PosClient::query_code(DataType::Payments).unwrap(), 7);
        assert_eq!(PosClient::query_code(DataType::Production).unwrap(), 81);
        assert!(matches!(
            PosClient::query_code(DataType::Schedules),
            Err(VendorError::Unsupported(DataType::Schedules))
        ));
    }
}
