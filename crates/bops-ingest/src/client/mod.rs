//! Vendor API clients
//!
//! Every vendor read goes through [`VendorClient::fetch_page`]: the client
//! hides credentials, rate-limit courtesy delays, and pagination cursors.
//! Pagination ends when a page comes back shorter than the requested size
//! (or the protocol has none). Transport and auth failures surface as
//! [`VendorError`]; an empty page is a valid response, not an error.

pub mod books;
pub mod credentials;
pub mod memory;
pub mod pos;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::error::VendorError;
use crate::model::{DataType, Vendor};

/// One vendor read request: a single data type over a single business day
#[derive(Debug, Clone, Copy)]
pub struct PageQuery {
    pub tenant_id: i32,
    pub data_type: DataType,
    pub period: NaiveDate,
}

/// Opaque pagination position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub offset: u64,
}

/// One page of vendor-native records
#[derive(Debug, Clone)]
pub struct VendorPage {
    pub records: Vec<Value>,
    /// Cursor for the next page; None terminates pagination
    pub next: Option<PageCursor>,
}

/// Paginated, authenticated read access to one vendor API
#[async_trait]
pub trait VendorClient: Send + Sync {
    fn vendor(&self) -> Vendor;

    async fn fetch_page(
        &self,
        query: &PageQuery,
        cursor: Option<PageCursor>,
    ) -> Result<VendorPage, VendorError>;
}

/// Routes each data type to the client of the vendor serving it
#[derive(Clone)]
pub struct ClientRegistry {
    pos: Arc<dyn VendorClient>,
    books: Arc<dyn VendorClient>,
}

impl ClientRegistry {
    pub fn new(pos: Arc<dyn VendorClient>, books: Arc<dyn VendorClient>) -> Self {
        Self { pos, books }
    }

    pub fn client_for(&self, data_type: DataType) -> &dyn VendorClient {
        match data_type.vendor() {
            Vendor::Pos => self.pos.as_ref(),
            Vendor::Books => self.books.as_ref(),
        }
    }
}
