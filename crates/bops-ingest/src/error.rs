//! Error taxonomy for the ingestion pipeline
//!
//! Vendor transport failures are period-scoped and retryable by
//! re-invocation; a payload that cannot be parsed stays in staging for
//! reprocessing; sub-batch upsert failures are counted by the processor and
//! never bubble past it.

use thiserror::Error;

use crate::model::DataType;

/// Failure talking to a vendor API. Distinct from an empty page, which is a
/// valid response carrying zero records.
#[derive(Error, Debug)]
pub enum VendorError {
    #[error("vendor unavailable: {0}")]
    Unavailable(String),

    #[error("vendor authentication failed: {0}")]
    Auth(String),

    #[error("data type {0} not served by this vendor")]
    Unsupported(DataType),
}

impl VendorError {
    /// Whether another attempt against the same endpoint can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, VendorError::Unavailable(_))
    }
}

/// A staging payload the processor cannot derive rows from.
///
/// The staging record is left unprocessed so the period can be reprocessed
/// once the payload (or the parser) is fixed.
#[derive(Error, Debug)]
#[error("malformed payload: {0}")]
pub struct MalformedPayload(pub String);

/// Collector failure for one (tenant, data type, period)
#[derive(Error, Debug)]
pub enum CollectError {
    #[error(transparent)]
    Vendor(#[from] VendorError),

    #[error("staging write failed: {0}")]
    Staging(#[source] anyhow::Error),
}
