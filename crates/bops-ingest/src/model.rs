//! Normalized row shapes for the warehouse tables
//!
//! Each vendor data type maps to one row shape; the [`NormalizedRow`] tagged
//! union is what flows from the processor's parse step into the upsert
//! layer. Every row derives a deterministic idempotency key from stable
//! business fields, never from store ids or generation order, so replaying
//! the same staging payload overwrites instead of duplicating.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Upstream vendor serving a data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    /// Point-of-sale analytics API (session auth, one query per day)
    Pos,
    /// Accounting API (token auth, offset pagination)
    Books,
}

impl Vendor {
    pub fn as_str(&self) -> &str {
        match self {
            Vendor::Pos => "pos",
            Vendor::Books => "books",
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vendor data type handled by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Itemized product sales
    Sales,
    /// Payment transactions
    Payments,
    /// Per-item production timing events
    Production,
    /// Accounting schedule entries
    Schedules,
}

impl DataType {
    /// All data types, in collection order
    pub const ALL: [DataType; 4] = [
        DataType::Sales,
        DataType::Payments,
        DataType::Production,
        DataType::Schedules,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            DataType::Sales => "sales",
            DataType::Payments => "payments",
            DataType::Production => "production",
            DataType::Schedules => "schedules",
        }
    }

    /// Which vendor serves this data type
    pub fn vendor(&self) -> Vendor {
        match self {
            DataType::Sales | DataType::Payments | DataType::Production => Vendor::Pos,
            DataType::Schedules => Vendor::Books,
        }
    }
}

impl std::str::FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sales" => Ok(DataType::Sales),
            "payments" => Ok(DataType::Payments),
            "production" => Ok(DataType::Production),
            "schedules" => Ok(DataType::Schedules),
            _ => Err(format!("unknown data type: {}", s)),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Itemized product sale line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRow {
    pub tenant_id: i32,
    pub period: NaiveDate,
    pub week: i32,
    /// Vendor line-item id within the receipt
    pub item_id: i64,
    /// Vendor receipt/transaction id
    pub receipt_id: i64,
    /// Sub-location within the venue (floor, rooftop, delivery, ...)
    pub location: String,
    pub table_label: String,
    pub product_id: String,
    pub product: String,
    pub group_name: String,
    pub staff: String,
    pub sale_kind: String,
    pub qty: f64,
    pub discount: f64,
    pub gross_value: f64,
    pub cost: f64,
}

/// Payment transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRow {
    pub tenant_id: i32,
    pub period: NaiveDate,
    pub week: i32,
    /// Vendor payment id
    pub payment_id: String,
    /// Vendor receipt/transaction id
    pub receipt_id: String,
    /// Business date + wall-clock time the payment was recorded
    pub recorded_at: Option<NaiveDateTime>,
    /// Business date + wall-clock time the payment settled
    pub settled_at: Option<NaiveDateTime>,
    pub table_label: String,
    pub customer: String,
    pub method: String,
    pub card_brand: String,
    pub auth_code: String,
    pub gross: f64,
    pub fee: f64,
    pub fee_pct: f64,
    pub net: f64,
    pub credit_date: Option<NaiveDate>,
}

/// Production timing for one ordered item, local wall-clock frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRow {
    pub tenant_id: i32,
    pub period: NaiveDate,
    /// Vendor order-item id
    pub order_item: String,
    pub product_id: String,
    pub product: String,
    pub group_name: String,
    /// Production station that handled the item
    pub station: String,
    pub table_label: String,
    pub location: String,
    pub ordered_at: Option<NaiveDateTime>,
    pub prep_started_at: Option<NaiveDateTime>,
    pub prep_finished_at: Option<NaiveDateTime>,
    pub delivered_at: Option<NaiveDateTime>,
    /// Elapsed seconds between stages; None when either endpoint is missing
    /// or the pair is out of order
    pub order_to_start_secs: Option<i64>,
    pub order_to_finish_secs: Option<i64>,
    pub order_to_delivery_secs: Option<i64>,
    pub start_to_finish_secs: Option<i64>,
    pub finish_to_delivery_secs: Option<i64>,
    pub qty: i64,
}

/// Accounting schedule entry (payable/receivable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub tenant_id: i32,
    /// Collection period the entry was observed under
    pub period: NaiveDate,
    /// Vendor schedule id, unique per accounting organization
    pub schedule_id: String,
    pub entry_kind: String,
    pub status: String,
    pub value: f64,
    pub paid_value: f64,
    pub due_date: Option<NaiveDate>,
    pub payment_date: Option<NaiveDate>,
    pub accrual_date: Option<NaiveDate>,
    pub description: String,
    pub category_id: String,
    pub category: String,
    pub stakeholder_id: String,
    pub stakeholder: String,
    pub document_number: String,
    pub installment: Option<i32>,
    pub installments: Option<i32>,
    pub deleted: bool,
}

/// Tagged union over the normalized row shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "data_type", rename_all = "snake_case")]
pub enum NormalizedRow {
    Sales(SalesRow),
    Payments(PaymentRow),
    Production(ProductionRow),
    Schedules(ScheduleRow),
}

impl NormalizedRow {
    pub fn data_type(&self) -> DataType {
        match self {
            NormalizedRow::Sales(_) => DataType::Sales,
            NormalizedRow::Payments(_) => DataType::Payments,
            NormalizedRow::Production(_) => DataType::Production,
            NormalizedRow::Schedules(_) => DataType::Schedules,
        }
    }

    pub fn tenant_id(&self) -> i32 {
        match self {
            NormalizedRow::Sales(r) => r.tenant_id,
            NormalizedRow::Payments(r) => r.tenant_id,
            NormalizedRow::Production(r) => r.tenant_id,
            NormalizedRow::Schedules(r) => r.tenant_id,
        }
    }

    /// Deterministic upsert conflict key.
    ///
    /// Derived only from stable business identifiers; schedule entries key on
    /// the vendor schedule id alone so a later period's observation of the
    /// same entry overwrites the earlier one.
    pub fn idempotency_key(&self) -> String {
        match self {
            NormalizedRow::Sales(r) => hash_key(&[
                "sales",
                &r.tenant_id.to_string(),
                &r.period.to_string(),
                &r.receipt_id.to_string(),
                &r.item_id.to_string(),
                &r.location,
            ]),
            NormalizedRow::Payments(r) => hash_key(&[
                "payments",
                &r.tenant_id.to_string(),
                &r.period.to_string(),
                &r.payment_id,
                &r.receipt_id,
            ]),
            NormalizedRow::Production(r) => hash_key(&[
                "production",
                &r.tenant_id.to_string(),
                &r.period.to_string(),
                &r.order_item,
            ]),
            NormalizedRow::Schedules(r) => {
                hash_key(&["schedules", &r.tenant_id.to_string(), &r.schedule_id])
            },
        }
    }
}

/// SHA-256 over ":"-joined business fields, hex encoded
fn hash_key(fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update(b":");
        }
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}
