//! Payment transaction parser

use serde_json::Value;

use bops_common::period::iso_week;

use super::{f64_or, join_local, opt_date, require_str, str_or, ParseContext};
use crate::error::MalformedPayload;
use crate::model::{NormalizedRow, PaymentRow};

/// Map one vendor payment. The vendor reports the business date and the
/// wall-clock times separately; they join textually into local timestamps.
pub(super) fn parse_item(
    ctx: &ParseContext,
    item: &Value,
) -> Result<NormalizedRow, MalformedPayload> {
    let payment_id = require_str(item, "payment")?;
    let receipt_id = {
        let receipt = str_or(item, "receipt");
        if receipt.is_empty() {
            payment_id.clone()
        } else {
            receipt
        }
    };

    // settlement may land on the next business day
    let settled_date = opt_date(item, "settled_date").unwrap_or(ctx.period);

    Ok(NormalizedRow::Payments(PaymentRow {
        tenant_id: ctx.tenant_id,
        period: ctx.period,
        week: iso_week(ctx.period) as i32,
        payment_id,
        receipt_id,
        recorded_at: join_local(ctx.period, &str_or(item, "recorded_time")),
        settled_at: join_local(settled_date, &str_or(item, "settled_time")),
        table_label: str_or(item, "table"),
        customer: str_or(item, "customer"),
        method: str_or(item, "method"),
        card_brand: str_or(item, "card"),
        auth_code: str_or(item, "auth"),
        gross: f64_or(item, "gross"),
        fee: f64_or(item, "fee"),
        fee_pct: f64_or(item, "fee_pct"),
        net: f64_or(item, "net"),
        credit_date: opt_date(item, "credit_date"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataType;
    use crate::parse::parse_rows;
    use chrono::NaiveDate;
    use serde_json::json;

    fn ctx() -> ParseContext {
        ParseContext {
            tenant_id: 3,
            period: NaiveDate::parse_from_str("2026-02-01", "%Y-%m-%d").unwrap(),
        }
    }

    #[test]
    fn test_parse_payment_joins_local_times() {
        let payload = json!({"records": [{
            "payment": "8812",
            "receipt": "9001",
            "recorded_time": "21:14:05",
            "settled_date": "2026-02-02T00:00:00",
            "settled_time": "02:03:00",
            "method": "credit",
            "card": "visa",
            "gross": "120.0",
            "fee": 3.6,
            "fee_pct": 3.0,
            "net": 116.4,
            "credit_date": "2026-02-03"
        }]});

        let rows = parse_rows(DataType::Payments, &ctx(), &payload).unwrap();
        let NormalizedRow::Payments(row) = &rows[0] else {
            panic!("expected payment row");
        };
        // recorded on the business date, settled past midnight on the next
        assert_eq!(row.recorded_at.unwrap().to_string(), "2026-02-01 21:14:05");
        assert_eq!(row.settled_at.unwrap().to_string(), "2026-02-02 02:03:00");
        assert_eq!(row.net, 116.4);
        assert_eq!(
            row.credit_date.unwrap().to_string(),
            "2026-02-03".to_string()
        );
    }

    #[test]
    fn test_receipt_falls_back_to_payment_id() {
        let payload = json!({"records": [{"payment": "p-1"}]});
        let rows = parse_rows(DataType::Payments, &ctx(), &payload).unwrap();
        let NormalizedRow::Payments(row) = &rows[0] else {
            panic!("expected payment row");
        };
        assert_eq!(row.receipt_id, "p-1");
        assert!(row.recorded_at.is_none());
        assert!(row.settled_at.is_none());
    }

    #[test]
    fn test_missing_payment_id_is_malformed() {
        let payload = json!({"records": [{"gross": 10.0}]});
        assert!(parse_rows(DataType::Payments, &ctx(), &payload).is_err());
    }
}
