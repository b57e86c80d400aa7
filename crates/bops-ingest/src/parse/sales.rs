//! Itemized sales parser

use serde_json::Value;

use bops_common::period::iso_week;

use super::{f64_or, require_i64, str_or, ParseContext};
use crate::error::MalformedPayload;
use crate::model::{NormalizedRow, SalesRow};

/// Map one vendor sales item. `receipt` and `item` identify the line and
/// are required; everything else defaults.
pub(super) fn parse_item(
    ctx: &ParseContext,
    item: &Value,
) -> Result<NormalizedRow, MalformedPayload> {
    let receipt_id = require_i64(item, "receipt")?;
    let item_id = require_i64(item, "item")?;

    Ok(NormalizedRow::Sales(SalesRow {
        tenant_id: ctx.tenant_id,
        period: ctx.period,
        week: iso_week(ctx.period) as i32,
        item_id,
        receipt_id,
        location: str_or(item, "location"),
        table_label: str_or(item, "table"),
        product_id: str_or(item, "product_id"),
        product: str_or(item, "product"),
        group_name: str_or(item, "group"),
        staff: str_or(item, "staff"),
        sale_kind: str_or(item, "kind"),
        qty: f64_or(item, "qty"),
        discount: f64_or(item, "discount"),
        gross_value: f64_or(item, "value"),
        cost: f64_or(item, "cost"),
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
    fn test_parse_sales_item() {
        let payload = json!({"records": [{
            "receipt": 9001,
            "item": "12",
            "location": "rooftop",
            "table": "M-14",
            "product_id": 441,
            "product": "house lager",
            "group": "draft",
            "staff": "ana",
            "kind": "table",
            "qty": "2",
            "discount": 0,
            "value": 24.0,
            "cost": "7.5"
        }]});

        let rows = parse_rows(DataType::Sales, &ctx(), &payload).unwrap();
        assert_eq!(rows.len(), 1);
        let NormalizedRow::Sales(row) = &rows[0] else {
            panic!("expected sales row");
        };
        assert_eq!(row.receipt_id, 9001);
        assert_eq!(row.item_id, 12);
        assert_eq!(row.product_id, "441");
        assert_eq!(row.qty, 2.0);
        assert_eq!(row.cost, 7.5);
        assert_eq!(row.week, 5);
    }

    #[test]
    fn test_unknown_fields_default() {
        let payload = json!({"records": [{"receipt": 1, "item": 1}]});
        let rows = parse_rows(DataType::Sales, &ctx(), &payload).unwrap();
        let NormalizedRow::Sales(row) = &rows[0] else {
            panic!("expected sales row");
        };
        assert_eq!(row.location, "");
        assert_eq!(row.qty, 0.0);
    }

    #[test]
    fn test_missing_key_field_is_malformed() {
        let payload = json!({"records": [{"receipt": 9001}]});
        let err = parse_rows(DataType::Sales, &ctx(), &payload).unwrap_err();
        assert!(err.0.contains("item"));
    }
}
