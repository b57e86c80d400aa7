//! Production timing parser
//!
//! Four stage timestamps per ordered item: ordered, prep started, prep
//! finished, delivered. Stage durations are derived here rather than
//! trusted from the vendor, which has been observed reporting negative
//! intervals around midnight.

use serde_json::Value;

use super::{i64_or, local_timestamp, elapsed_seconds, require_str, str_or, ParseContext};
use crate::error::MalformedPayload;
use crate::model::{NormalizedRow, ProductionRow};

pub(super) fn parse_item(
    ctx: &ParseContext,
    item: &Value,
) -> Result<NormalizedRow, MalformedPayload> {
    let order_item = require_str(item, "order_item")?;

    let ordered_at = local_timestamp(&str_or(item, "ordered_at"));
    let prep_started_at = local_timestamp(&str_or(item, "prep_started_at"));
    let prep_finished_at = local_timestamp(&str_or(item, "prep_finished_at"));
    let delivered_at = local_timestamp(&str_or(item, "delivered_at"));

    Ok(NormalizedRow::Production(ProductionRow {
        tenant_id: ctx.tenant_id,
        period: ctx.period,
        order_item,
        product_id: str_or(item, "product_id"),
        product: str_or(item, "product"),
        group_name: str_or(item, "group"),
        station: str_or(item, "station"),
        table_label: str_or(item, "table"),
        location: str_or(item, "location"),
        order_to_start_secs: elapsed_seconds(ordered_at, prep_started_at),
        order_to_finish_secs: elapsed_seconds(ordered_at, prep_finished_at),
        order_to_delivery_secs: elapsed_seconds(ordered_at, delivered_at),
        start_to_finish_secs: elapsed_seconds(prep_started_at, prep_finished_at),
        finish_to_delivery_secs: elapsed_seconds(prep_finished_at, delivered_at),
        ordered_at,
        prep_started_at,
        prep_finished_at,
        delivered_at,
        qty: i64_or(item, "qty"),
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
    fn test_parse_production_durations() {
        let payload = json!({"records": [{
            "order_item": "it-881",
            "product": "smash burger",
            "station": "kitchen",
            "ordered_at": "2026-02-01T20:10:05-0300",
            "prep_started_at": "2026-02-01T20:11:00-0300",
            "prep_finished_at": "2026-02-01T20:19:35-0300",
            "delivered_at": "2026-02-01T20:21:00-0300",
            "qty": 1
        }]});

        let rows = parse_rows(DataType::Production, &ctx(), &payload).unwrap();
        let NormalizedRow::Production(row) = &rows[0] else {
            panic!("expected production row");
        };
        assert_eq!(row.ordered_at.unwrap().to_string(), "2026-02-01 20:10:05");
        assert_eq!(row.order_to_start_secs, Some(55));
        assert_eq!(row.start_to_finish_secs, Some(515));
        assert_eq!(row.order_to_delivery_secs, Some(655));
        assert_eq!(row.finish_to_delivery_secs, Some(85));
    }

    #[test]
    fn test_out_of_order_stage_pair_yields_null_duration() {
        // delivery clock reads earlier than prep finish: no negative duration
        let payload = json!({"records": [{
            "order_item": "it-1",
            "prep_finished_at": "2026-02-01T10:00:00-0300",
            "delivered_at": "2026-02-01T09:59:59-0300"
        }]});

        let rows = parse_rows(DataType::Production, &ctx(), &payload).unwrap();
        let NormalizedRow::Production(row) = &rows[0] else {
            panic!("expected production row");
        };
        assert_eq!(row.finish_to_delivery_secs, None);
        assert!(row.ordered_at.is_none());
        assert_eq!(row.order_to_start_secs, None);
    }

    #[test]
    fn test_missing_order_item_is_malformed() {
        let payload = json!({"records": [{"product": "x"}]});
        assert!(parse_rows(DataType::Production, &ctx(), &payload).is_err());
    }
}
