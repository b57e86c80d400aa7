//! Processor parse boundary
//!
//! Turns a staged vendor payload into normalized rows. Vendor JSON is
//! loosely typed: numbers arrive as strings, fields go missing, timestamps
//! carry inconsistent offsets. Non-key fields default instead of failing;
//! the fields an idempotency key is derived from are required, and their
//! absence makes the whole payload malformed.
//!
//! Vendor timestamps are already in the tenant's local wall-clock frame.
//! Combining a business date with a time-of-day string, or reading an
//! ISO-with-offset string, is a textual join, never a timezone conversion
//! that would silently shift the stored times.

mod payments;
mod production;
mod sales;
mod schedules;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::error::MalformedPayload;
use crate::model::{DataType, NormalizedRow};

/// Staging context the parsed rows inherit
#[derive(Debug, Clone, Copy)]
pub struct ParseContext {
    pub tenant_id: i32,
    pub period: NaiveDate,
}

/// Parse a staged payload into normalized rows.
///
/// The payload must be the collector's `{"records": [...]}` envelope; any
/// record missing a key field poisons the whole payload (the staging row
/// stays unprocessed for later reprocessing).
pub fn parse_rows(
    data_type: DataType,
    ctx: &ParseContext,
    payload: &Value,
) -> Result<Vec<NormalizedRow>, MalformedPayload> {
    let records = payload
        .get("records")
        .and_then(Value::as_array)
        .ok_or_else(|| MalformedPayload("payload has no records array".to_string()))?;

    records
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let parsed = match data_type {
                DataType::Sales => sales::parse_item(ctx, item),
                DataType::Payments => payments::parse_item(ctx, item),
                DataType::Production => production::parse_item(ctx, item),
                DataType::Schedules => schedules::parse_item(ctx, item),
            };
            parsed.map_err(|e| MalformedPayload(format!("record {}: {}", i, e.0)))
        })
        .collect()
}

/// String field with empty-string default; numbers are stringified
pub(crate) fn str_or(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Float field tolerating numeric strings; defaults to 0.0
pub(crate) fn f64_or(item: &Value, key: &str) -> f64 {
    match item.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Integer field tolerating numeric strings; defaults to 0
pub(crate) fn i64_or(item: &Value, key: &str) -> i64 {
    match item.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Optional small integer, None when absent or unparseable
pub(crate) fn opt_i32(item: &Value, key: &str) -> Option<i32> {
    match item.get(key) {
        Some(Value::Number(n)) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn bool_or(item: &Value, key: &str) -> bool {
    item.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Required string key field; empty counts as missing
pub(crate) fn require_str(item: &Value, key: &str) -> Result<String, MalformedPayload> {
    let value = str_or(item, key);
    if value.is_empty() {
        return Err(MalformedPayload(format!("missing key field '{}'", key)));
    }
    Ok(value)
}

/// Required integer key field
pub(crate) fn require_i64(item: &Value, key: &str) -> Result<i64, MalformedPayload> {
    match item.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| MalformedPayload(format!("key field '{}' is not an integer", key))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| MalformedPayload(format!("key field '{}' is not an integer", key))),
        _ => Err(MalformedPayload(format!("missing key field '{}'", key))),
    }
}

/// Date field; the vendor sometimes appends a time part, which is split off
/// textually ("2026-02-01T00:00:00" -> 2026-02-01)
pub(crate) fn opt_date(item: &Value, key: &str) -> Option<NaiveDate> {
    let raw = str_or(item, key);
    parse_date(&raw)
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.split('T').next().unwrap_or("").trim();
    if date_part.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Join a business date with a wall-clock time-of-day string.
///
/// A structural join of the two values; the result stays in the tenant's
/// local frame.
pub fn join_local(date: NaiveDate, time: &str) -> Option<NaiveDateTime> {
    let time = time.trim();
    if time.is_empty() {
        return None;
    }
    let parsed = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .ok()?;
    Some(date.and_time(parsed))
}

/// Read a vendor timestamp that may carry an offset suffix.
///
/// The offset is stripped textually before parsing; the wall-clock digits
/// are what the tenant saw, so no instant conversion is applied.
pub fn local_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut cleaned = raw.replacen('T', " ", 1);
    if let Some(stripped) = cleaned.strip_suffix('Z') {
        cleaned = stripped.to_string();
    } else if let Some(pos) = cleaned.rfind(['+', '-']) {
        // a sign past the date digits is an offset suffix, not a date dash
        if pos > 10 {
            cleaned.truncate(pos);
        }
    }

    NaiveDateTime::parse_from_str(cleaned.trim(), "%Y-%m-%d %H:%M:%S").ok()
}

/// Elapsed seconds between two stage timestamps.
///
/// None unless both endpoints are present and the later one is not earlier
/// than the former; a duration is never negative.
pub fn elapsed_seconds(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Option<i64> {
    let (start, end) = (start?, end?);
    let secs = (end - start).num_seconds();
    if secs < 0 {
        return None;
    }
    Some(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_str_or_accepts_numbers() {
        let item = json!({"a": "x", "b": 12, "c": null});
        assert_eq!(str_or(&item, "a"), "x");
        assert_eq!(str_or(&item, "b"), "12");
        assert_eq!(str_or(&item, "c"), "");
        assert_eq!(str_or(&item, "missing"), "");
    }

    #[test]
    fn test_f64_or_accepts_numeric_strings() {
        let item = json!({"a": 1.5, "b": "2.25", "c": "garbage", "d": ""});
        assert_eq!(f64_or(&item, "a"), 1.5);
        assert_eq!(f64_or(&item, "b"), 2.25);
        assert_eq!(f64_or(&item, "c"), 0.0);
        assert_eq!(f64_or(&item, "d"), 0.0);
    }

    #[test]
    fn test_require_fields() {
        let item = json!({"id": "abc", "n": "41", "empty": ""});
        assert_eq!(require_str(&item, "id").unwrap(), "abc");
        assert_eq!(require_i64(&item, "n").unwrap(), 41);
        assert!(require_str(&item, "empty").is_err());
        assert!(require_str(&item, "missing").is_err());
        assert!(require_i64(&item, "id").is_err());
    }

    #[test]
    fn test_parse_date_splits_time_part() {
        assert_eq!(parse_date("2026-02-01"), Some(d("2026-02-01")));
        assert_eq!(parse_date("2026-02-01T00:00:00"), Some(d("2026-02-01")));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("0001-13-01"), None);
    }

    #[test]
    fn test_join_local_is_structural() {
        let ts = join_local(d("2026-02-01"), "21:14:05").unwrap();
        assert_eq!(ts.to_string(), "2026-02-01 21:14:05");
        assert_eq!(join_local(d("2026-02-01"), "21:14").unwrap().to_string(), "2026-02-01 21:14:00");
        assert_eq!(join_local(d("2026-02-01"), ""), None);
        assert_eq!(join_local(d("2026-02-01"), "late"), None);
    }

    #[test]
    fn test_local_timestamp_strips_offset_without_shifting() {
        // the wall-clock digits survive untouched regardless of offset
        let cases = [
            "2026-02-01T18:48:53-0300",
            "2026-02-01T18:48:53-03:00",
            "2026-02-01T18:48:53+0000",
            "2026-02-01T18:48:53Z",
            "2026-02-01 18:48:53",
        ];
        for raw in cases {
            let ts = local_timestamp(raw).unwrap();
            assert_eq!(ts.to_string(), "2026-02-01 18:48:53", "case {}", raw);
        }
        assert_eq!(local_timestamp(""), None);
        assert_eq!(local_timestamp("not a timestamp"), None);
    }

    #[test]
    fn test_elapsed_seconds_never_negative() {
        let earlier = join_local(d("2026-02-01"), "09:59:59");
        let later = join_local(d("2026-02-01"), "10:00:00");
        assert_eq!(elapsed_seconds(earlier, later), Some(1));
        // later < earlier yields None, not a negative duration
        assert_eq!(elapsed_seconds(later, earlier), None);
        assert_eq!(elapsed_seconds(None, later), None);
        assert_eq!(elapsed_seconds(earlier, None), None);
        assert_eq!(elapsed_seconds(earlier, earlier), Some(0));
    }

    #[test]
    fn test_parse_rows_rejects_missing_records_array() {
        let ctx = ParseContext {
            tenant_id: 3,
            period: d("2026-02-01"),
        };
        let err = parse_rows(DataType::Sales, &ctx, &json!({"list": []})).unwrap_err();
        assert!(err.0.contains("records"));
    }

    #[test]
    fn test_parse_rows_empty_is_ok() {
        let ctx = ParseContext {
            tenant_id: 3,
            period: d("2026-02-01"),
        };
        let rows = parse_rows(DataType::Sales, &ctx, &json!({"records": []})).unwrap();
        assert!(rows.is_empty());
    }
}
