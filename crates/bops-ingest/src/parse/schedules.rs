//! Accounting schedule parser

use serde_json::Value;

use super::{bool_or, f64_or, opt_date, opt_i32, str_or, ParseContext};
use crate::error::MalformedPayload;
use crate::model::{NormalizedRow, ScheduleRow};

/// Map one accounting schedule entry. Older vendor accounts expose the id
/// under `id` instead of `schedule_id`.
pub(super) fn parse_item(
    ctx: &ParseContext,
    item: &Value,
) -> Result<NormalizedRow, MalformedPayload> {
    let schedule_id = {
        let primary = str_or(item, "schedule_id");
        if primary.is_empty() {
            str_or(item, "id")
        } else {
            primary
        }
    };
    if schedule_id.is_empty() {
        return Err(MalformedPayload("missing key field 'schedule_id'".to_string()));
    }

    let category = item.get("category");
    let stakeholder = item.get("stakeholder");

    Ok(NormalizedRow::Schedules(ScheduleRow {
        tenant_id: ctx.tenant_id,
        period: ctx.period,
        schedule_id,
        entry_kind: str_or(item, "kind"),
        status: str_or(item, "status"),
        value: f64_or(item, "value"),
        paid_value: f64_or(item, "paid_value"),
        due_date: opt_date(item, "due_date"),
        payment_date: opt_date(item, "payment_date"),
        accrual_date: opt_date(item, "accrual_date"),
        description: str_or(item, "description"),
        category_id: category.map(|c| str_or(c, "id")).unwrap_or_default(),
        category: category.map(|c| str_or(c, "name")).unwrap_or_default(),
        stakeholder_id: stakeholder.map(|s| str_or(s, "id")).unwrap_or_default(),
        stakeholder: stakeholder.map(|s| str_or(s, "name")).unwrap_or_default(),
        document_number: str_or(item, "document"),
        installment: opt_i32(item, "installment"),
        installments: opt_i32(item, "installments"),
        deleted: bool_or(item, "deleted"),
    }))
}
