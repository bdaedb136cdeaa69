use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::EngineError;
use crate::utils::db_utils::{dec_col, enum_col};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimesheetStatus {
    Draft,
    Generated,
    Approved,
    Rejected,
}

#[derive(Debug, sqlx::FromRow)]
pub struct TimesheetRow {
    pub id: i64,
    pub employee_id: i64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_regular_hours: String,
    pub total_overtime_hours: String,
    pub present_days: i64,
    pub absent_days: i64,
    pub leave_days: String,
    pub status: String,
    pub generated_at: DateTime<Utc>,
}

/// Period-level snapshot of one employee's approved attendance. Always
/// regenerated wholesale, never patched.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Timesheet {
    pub id: i64,
    pub employee_id: i64,
    #[schema(value_type = String, format = "date")]
    pub period_start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub period_end: NaiveDate,
    #[schema(value_type = String, example = "80.00")]
    pub total_regular_hours: Decimal,
    #[schema(value_type = String, example = "6.50")]
    pub total_overtime_hours: Decimal,
    pub present_days: i64,
    pub absent_days: i64,
    #[schema(value_type = String, example = "1")]
    pub leave_days: Decimal,
    pub status: TimesheetStatus,
    #[schema(value_type = String, format = "date-time")]
    pub generated_at: DateTime<Utc>,
}

impl TryFrom<TimesheetRow> for Timesheet {
    type Error = EngineError;

    fn try_from(row: TimesheetRow) -> Result<Self, Self::Error> {
        Ok(Timesheet {
            id: row.id,
            employee_id: row.employee_id,
            period_start: row.period_start,
            period_end: row.period_end,
            total_regular_hours: dec_col("total_regular_hours", &row.total_regular_hours)?,
            total_overtime_hours: dec_col("total_overtime_hours", &row.total_overtime_hours)?,
            present_days: row.present_days,
            absent_days: row.absent_days,
            leave_days: dec_col("leave_days", &row.leave_days)?,
            status: enum_col("status", &row.status)?,
            generated_at: row.generated_at,
        })
    }
}
