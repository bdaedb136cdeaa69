use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::EngineError;
use crate::utils::db_utils::{dec_col, enum_col, round2};

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
pub enum AttendanceStatus {
    Present,
    Absent,
    HalfDay,
    Late,
    Working,
}

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
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

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
pub enum CaptureMethod {
    Web,
    Mobile,
    Biometric,
    Manual,
}

#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRuleRow {
    pub id: i64,
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub regular_hours_per_day: String,
    pub grace_minutes_in: i64,
    pub grace_minutes_out: i64,
    pub break_duration_minutes: i64,
    pub auto_deduct_break: bool,
    pub overtime_enabled: bool,
    pub overtime_multiplier: String,
    pub max_overtime_hours_daily: String,
    pub half_day_threshold_hours: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceRule {
    pub id: i64,
    #[schema(example = "standard-9-to-6")]
    pub name: String,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "18:00:00")]
    pub end_time: NaiveTime,
    #[schema(value_type = String, example = "8")]
    pub regular_hours_per_day: Decimal,
    pub grace_minutes_in: i64,
    pub grace_minutes_out: i64,
    pub break_duration_minutes: i64,
    pub auto_deduct_break: bool,
    pub overtime_enabled: bool,
    #[schema(value_type = String, example = "1.5")]
    pub overtime_multiplier: Decimal,
    #[schema(value_type = String, example = "4")]
    pub max_overtime_hours_daily: Decimal,
    #[schema(value_type = String, example = "4")]
    pub half_day_threshold_hours: Decimal,
    pub is_default: bool,
}

impl TryFrom<AttendanceRuleRow> for AttendanceRule {
    type Error = EngineError;

    fn try_from(row: AttendanceRuleRow) -> Result<Self, Self::Error> {
        Ok(AttendanceRule {
            id: row.id,
            name: row.name,
            start_time: row.start_time,
            end_time: row.end_time,
            regular_hours_per_day: dec_col("regular_hours_per_day", &row.regular_hours_per_day)?,
            grace_minutes_in: row.grace_minutes_in,
            grace_minutes_out: row.grace_minutes_out,
            break_duration_minutes: row.break_duration_minutes,
            auto_deduct_break: row.auto_deduct_break,
            overtime_enabled: row.overtime_enabled,
            overtime_multiplier: dec_col("overtime_multiplier", &row.overtime_multiplier)?,
            max_overtime_hours_daily: dec_col(
                "max_overtime_hours_daily",
                &row.max_overtime_hours_daily,
            )?,
            half_day_threshold_hours: dec_col(
                "half_day_threshold_hours",
                &row.half_day_threshold_hours,
            )?,
            is_default: row.is_default,
        })
    }
}

/// Regular/overtime split for one worked day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourSplit {
    pub worked: Decimal,
    pub regular: Decimal,
    pub overtime: Decimal,
}

impl AttendanceRule {
    /// Derive the regular/overtime split from clock times. Break minutes are
    /// deducted before the split when the rule auto-deducts them.
    pub fn split_hours(
        &self,
        clock_in: NaiveTime,
        clock_out: NaiveTime,
    ) -> Result<HourSplit, EngineError> {
        if clock_out <= clock_in {
            return Err(EngineError::Validation(
                "clock_out must be after clock_in".into(),
            ));
        }
        let mut minutes = (clock_out - clock_in).num_minutes();
        if self.auto_deduct_break {
            minutes -= self.break_duration_minutes;
        }
        let minutes = minutes.max(0);

        let worked = round2(Decimal::from(minutes) / Decimal::from(60));
        let regular = worked.min(self.regular_hours_per_day);
        let overtime = if self.overtime_enabled {
            (worked - self.regular_hours_per_day)
                .max(Decimal::ZERO)
                .min(self.max_overtime_hours_daily)
        } else {
            Decimal::ZERO
        };

        Ok(HourSplit {
            worked,
            regular: round2(regular),
            overtime: round2(overtime),
        })
    }

    /// Day status after clock-out. A short day trumps a late arrival.
    pub fn derive_status(&self, clock_in: NaiveTime, worked: Decimal) -> AttendanceStatus {
        if worked < self.half_day_threshold_hours {
            AttendanceStatus::HalfDay
        } else if clock_in > self.start_time + Duration::minutes(self.grace_minutes_in) {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRecordRow {
    pub id: i64,
    pub employee_id: i64,
    pub date: NaiveDate,
    pub clock_in: Option<NaiveTime>,
    pub clock_out: Option<NaiveTime>,
    pub capture_method: String,
    pub status: String,
    pub regular_hours: String,
    pub overtime_hours: String,
    pub approval_status: String,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceRecord {
    pub id: i64,
    pub employee_id: i64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, example = "09:00:00")]
    pub clock_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "18:00:00")]
    pub clock_out: Option<NaiveTime>,
    pub capture_method: CaptureMethod,
    pub status: AttendanceStatus,
    #[schema(value_type = String, example = "8.00")]
    pub regular_hours: Decimal,
    #[schema(value_type = String, example = "1.50")]
    pub overtime_hours: Decimal,
    pub approval_status: ApprovalStatus,
    pub approved_by: Option<i64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
}

impl TryFrom<AttendanceRecordRow> for AttendanceRecord {
    type Error = EngineError;

    fn try_from(row: AttendanceRecordRow) -> Result<Self, Self::Error> {
        Ok(AttendanceRecord {
            id: row.id,
            employee_id: row.employee_id,
            date: row.date,
            clock_in: row.clock_in,
            clock_out: row.clock_out,
            capture_method: enum_col("capture_method", &row.capture_method)?,
            status: enum_col("status", &row.status)?,
            regular_hours: dec_col("regular_hours", &row.regular_hours)?,
            overtime_hours: dec_col("overtime_hours", &row.overtime_hours)?,
            approval_status: enum_col("approval_status", &row.approval_status)?,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            remarks: row.remarks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rule() -> AttendanceRule {
        AttendanceRule {
            id: 1,
            name: "standard".into(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            regular_hours_per_day: dec!(8),
            grace_minutes_in: 10,
            grace_minutes_out: 0,
            break_duration_minutes: 60,
            auto_deduct_break: true,
            overtime_enabled: true,
            overtime_multiplier: dec!(1.5),
            max_overtime_hours_daily: dec!(4),
            half_day_threshold_hours: dec!(4),
            is_default: true,
        }
    }

    #[test]
    fn full_day_hits_threshold_exactly() {
        let split = rule()
            .split_hours(
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            )
            .unwrap();
        assert_eq!(split.regular, dec!(8.00));
        assert_eq!(split.overtime, dec!(0.00));
    }

    #[test]
    fn overtime_spills_past_threshold() {
        let split = rule()
            .split_hours(
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            )
            .unwrap();
        assert_eq!(split.worked, dec!(9.50));
        assert_eq!(split.regular, dec!(8.00));
        assert_eq!(split.overtime, dec!(1.50));
    }

    #[test]
    fn overtime_capped_at_daily_max() {
        let split = rule()
            .split_hours(
                NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            )
            .unwrap();
        assert_eq!(split.regular, dec!(8.00));
        assert_eq!(split.overtime, dec!(4.00));
    }

    #[test]
    fn overtime_disabled_yields_zero() {
        let mut r = rule();
        r.overtime_enabled = false;
        let split = r
            .split_hours(
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            )
            .unwrap();
        assert_eq!(split.overtime, dec!(0));
    }

    #[test]
    fn short_day_is_half_day_even_when_late() {
        let r = rule();
        let clock_in = NaiveTime::from_hms_opt(13, 0, 0).unwrap();
        let split = r
            .split_hours(clock_in, NaiveTime::from_hms_opt(16, 0, 0).unwrap())
            .unwrap();
        assert_eq!(r.derive_status(clock_in, split.worked), AttendanceStatus::HalfDay);
    }

    #[test]
    fn late_arrival_past_grace() {
        let r = rule();
        let clock_in = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        assert_eq!(r.derive_status(clock_in, dec!(8)), AttendanceStatus::Late);
        let on_grace = NaiveTime::from_hms_opt(9, 10, 0).unwrap();
        assert_eq!(r.derive_status(on_grace, dec!(8)), AttendanceStatus::Present);
    }

    #[test]
    fn rejects_inverted_clock_times() {
        let err = rule()
            .split_hours(
                NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
