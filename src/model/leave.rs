use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::EngineError;
use crate::utils::db_utils::{dec_col, enum_col, opt_dec_col};

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
pub enum LeaveUnit {
    Days,
    Hours,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    PendingManager,
    PendingHr,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveAction {
    Submit,
    ManagerApprove,
    ManagerReject,
    HrApprove,
    HrReject,
    Cancel,
}

/// The two-level approval machine as a static {state, action} → state map.
/// Any pair absent from the table is an illegal transition.
static TRANSITIONS: Lazy<HashMap<(LeaveStatus, LeaveAction), LeaveStatus>> = Lazy::new(|| {
    use LeaveAction::*;
    use LeaveStatus::*;
    HashMap::from([
        ((PendingManager, ManagerApprove), PendingHr),
        ((PendingManager, ManagerReject), Rejected),
        ((PendingManager, Cancel), Cancelled),
        ((PendingHr, HrApprove), Approved),
        ((PendingHr, HrReject), Rejected),
        ((PendingHr, Cancel), Cancelled),
    ])
});

pub fn next_status(from: LeaveStatus, action: LeaveAction) -> Result<LeaveStatus, EngineError> {
    TRANSITIONS.get(&(from, action)).copied().ok_or_else(|| {
        EngineError::InvalidStateTransition {
            entity: "leave request",
            from: from.to_string(),
            action: action.into(),
        }
    })
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct LeaveTypeRecord {
    pub id: i64,
    #[schema(example = "annual")]
    pub name: String,
    #[schema(value_type = String, example = "DAYS")]
    pub unit: String,
    pub allows_hourly: bool,
}

impl LeaveTypeRecord {
    pub fn unit(&self) -> Result<LeaveUnit, EngineError> {
        enum_col("unit", &self.unit)
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct LeaveBalanceRow {
    pub id: i64,
    pub employee_id: i64,
    pub leave_type_id: i64,
    pub year: i64,
    pub opening_balance: String,
    pub credited: String,
    pub carry_forward: String,
    pub used: String,
    pub pending: String,
    pub lapsed: String,
    pub encashed: String,
    pub version: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaveBalance {
    pub id: i64,
    pub employee_id: i64,
    pub leave_type_id: i64,
    pub year: i64,
    #[schema(value_type = String, example = "20")]
    pub opening_balance: Decimal,
    #[schema(value_type = String, example = "0")]
    pub credited: Decimal,
    #[schema(value_type = String, example = "2")]
    pub carry_forward: Decimal,
    #[schema(value_type = String, example = "5")]
    pub used: Decimal,
    #[schema(value_type = String, example = "1")]
    pub pending: Decimal,
    #[schema(value_type = String, example = "0")]
    pub lapsed: Decimal,
    #[schema(value_type = String, example = "0")]
    pub encashed: Decimal,
    #[serde(skip)]
    pub version: i64,
}

impl LeaveBalance {
    pub fn available(&self) -> Decimal {
        self.opening_balance + self.credited + self.carry_forward
            - self.used
            - self.pending
            - self.lapsed
            - self.encashed
    }
}

impl TryFrom<LeaveBalanceRow> for LeaveBalance {
    type Error = EngineError;

    fn try_from(row: LeaveBalanceRow) -> Result<Self, Self::Error> {
        Ok(LeaveBalance {
            id: row.id,
            employee_id: row.employee_id,
            leave_type_id: row.leave_type_id,
            year: row.year,
            opening_balance: dec_col("opening_balance", &row.opening_balance)?,
            credited: dec_col("credited", &row.credited)?,
            carry_forward: dec_col("carry_forward", &row.carry_forward)?,
            used: dec_col("used", &row.used)?,
            pending: dec_col("pending", &row.pending)?,
            lapsed: dec_col("lapsed", &row.lapsed)?,
            encashed: dec_col("encashed", &row.encashed)?,
            version: row.version,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct LeaveRequestRow {
    pub id: i64,
    pub employee_id: i64,
    pub leave_type_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub total_days: Option<String>,
    pub total_hours: Option<String>,
    pub reason: Option<String>,
    pub status: String,
    pub manager_status: Option<String>,
    pub manager_by: Option<i64>,
    pub manager_at: Option<DateTime<Utc>>,
    pub manager_remarks: Option<String>,
    pub hr_status: Option<String>,
    pub hr_by: Option<i64>,
    pub hr_at: Option<DateTime<Utc>>,
    pub hr_remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaveRequest {
    pub id: i64,
    pub employee_id: i64,
    pub leave_type_id: i64,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(value_type = Option<String>, example = "09:00:00")]
    pub start_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "13:00:00")]
    pub end_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "3")]
    pub total_days: Option<Decimal>,
    #[schema(value_type = Option<String>, example = "4.00")]
    pub total_hours: Option<Decimal>,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    pub manager_status: Option<String>,
    pub manager_by: Option<i64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub manager_at: Option<DateTime<Utc>>,
    pub manager_remarks: Option<String>,
    pub hr_status: Option<String>,
    pub hr_by: Option<i64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub hr_at: Option<DateTime<Utc>>,
    pub hr_remarks: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl LeaveRequest {
    /// The reserved quantity this request holds against its balance,
    /// whichever unit it was filed in.
    pub fn quantity(&self) -> Decimal {
        self.total_days.or(self.total_hours).unwrap_or(Decimal::ZERO)
    }
}

impl TryFrom<LeaveRequestRow> for LeaveRequest {
    type Error = EngineError;

    fn try_from(row: LeaveRequestRow) -> Result<Self, Self::Error> {
        Ok(LeaveRequest {
            id: row.id,
            employee_id: row.employee_id,
            leave_type_id: row.leave_type_id,
            start_date: row.start_date,
            end_date: row.end_date,
            start_time: row.start_time,
            end_time: row.end_time,
            total_days: opt_dec_col("total_days", row.total_days.as_deref())?,
            total_hours: opt_dec_col("total_hours", row.total_hours.as_deref())?,
            reason: row.reason,
            status: enum_col("status", &row.status)?,
            manager_status: row.manager_status,
            manager_by: row.manager_by,
            manager_at: row.manager_at,
            manager_remarks: row.manager_remarks,
            hr_status: row.hr_status,
            hr_by: row.hr_by,
            hr_at: row.hr_at,
            hr_remarks: row.hr_remarks,
            created_at: row.created_at,
        })
    }
}

/// One immutable line of the per-request audit timeline.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct LeaveActivity {
    pub id: i64,
    pub request_id: i64,
    #[schema(example = "MANAGER_APPROVE")]
    pub action: String,
    pub actor_id: i64,
    pub old_status: Option<String>,
    pub new_status: String,
    pub remarks: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn approval_never_skips_hr_level() {
        assert_eq!(
            next_status(LeaveStatus::PendingManager, LeaveAction::ManagerApprove).unwrap(),
            LeaveStatus::PendingHr
        );
        assert_matches!(
            next_status(LeaveStatus::PendingManager, LeaveAction::HrApprove),
            Err(EngineError::InvalidStateTransition { .. })
        );
    }

    #[test]
    fn terminal_states_reject_everything() {
        for terminal in [
            LeaveStatus::Approved,
            LeaveStatus::Rejected,
            LeaveStatus::Cancelled,
        ] {
            for action in [
                LeaveAction::ManagerApprove,
                LeaveAction::ManagerReject,
                LeaveAction::HrApprove,
                LeaveAction::HrReject,
                LeaveAction::Cancel,
            ] {
                assert_matches!(
                    next_status(terminal, action),
                    Err(EngineError::InvalidStateTransition { .. })
                );
            }
        }
    }

    #[test]
    fn cancel_reachable_from_both_pending_levels() {
        assert_eq!(
            next_status(LeaveStatus::PendingManager, LeaveAction::Cancel).unwrap(),
            LeaveStatus::Cancelled
        );
        assert_eq!(
            next_status(LeaveStatus::PendingHr, LeaveAction::Cancel).unwrap(),
            LeaveStatus::Cancelled
        );
    }

    #[test]
    fn available_nets_out_every_bucket() {
        use rust_decimal_macros::dec;
        let b = LeaveBalance {
            id: 1,
            employee_id: 1,
            leave_type_id: 1,
            year: 2026,
            opening_balance: dec!(20),
            credited: dec!(2),
            carry_forward: dec!(3),
            used: dec!(5),
            pending: dec!(1),
            lapsed: dec!(1),
            encashed: dec!(2),
            version: 0,
        };
        assert_eq!(b.available(), dec!(16));
    }
}
