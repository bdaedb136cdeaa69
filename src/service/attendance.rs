use chrono::{Local, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::EngineError;
use crate::model::attendance::{
    ApprovalStatus, AttendanceRecord, AttendanceRecordRow, AttendanceRule, AttendanceRuleRow,
    AttendanceStatus, CaptureMethod,
};
use crate::utils::rule_cache::{invalidate_rules, resolve_rule};

/// Tally returned by `bulk_approve`. The batch is not a transaction: each
/// record transition commits on its own.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct BulkApproveOutcome {
    pub approved: u32,
    pub skipped: u32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ManualEntry {
    pub employee_id: i64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, example = "09:00:00")]
    pub clock_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "18:00:00")]
    pub clock_out: Option<NaiveTime>,
    /// Taken as given when clock times are absent.
    #[schema(value_type = Option<String>, example = "8.00")]
    pub regular_hours: Option<Decimal>,
    #[schema(value_type = Option<String>, example = "0.00")]
    pub overtime_hours: Option<Decimal>,
    pub status: Option<AttendanceStatus>,
    pub remarks: Option<String>,
}

pub async fn clock_in(
    pool: &SqlitePool,
    employee_id: i64,
    method: CaptureMethod,
) -> Result<AttendanceRecord, EngineError> {
    let now = Local::now();
    clock_in_at(pool, employee_id, now.date_naive(), now.time(), method).await
}

pub async fn clock_in_at(
    pool: &SqlitePool,
    employee_id: i64,
    date: NaiveDate,
    time: NaiveTime,
    method: CaptureMethod,
) -> Result<AttendanceRecord, EngineError> {
    let open = sqlx::query_as::<_, (i64,)>(
        r#"
        SELECT id FROM attendance_records
        WHERE employee_id = ? AND date = ?
          AND clock_in IS NOT NULL AND clock_out IS NULL
        "#,
    )
    .bind(employee_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    if open.is_some() {
        return Err(EngineError::AlreadyClockedIn);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO attendance_records
            (employee_id, date, clock_in, capture_method, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(date)
    .bind(time)
    .bind(method.to_string())
    .bind(AttendanceStatus::Working.to_string())
    .bind(Utc::now())
    .execute(pool)
    .await;

    let result = match result {
        Ok(r) => r,
        Err(e) => {
            // lost the race against a concurrent clock-in on the open-record index
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("2067") {
                    return Err(EngineError::AlreadyClockedIn);
                }
            }
            return Err(e.into());
        }
    };

    get_record(pool, result.last_insert_rowid()).await
}

pub async fn clock_out(pool: &SqlitePool, employee_id: i64) -> Result<AttendanceRecord, EngineError> {
    let now = Local::now();
    clock_out_at(pool, employee_id, now.date_naive(), now.time()).await
}

pub async fn clock_out_at(
    pool: &SqlitePool,
    employee_id: i64,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<AttendanceRecord, EngineError> {
    let open = sqlx::query_as::<_, (i64, NaiveTime)>(
        r#"
        SELECT id, clock_in FROM attendance_records
        WHERE employee_id = ? AND date = ?
          AND clock_in IS NOT NULL AND clock_out IS NULL
        "#,
    )
    .bind(employee_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    let (record_id, clock_in) = open.ok_or(EngineError::NoOpenRecord)?;

    let rule = resolve_rule(pool, employee_id).await?;
    let split = rule.split_hours(clock_in, time)?;
    let status = rule.derive_status(clock_in, split.worked);

    let updated = sqlx::query(
        r#"
        UPDATE attendance_records
        SET clock_out = ?, regular_hours = ?, overtime_hours = ?, status = ?
        WHERE id = ? AND clock_out IS NULL
        "#,
    )
    .bind(time)
    .bind(split.regular.to_string())
    .bind(split.overtime.to_string())
    .bind(status.to_string())
    .bind(record_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(EngineError::NoOpenRecord);
    }

    get_record(pool, record_id).await
}

/// Administrative insert/override, bypassing clock events. Hours are computed
/// from the supplied times when present, otherwise taken as given.
pub async fn manual_entry(
    pool: &SqlitePool,
    entry: ManualEntry,
) -> Result<AttendanceRecord, EngineError> {
    let (regular, overtime, status) = match (entry.clock_in, entry.clock_out) {
        (Some(clock_in), Some(clock_out)) => {
            let rule = resolve_rule(pool, entry.employee_id).await?;
            let split = rule.split_hours(clock_in, clock_out)?;
            let status = entry
                .status
                .unwrap_or_else(|| rule.derive_status(clock_in, split.worked));
            (split.regular, split.overtime, status)
        }
        (None, None) => {
            if entry.regular_hours.is_none() && entry.overtime_hours.is_none() {
                return Err(EngineError::Validation(
                    "manual entry needs either clock times or hours".into(),
                ));
            }
            (
                entry.regular_hours.unwrap_or(Decimal::ZERO),
                entry.overtime_hours.unwrap_or(Decimal::ZERO),
                entry.status.unwrap_or(AttendanceStatus::Present),
            )
        }
        _ => {
            return Err(EngineError::Validation(
                "manual entry needs both clock times or neither".into(),
            ));
        }
    };

    let existing = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, approval_status FROM attendance_records WHERE employee_id = ? AND date = ?",
    )
    .bind(entry.employee_id)
    .bind(entry.date)
    .fetch_optional(pool)
    .await?;

    let record_id = match existing {
        Some((id, approval)) if approval == ApprovalStatus::Pending.to_string() => {
            sqlx::query(
                r#"
                UPDATE attendance_records
                SET clock_in = ?, clock_out = ?, capture_method = ?, status = ?,
                    regular_hours = ?, overtime_hours = ?, remarks = ?
                WHERE id = ?
                "#,
            )
            .bind(entry.clock_in)
            .bind(entry.clock_out)
            .bind(CaptureMethod::Manual.to_string())
            .bind(status.to_string())
            .bind(regular.to_string())
            .bind(overtime.to_string())
            .bind(entry.remarks)
            .bind(id)
            .execute(pool)
            .await?;
            id
        }
        Some((_, approval)) => {
            // approved/rejected records are immutable without an explicit re-open
            return Err(EngineError::InvalidStateTransition {
                entity: "attendance record",
                from: approval,
                action: "MANUAL_OVERRIDE",
            });
        }
        None => {
            let result = sqlx::query(
                r#"
                INSERT INTO attendance_records
                    (employee_id, date, clock_in, clock_out, capture_method, status,
                     regular_hours, overtime_hours, remarks, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(entry.employee_id)
            .bind(entry.date)
            .bind(entry.clock_in)
            .bind(entry.clock_out)
            .bind(CaptureMethod::Manual.to_string())
            .bind(status.to_string())
            .bind(regular.to_string())
            .bind(overtime.to_string())
            .bind(entry.remarks)
            .bind(Utc::now())
            .execute(pool)
            .await?;
            result.last_insert_rowid()
        }
    };

    get_record(pool, record_id).await
}

pub async fn approve(
    pool: &SqlitePool,
    record_id: i64,
    approver_id: i64,
) -> Result<AttendanceRecord, EngineError> {
    transition_approval(pool, record_id, ApprovalStatus::Approved, approver_id, None).await
}

pub async fn reject(
    pool: &SqlitePool,
    record_id: i64,
    approver_id: i64,
    remarks: Option<String>,
) -> Result<AttendanceRecord, EngineError> {
    transition_approval(pool, record_id, ApprovalStatus::Rejected, approver_id, remarks).await
}

async fn transition_approval(
    pool: &SqlitePool,
    record_id: i64,
    to: ApprovalStatus,
    approver_id: i64,
    remarks: Option<String>,
) -> Result<AttendanceRecord, EngineError> {
    let current = sqlx::query_as::<_, (String,)>(
        "SELECT approval_status FROM attendance_records WHERE id = ?",
    )
    .bind(record_id)
    .fetch_optional(pool)
    .await?
    .ok_or(EngineError::NotFound("attendance record"))?;

    let updated = sqlx::query(
        r#"
        UPDATE attendance_records
        SET approval_status = ?, approved_by = ?, approved_at = ?,
            remarks = COALESCE(?, remarks)
        WHERE id = ? AND approval_status = 'PENDING'
        "#,
    )
    .bind(to.to_string())
    .bind(approver_id)
    .bind(Utc::now())
    .bind(remarks)
    .bind(record_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(EngineError::InvalidStateTransition {
            entity: "attendance record",
            from: current.0,
            action: if to == ApprovalStatus::Approved {
                "APPROVE"
            } else {
                "REJECT"
            },
        });
    }

    get_record(pool, record_id).await
}

/// Applies `approve` to each id independently. Records that are not PENDING
/// (or do not exist) are counted as skipped; prior successes stand.
pub async fn bulk_approve(
    pool: &SqlitePool,
    record_ids: &[i64],
    approver_id: i64,
) -> Result<BulkApproveOutcome, EngineError> {
    let mut outcome = BulkApproveOutcome {
        approved: 0,
        skipped: 0,
    };
    for &id in record_ids {
        match approve(pool, id, approver_id).await {
            Ok(_) => outcome.approved += 1,
            Err(EngineError::InvalidStateTransition { .. }) | Err(EngineError::NotFound(_)) => {
                outcome.skipped += 1
            }
            Err(e) => return Err(e),
        }
    }
    Ok(outcome)
}

pub async fn get_record(pool: &SqlitePool, record_id: i64) -> Result<AttendanceRecord, EngineError> {
    let row = sqlx::query_as::<_, AttendanceRecordRow>(
        "SELECT * FROM attendance_records WHERE id = ?",
    )
    .bind(record_id)
    .fetch_optional(pool)
    .await?
    .ok_or(EngineError::NotFound("attendance record"))?;
    row.try_into()
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRule {
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

/// Exactly one rule is the default at any time; making a new default clears
/// the old one in the same transaction.
pub async fn create_rule(
    pool: &SqlitePool,
    input: CreateRule,
) -> Result<AttendanceRule, EngineError> {
    if input.regular_hours_per_day <= Decimal::ZERO {
        return Err(EngineError::Validation(
            "regular_hours_per_day must be positive".into(),
        ));
    }

    let mut tx = pool.begin().await?;
    if input.is_default {
        sqlx::query("UPDATE attendance_rules SET is_default = 0 WHERE is_default = 1")
            .execute(&mut *tx)
            .await?;
    }

    let result = sqlx::query(
        r#"
        INSERT INTO attendance_rules
            (name, start_time, end_time, regular_hours_per_day, grace_minutes_in,
             grace_minutes_out, break_duration_minutes, auto_deduct_break,
             overtime_enabled, overtime_multiplier, max_overtime_hours_daily,
             half_day_threshold_hours, is_default, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.name)
    .bind(input.start_time)
    .bind(input.end_time)
    .bind(input.regular_hours_per_day.to_string())
    .bind(input.grace_minutes_in)
    .bind(input.grace_minutes_out)
    .bind(input.break_duration_minutes)
    .bind(input.auto_deduct_break)
    .bind(input.overtime_enabled)
    .bind(input.overtime_multiplier.to_string())
    .bind(input.max_overtime_hours_daily.to_string())
    .bind(input.half_day_threshold_hours.to_string())
    .bind(input.is_default)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    let rule_id = result.last_insert_rowid();
    tx.commit().await?;

    invalidate_rules();

    let row = sqlx::query_as::<_, AttendanceRuleRow>("SELECT * FROM attendance_rules WHERE id = ?")
        .bind(rule_id)
        .fetch_one(pool)
        .await?;
    row.try_into()
}

pub async fn list_rules(pool: &SqlitePool) -> Result<Vec<AttendanceRule>, EngineError> {
    let rows = sqlx::query_as::<_, AttendanceRuleRow>("SELECT * FROM attendance_rules ORDER BY id")
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(AttendanceRule::try_from).collect()
}

pub struct RecordFilter {
    pub employee_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub approval_status: Option<ApprovalStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

// Helper enum for typed SQLx binding
enum FilterValue {
    I64(i64),
    Date(NaiveDate),
    Str(String),
}

pub async fn list_records(
    pool: &SqlitePool,
    filter: RecordFilter,
) -> Result<(Vec<AttendanceRecord>, i64), EngineError> {
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(emp_id) = filter.employee_id {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::I64(emp_id));
    }
    if let Some(from) = filter.from {
        where_sql.push_str(" AND date >= ?");
        args.push(FilterValue::Date(from));
    }
    if let Some(to) = filter.to {
        where_sql.push_str(" AND date <= ?");
        args.push(FilterValue::Date(to));
    }
    if let Some(status) = filter.approval_status {
        where_sql.push_str(" AND approval_status = ?");
        args.push(FilterValue::Str(status.to_string()));
    }

    let count_sql = format!("SELECT COUNT(*) FROM attendance_records{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::I64(v) => count_q.bind(*v),
            FilterValue::Date(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(s.clone()),
        };
    }
    let total = count_q.fetch_one(pool).await?;

    let (_, per_page, offset) = crate::utils::db_utils::clamp_page(filter.page, filter.per_page);
    let data_sql = format!(
        "SELECT * FROM attendance_records{} ORDER BY date DESC, id DESC LIMIT ? OFFSET ?",
        where_sql
    );
    let mut data_q = sqlx::query_as::<_, AttendanceRecordRow>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::I64(v) => data_q.bind(v),
            FilterValue::Date(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }
    let rows = data_q
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool)
        .await?;

    let records = rows
        .into_iter()
        .map(AttendanceRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((records, total))
}
