use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::EngineError;
use crate::model::leave::{
    LeaveAction, LeaveActivity, LeaveBalance, LeaveBalanceRow, LeaveRequest, LeaveRequestRow,
    LeaveStatus, LeaveTypeRecord, LeaveUnit, next_status,
};
use crate::utils::db_utils::round2;

/// Transitions retry this many times when an optimistic balance update loses
/// a version race before giving up with a conflict.
const BALANCE_RETRIES: u32 = 3;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateLeave {
    pub leave_type_id: i64,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    /// Hourly leave only; both times on `start_date`.
    #[schema(value_type = Option<String>, example = "09:00:00")]
    pub start_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "13:00:00")]
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

/// Requested quantity in the leave type's unit: inclusive day span for
/// day-based leave, minutes/60 rounded to 2 decimals for hourly leave.
pub fn requested_quantity(
    leave_type: &LeaveTypeRecord,
    input: &CreateLeave,
) -> Result<(Option<Decimal>, Option<Decimal>), EngineError> {
    if input.end_date < input.start_date {
        return Err(EngineError::Validation(
            "end_date cannot be before start_date".into(),
        ));
    }

    match (input.start_time, input.end_time) {
        (Some(start), Some(end)) => {
            if !leave_type.allows_hourly {
                return Err(EngineError::Validation(format!(
                    "leave type `{}` does not allow hourly leave",
                    leave_type.name
                )));
            }
            if end <= start {
                return Err(EngineError::Validation(
                    "end_time must be after start_time".into(),
                ));
            }
            let minutes = (end - start).num_minutes();
            let hours = round2(Decimal::from(minutes) / Decimal::from(60));
            Ok((None, Some(hours)))
        }
        (None, None) => {
            let days = (input.end_date - input.start_date).num_days() + 1;
            Ok((Some(Decimal::from(days)), None))
        }
        _ => Err(EngineError::Validation(
            "hourly leave needs both start_time and end_time".into(),
        )),
    }
}

pub async fn create_request(
    pool: &SqlitePool,
    employee_id: i64,
    input: CreateLeave,
) -> Result<LeaveRequest, EngineError> {
    let leave_type = get_leave_type(pool, input.leave_type_id).await?;
    let (total_days, total_hours) = requested_quantity(&leave_type, &input)?;
    let requested = total_days.or(total_hours).unwrap_or(Decimal::ZERO);
    let year = i64::from(input.start_date.year());

    for attempt in 0u32.. {
        match try_create(
            pool,
            employee_id,
            &input,
            total_days,
            total_hours,
            requested,
            year,
        )
        .await
        {
            Err(EngineError::Conflict(_)) if attempt < BALANCE_RETRIES => continue,
            // no balance row at all reads as nothing available
            Err(EngineError::NotFound("leave balance")) => {
                return Err(EngineError::InsufficientBalance {
                    available: Decimal::ZERO,
                    requested,
                });
            }
            result => return result,
        }
    }
    unreachable!()
}

async fn try_create(
    pool: &SqlitePool,
    employee_id: i64,
    input: &CreateLeave,
    total_days: Option<Decimal>,
    total_hours: Option<Decimal>,
    requested: Decimal,
    year: i64,
) -> Result<LeaveRequest, EngineError> {
    let mut tx = pool.begin().await?;

    adjust_balance(&mut tx, employee_id, input.leave_type_id, year, |b| {
        let available = b.available();
        if available < requested {
            return Err(EngineError::InsufficientBalance {
                available,
                requested,
            });
        }
        b.pending += requested;
        Ok(())
    })
    .await?;

    let status = LeaveStatus::PendingManager;
    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, leave_type_id, start_date, end_date, start_time, end_time,
             total_days, total_hours, reason, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(input.leave_type_id)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.start_time)
    .bind(input.end_time)
    .bind(total_days.map(|d| d.to_string()))
    .bind(total_hours.map(|h| h.to_string()))
    .bind(input.reason.clone())
    .bind(status.to_string())
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    let request_id = result.last_insert_rowid();

    log_activity(
        &mut tx,
        request_id,
        LeaveAction::Submit.into(),
        employee_id,
        None,
        &status.to_string(),
        input.reason.as_deref(),
    )
    .await?;

    tx.commit().await?;
    get_request(pool, request_id).await
}

pub async fn manager_approve(
    pool: &SqlitePool,
    request_id: i64,
    actor_id: i64,
    remarks: Option<String>,
) -> Result<LeaveRequest, EngineError> {
    apply_action(pool, request_id, LeaveAction::ManagerApprove, actor_id, remarks).await
}

pub async fn manager_reject(
    pool: &SqlitePool,
    request_id: i64,
    actor_id: i64,
    remarks: Option<String>,
) -> Result<LeaveRequest, EngineError> {
    apply_action(pool, request_id, LeaveAction::ManagerReject, actor_id, remarks).await
}

pub async fn hr_approve(
    pool: &SqlitePool,
    request_id: i64,
    actor_id: i64,
    remarks: Option<String>,
) -> Result<LeaveRequest, EngineError> {
    apply_action(pool, request_id, LeaveAction::HrApprove, actor_id, remarks).await
}

pub async fn hr_reject(
    pool: &SqlitePool,
    request_id: i64,
    actor_id: i64,
    remarks: Option<String>,
) -> Result<LeaveRequest, EngineError> {
    apply_action(pool, request_id, LeaveAction::HrReject, actor_id, remarks).await
}

/// Cancellation is the requester's own action and is only reachable from a
/// non-terminal state.
pub async fn cancel_request(
    pool: &SqlitePool,
    request_id: i64,
    requester_employee_id: i64,
) -> Result<LeaveRequest, EngineError> {
    let request = get_request(pool, request_id).await?;
    if request.employee_id != requester_employee_id {
        return Err(EngineError::Validation(
            "only the requester can cancel a leave request".into(),
        ));
    }
    apply_action(
        pool,
        request_id,
        LeaveAction::Cancel,
        requester_employee_id,
        None,
    )
    .await
}

async fn apply_action(
    pool: &SqlitePool,
    request_id: i64,
    action: LeaveAction,
    actor_id: i64,
    remarks: Option<String>,
) -> Result<LeaveRequest, EngineError> {
    for attempt in 0u32.. {
        match try_apply(pool, request_id, action, actor_id, remarks.clone()).await {
            Err(EngineError::Conflict(_)) if attempt < BALANCE_RETRIES => continue,
            result => return result,
        }
    }
    unreachable!()
}

async fn try_apply(
    pool: &SqlitePool,
    request_id: i64,
    action: LeaveAction,
    actor_id: i64,
    remarks: Option<String>,
) -> Result<LeaveRequest, EngineError> {
    let request = get_request(pool, request_id).await?;
    let from = request.status;
    let to = next_status(from, action)?;
    let quantity = request.quantity();
    let year = i64::from(request.start_date.year());

    let mut tx = pool.begin().await?;

    // level-specific approval metadata rides along with the status flip
    let updated = match action {
        LeaveAction::ManagerApprove | LeaveAction::ManagerReject => {
            sqlx::query(
                r#"
                UPDATE leave_requests
                SET status = ?, manager_status = ?, manager_by = ?, manager_at = ?,
                    manager_remarks = ?
                WHERE id = ? AND status = ?
                "#,
            )
            .bind(to.to_string())
            .bind(if action == LeaveAction::ManagerApprove {
                "APPROVED"
            } else {
                "REJECTED"
            })
            .bind(actor_id)
            .bind(Utc::now())
            .bind(remarks.clone())
            .bind(request_id)
            .bind(from.to_string())
            .execute(&mut *tx)
            .await?
        }
        LeaveAction::HrApprove | LeaveAction::HrReject => {
            sqlx::query(
                r#"
                UPDATE leave_requests
                SET status = ?, hr_status = ?, hr_by = ?, hr_at = ?, hr_remarks = ?
                WHERE id = ? AND status = ?
                "#,
            )
            .bind(to.to_string())
            .bind(if action == LeaveAction::HrApprove {
                "APPROVED"
            } else {
                "REJECTED"
            })
            .bind(actor_id)
            .bind(Utc::now())
            .bind(remarks.clone())
            .bind(request_id)
            .bind(from.to_string())
            .execute(&mut *tx)
            .await?
        }
        LeaveAction::Cancel => {
            sqlx::query("UPDATE leave_requests SET status = ? WHERE id = ? AND status = ?")
                .bind(to.to_string())
                .bind(request_id)
                .bind(from.to_string())
                .execute(&mut *tx)
                .await?
        }
        LeaveAction::Submit => {
            return Err(EngineError::Validation(
                "submit is not a transition on an existing request".into(),
            ));
        }
    };

    if updated.rows_affected() == 0 {
        // raced with another actor; report against the fresh state
        tx.rollback().await?;
        let fresh = get_request(pool, request_id).await?;
        return Err(EngineError::InvalidStateTransition {
            entity: "leave request",
            from: fresh.status.to_string(),
            action: action.into(),
        });
    }

    match action {
        LeaveAction::ManagerApprove => {} // balance stays in pending
        LeaveAction::ManagerReject | LeaveAction::HrReject | LeaveAction::Cancel => {
            adjust_balance(&mut tx, request.employee_id, request.leave_type_id, year, |b| {
                b.pending -= quantity;
                Ok(())
            })
            .await?;
        }
        LeaveAction::HrApprove => {
            adjust_balance(&mut tx, request.employee_id, request.leave_type_id, year, |b| {
                b.pending -= quantity;
                b.used += quantity;
                Ok(())
            })
            .await?;
        }
        LeaveAction::Submit => unreachable!(),
    }

    log_activity(
        &mut tx,
        request_id,
        action.into(),
        actor_id,
        Some(from.to_string()),
        &to.to_string(),
        remarks.as_deref(),
    )
    .await?;

    tx.commit().await?;
    get_request(pool, request_id).await
}

/// Apply a closure to the balance row under its version guard. Inconsistent
/// concurrent writers surface as a conflict for the caller to retry.
async fn adjust_balance<F>(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    employee_id: i64,
    leave_type_id: i64,
    year: i64,
    f: F,
) -> Result<LeaveBalance, EngineError>
where
    F: FnOnce(&mut LeaveBalance) -> Result<(), EngineError>,
{
    let row = sqlx::query_as::<_, LeaveBalanceRow>(
        r#"
        SELECT * FROM leave_balances
        WHERE employee_id = ? AND leave_type_id = ? AND year = ?
        "#,
    )
    .bind(employee_id)
    .bind(leave_type_id)
    .bind(year)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(EngineError::NotFound("leave balance"))?;

    let version = row.version;
    let mut balance = LeaveBalance::try_from(row)?;
    f(&mut balance)?;

    let updated = sqlx::query(
        r#"
        UPDATE leave_balances
        SET opening_balance = ?, credited = ?, carry_forward = ?, used = ?,
            pending = ?, lapsed = ?, encashed = ?, version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(balance.opening_balance.to_string())
    .bind(balance.credited.to_string())
    .bind(balance.carry_forward.to_string())
    .bind(balance.used.to_string())
    .bind(balance.pending.to_string())
    .bind(balance.lapsed.to_string())
    .bind(balance.encashed.to_string())
    .bind(balance.id)
    .bind(version)
    .execute(&mut **tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(EngineError::Conflict(
            "leave balance was updated concurrently".into(),
        ));
    }
    balance.version = version + 1;
    Ok(balance)
}

async fn log_activity(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    request_id: i64,
    action: &str,
    actor_id: i64,
    old_status: Option<String>,
    new_status: &str,
    remarks: Option<&str>,
) -> Result<(), EngineError> {
    sqlx::query(
        r#"
        INSERT INTO leave_activity
            (request_id, action, actor_id, old_status, new_status, remarks, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(request_id)
    .bind(action)
    .bind(actor_id)
    .bind(old_status)
    .bind(new_status)
    .bind(remarks)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/* =========================
Queries & reference data
========================= */

pub async fn get_request(pool: &SqlitePool, request_id: i64) -> Result<LeaveRequest, EngineError> {
    let row = sqlx::query_as::<_, LeaveRequestRow>("SELECT * FROM leave_requests WHERE id = ?")
        .bind(request_id)
        .fetch_optional(pool)
        .await?
        .ok_or(EngineError::NotFound("leave request"))?;
    row.try_into()
}

pub async fn list_requests(
    pool: &SqlitePool,
    employee_id: Option<i64>,
    status: Option<LeaveStatus>,
    page: Option<u64>,
    per_page: Option<u64>,
) -> Result<(Vec<LeaveRequest>, i64), EngineError> {
    let mut where_sql = String::from(" WHERE 1=1");
    if employee_id.is_some() {
        where_sql.push_str(" AND employee_id = ?");
    }
    if status.is_some() {
        where_sql.push_str(" AND status = ?");
    }

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(emp) = employee_id {
        count_q = count_q.bind(emp);
    }
    if let Some(st) = status {
        count_q = count_q.bind(st.to_string());
    }
    let total = count_q.fetch_one(pool).await?;

    let (_, per_page, offset) = crate::utils::db_utils::clamp_page(page, per_page);
    let data_sql = format!(
        "SELECT * FROM leave_requests{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        where_sql
    );
    let mut data_q = sqlx::query_as::<_, LeaveRequestRow>(&data_sql);
    if let Some(emp) = employee_id {
        data_q = data_q.bind(emp);
    }
    if let Some(st) = status {
        data_q = data_q.bind(st.to_string());
    }
    let rows = data_q
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool)
        .await?;

    let requests = rows
        .into_iter()
        .map(LeaveRequest::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((requests, total))
}

pub async fn get_activity(
    pool: &SqlitePool,
    request_id: i64,
) -> Result<Vec<LeaveActivity>, EngineError> {
    let rows = sqlx::query_as::<_, LeaveActivity>(
        "SELECT * FROM leave_activity WHERE request_id = ? ORDER BY id ASC",
    )
    .bind(request_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_balances(
    pool: &SqlitePool,
    employee_id: i64,
    year: i64,
) -> Result<Vec<LeaveBalance>, EngineError> {
    let rows = sqlx::query_as::<_, LeaveBalanceRow>(
        "SELECT * FROM leave_balances WHERE employee_id = ? AND year = ? ORDER BY leave_type_id",
    )
    .bind(employee_id)
    .bind(year)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(LeaveBalance::try_from).collect()
}

pub async fn get_leave_type(
    pool: &SqlitePool,
    leave_type_id: i64,
) -> Result<LeaveTypeRecord, EngineError> {
    sqlx::query_as::<_, LeaveTypeRecord>(
        "SELECT id, name, unit, allows_hourly FROM leave_types WHERE id = ?",
    )
    .bind(leave_type_id)
    .fetch_optional(pool)
    .await?
    .ok_or(EngineError::NotFound("leave type"))
}

pub async fn create_leave_type(
    pool: &SqlitePool,
    name: &str,
    unit: LeaveUnit,
    allows_hourly: bool,
) -> Result<LeaveTypeRecord, EngineError> {
    let result = sqlx::query(
        "INSERT INTO leave_types (name, unit, allows_hourly, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(unit.to_string())
    .bind(allows_hourly)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    get_leave_type(pool, result.last_insert_rowid()).await
}

pub async fn list_leave_types(pool: &SqlitePool) -> Result<Vec<LeaveTypeRecord>, EngineError> {
    let rows = sqlx::query_as::<_, LeaveTypeRecord>(
        "SELECT id, name, unit, allows_hourly FROM leave_types ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Establish (or restate) the balance row for one (employee, type, year).
pub async fn seed_balance(
    pool: &SqlitePool,
    employee_id: i64,
    leave_type_id: i64,
    year: i64,
    opening_balance: Decimal,
    credited: Decimal,
    carry_forward: Decimal,
) -> Result<LeaveBalance, EngineError> {
    sqlx::query(
        r#"
        INSERT INTO leave_balances
            (employee_id, leave_type_id, year, opening_balance, credited, carry_forward)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(employee_id, leave_type_id, year) DO UPDATE SET
            opening_balance = excluded.opening_balance,
            credited = excluded.credited,
            carry_forward = excluded.carry_forward,
            version = version + 1
        "#,
    )
    .bind(employee_id)
    .bind(leave_type_id)
    .bind(year)
    .bind(opening_balance.to_string())
    .bind(credited.to_string())
    .bind(carry_forward.to_string())
    .execute(pool)
    .await?;

    let row = sqlx::query_as::<_, LeaveBalanceRow>(
        "SELECT * FROM leave_balances WHERE employee_id = ? AND leave_type_id = ? AND year = ?",
    )
    .bind(employee_id)
    .bind(leave_type_id)
    .bind(year)
    .fetch_one(pool)
    .await?;
    row.try_into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day_type() -> LeaveTypeRecord {
        LeaveTypeRecord {
            id: 1,
            name: "annual".into(),
            unit: "DAYS".into(),
            allows_hourly: false,
        }
    }

    fn hourly_type() -> LeaveTypeRecord {
        LeaveTypeRecord {
            id: 2,
            name: "personal".into(),
            unit: "HOURS".into(),
            allows_hourly: true,
        }
    }

    fn request(start: &str, end: &str) -> CreateLeave {
        CreateLeave {
            leave_type_id: 1,
            start_date: start.parse().unwrap(),
            end_date: end.parse().unwrap(),
            start_time: None,
            end_time: None,
            reason: None,
        }
    }

    #[test]
    fn day_span_is_inclusive() {
        let (days, hours) = requested_quantity(&day_type(), &request("2026-03-02", "2026-03-04"))
            .unwrap();
        assert_eq!(days, Some(dec!(3)));
        assert_eq!(hours, None);
    }

    #[test]
    fn single_day_counts_one() {
        let (days, _) =
            requested_quantity(&day_type(), &request("2026-03-02", "2026-03-02")).unwrap();
        assert_eq!(days, Some(dec!(1)));
    }

    #[test]
    fn hourly_quantity_rounds_to_two_decimals() {
        let mut input = request("2026-03-02", "2026-03-02");
        input.leave_type_id = 2;
        input.start_time = Some("09:00:00".parse().unwrap());
        input.end_time = Some("13:10:00".parse().unwrap());
        let (days, hours) = requested_quantity(&hourly_type(), &input).unwrap();
        assert_eq!(days, None);
        assert_eq!(hours, Some(dec!(4.17)));
    }

    #[test]
    fn hourly_rejected_for_day_only_types() {
        let mut input = request("2026-03-02", "2026-03-02");
        input.start_time = Some("09:00:00".parse().unwrap());
        input.end_time = Some("11:00:00".parse().unwrap());
        assert!(matches!(
            requested_quantity(&day_type(), &input),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn inverted_range_rejected() {
        assert!(matches!(
            requested_quantity(&day_type(), &request("2026-03-04", "2026-03-02")),
            Err(EngineError::Validation(_))
        ));
    }
}
