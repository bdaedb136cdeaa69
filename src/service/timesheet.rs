use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::SqlitePool;

use crate::error::EngineError;
use crate::model::timesheet::{Timesheet, TimesheetRow, TimesheetStatus};
use crate::utils::db_utils::dec_col;

#[derive(Debug, sqlx::FromRow)]
struct ApprovedHoursRow {
    employee_id: i64,
    date: NaiveDate,
    regular_hours: String,
    overtime_hours: String,
}

#[derive(Debug, Default)]
struct Accumulator {
    regular: Decimal,
    overtime: Decimal,
    dates: BTreeSet<NaiveDate>,
}

/// Aggregate approved attendance into one GENERATED timesheet per employee,
/// replacing any prior snapshot for the same (employee, period). Pure over
/// its inputs: re-running after no attendance changes yields identical
/// totals, and employees with zero approved records get no timesheet.
pub async fn generate(
    pool: &SqlitePool,
    period_start: NaiveDate,
    period_end: NaiveDate,
    employee_ids: Option<&[i64]>,
    include_leave: bool,
) -> Result<Vec<Timesheet>, EngineError> {
    if period_end < period_start {
        return Err(EngineError::Validation(
            "period_end cannot be before period_start".into(),
        ));
    }

    let mut sql = String::from(
        r#"
        SELECT employee_id, date, regular_hours, overtime_hours
        FROM attendance_records
        WHERE approval_status = 'APPROVED' AND date >= ? AND date <= ?
        "#,
    );
    if let Some(ids) = employee_ids {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sql.push_str(" AND employee_id IN (");
        sql.push_str(&vec!["?"; ids.len()].join(", "));
        sql.push(')');
    }

    let mut query = sqlx::query_as::<_, ApprovedHoursRow>(&sql)
        .bind(period_start)
        .bind(period_end);
    if let Some(ids) = employee_ids {
        for id in ids {
            query = query.bind(*id);
        }
    }
    let rows = query.fetch_all(pool).await?;

    let mut groups: BTreeMap<i64, Accumulator> = BTreeMap::new();
    for row in rows {
        let acc = groups.entry(row.employee_id).or_default();
        acc.regular += dec_col("regular_hours", &row.regular_hours)?;
        acc.overtime += dec_col("overtime_hours", &row.overtime_hours)?;
        acc.dates.insert(row.date);
    }

    let leave_days = if include_leave {
        approved_leave_days(pool, period_start, period_end, employee_ids).await?
    } else {
        BTreeMap::new()
    };

    let working_days = working_days_in(period_start, period_end);
    let mut timesheets = Vec::with_capacity(groups.len());

    for (employee_id, acc) in groups {
        let present_days = acc.dates.len() as i64;
        let leave = leave_days
            .get(&employee_id)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let absent = (Decimal::from(working_days) - Decimal::from(present_days) - leave)
            .max(Decimal::ZERO);
        let absent_days = absent.trunc().to_i64().unwrap_or(0);

        let mut tx = pool.begin().await?;
        sqlx::query(
            "DELETE FROM timesheets WHERE employee_id = ? AND period_start = ? AND period_end = ?",
        )
        .bind(employee_id)
        .bind(period_start)
        .bind(period_end)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO timesheets
                (employee_id, period_start, period_end, total_regular_hours,
                 total_overtime_hours, present_days, absent_days, leave_days,
                 status, generated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(employee_id)
        .bind(period_start)
        .bind(period_end)
        .bind(acc.regular.to_string())
        .bind(acc.overtime.to_string())
        .bind(present_days)
        .bind(absent_days)
        .bind(leave.to_string())
        .bind(TimesheetStatus::Generated.to_string())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        timesheets.push(get_timesheet(pool, result.last_insert_rowid()).await?);
    }

    tracing::info!(
        count = timesheets.len(),
        %period_start,
        %period_end,
        "timesheets generated"
    );
    Ok(timesheets)
}

/// Days of APPROVED day-based leave overlapping the period, per employee.
async fn approved_leave_days(
    pool: &SqlitePool,
    period_start: NaiveDate,
    period_end: NaiveDate,
    employee_ids: Option<&[i64]>,
) -> Result<BTreeMap<i64, Decimal>, EngineError> {
    let mut sql = String::from(
        r#"
        SELECT employee_id, start_date, end_date
        FROM leave_requests
        WHERE status = 'APPROVED' AND total_days IS NOT NULL
          AND start_date <= ? AND end_date >= ?
        "#,
    );
    if let Some(ids) = employee_ids {
        sql.push_str(" AND employee_id IN (");
        sql.push_str(&vec!["?"; ids.len()].join(", "));
        sql.push(')');
    }

    let mut query = sqlx::query_as::<_, (i64, NaiveDate, NaiveDate)>(&sql)
        .bind(period_end)
        .bind(period_start);
    if let Some(ids) = employee_ids {
        for id in ids {
            query = query.bind(*id);
        }
    }

    let mut per_employee = BTreeMap::new();
    for (employee_id, start, end) in query.fetch_all(pool).await? {
        let overlap_start = start.max(period_start);
        let overlap_end = end.min(period_end);
        let days = (overlap_end - overlap_start).num_days() + 1;
        *per_employee
            .entry(employee_id)
            .or_insert(Decimal::ZERO) += Decimal::from(days);
    }
    Ok(per_employee)
}

fn working_days_in(start: NaiveDate, end: NaiveDate) -> i64 {
    let mut count = 0;
    let mut day = start;
    while day <= end {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            count += 1;
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    count
}

pub async fn get_timesheet(pool: &SqlitePool, id: i64) -> Result<Timesheet, EngineError> {
    let row = sqlx::query_as::<_, TimesheetRow>("SELECT * FROM timesheets WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(EngineError::NotFound("timesheet"))?;
    row.try_into()
}

pub async fn list_timesheets(
    pool: &SqlitePool,
    employee_id: Option<i64>,
) -> Result<Vec<Timesheet>, EngineError> {
    let rows = match employee_id {
        Some(emp) => {
            sqlx::query_as::<_, TimesheetRow>(
                "SELECT * FROM timesheets WHERE employee_id = ? ORDER BY period_start DESC, id",
            )
            .bind(emp)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, TimesheetRow>(
                "SELECT * FROM timesheets ORDER BY period_start DESC, id",
            )
            .fetch_all(pool)
            .await?
        }
    };
    rows.into_iter().map(Timesheet::try_from).collect()
}

/// Timesheets whose period overlaps the given range; payroll calculation
/// consumes these.
pub async fn overlapping(
    pool: &SqlitePool,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Result<Vec<Timesheet>, EngineError> {
    let rows = sqlx::query_as::<_, TimesheetRow>(
        r#"
        SELECT * FROM timesheets
        WHERE period_start <= ? AND period_end >= ?
        ORDER BY employee_id
        "#,
    )
    .bind(period_end)
    .bind(period_start)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(Timesheet::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_days_skip_weekends() {
        // Mon 2026-03-02 .. Sun 2026-03-08
        let start = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        assert_eq!(working_days_in(start, end), 5);
    }

    #[test]
    fn single_weekend_day_counts_zero() {
        let sat = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(working_days_in(sat, sat), 0);
    }
}
