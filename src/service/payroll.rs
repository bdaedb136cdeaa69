use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::attendance::AttendanceRule;
use crate::model::employee::{Employee, PayBasis, PayFrequency};
use crate::model::payroll::{
    AdjustmentKind, PayAdjustment, PayAdjustmentRow, PayComponent, PayrollRecord,
    PayrollRecordRow, PayrollRun, PayrollRunRow, RunAction, RunStatus, component_total,
    components_to_db, next_run_status,
};
use crate::model::timesheet::Timesheet;
use crate::service::employee::get_employee;
use crate::service::policy::DeductionPolicy;
use crate::service::timesheet::overlapping;
use crate::utils::db_utils::round2;
use crate::utils::rule_cache::resolve_rule;

/// One employee's fully computed pay, not yet persisted. Drafts for a run are
/// written all-or-nothing.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub employee_id: i64,
    pub pay_basis: PayBasis,
    pub regular_hours: Decimal,
    pub overtime_hours: Decimal,
    pub hourly_rate: Option<Decimal>,
    pub base_pay: Decimal,
    pub overtime_pay: Decimal,
    pub bonuses: Decimal,
    pub reimbursements: Decimal,
    pub gross_pay: Decimal,
    pub pre_tax_deductions: Vec<PayComponent>,
    pub taxes: Vec<PayComponent>,
    pub post_tax_deductions: Vec<PayComponent>,
    pub employer_contributions: Vec<PayComponent>,
    pub total_deductions: Decimal,
    pub total_taxes: Decimal,
    pub net_pay: Decimal,
}

/// Pay math for one employee over one timesheet. Every monetary figure is
/// rounded to 2 decimals as it is produced, so later summation cannot drift.
pub fn compute_record(
    employee: &Employee,
    timesheet: &Timesheet,
    rule: &AttendanceRule,
    adjustments: &[PayAdjustment],
    policy: &dyn DeductionPolicy,
    working_days_per_week: Decimal,
) -> Result<RecordDraft, EngineError> {
    let regular_hours = timesheet.total_regular_hours;
    let overtime_hours = timesheet.total_overtime_hours;

    let (rate, base_pay) = match employee.pay_basis {
        PayBasis::Hourly => {
            let rate = employee.hourly_rate.ok_or_else(|| {
                EngineError::ReferenceDataMissing(format!(
                    "hourly rate for employee {}",
                    employee.id
                ))
            })?;
            (rate, round2(regular_hours * rate))
        }
        PayBasis::Salaried => {
            let annual = employee.annual_salary.ok_or_else(|| {
                EngineError::ReferenceDataMissing(format!(
                    "annual salary for employee {}",
                    employee.id
                ))
            })?;
            if working_days_per_week.is_zero() || rule.regular_hours_per_day.is_zero() {
                return Err(EngineError::Validation(
                    "working days per week and rule hours per day must be positive".into(),
                ));
            }
            let period_salary = round2(annual / employee.pay_frequency.periods_per_year());
            let daily = annual / Decimal::from(52) / working_days_per_week;
            let derived_rate = round2(daily / rule.regular_hours_per_day);
            (derived_rate, period_salary)
        }
    };

    let overtime_pay = round2(overtime_hours * rate * rule.overtime_multiplier);

    let mut bonuses = Decimal::ZERO;
    let mut reimbursements = Decimal::ZERO;
    let mut pre_tax_deductions = Vec::new();
    let mut post_tax_deductions = Vec::new();
    for adj in adjustments {
        let name = adj
            .description
            .clone()
            .unwrap_or_else(|| adj.kind.to_string().to_lowercase());
        match adj.kind {
            AdjustmentKind::Bonus => bonuses += adj.amount,
            AdjustmentKind::Reimbursement => reimbursements += adj.amount,
            AdjustmentKind::PreTaxDeduction => pre_tax_deductions.push(PayComponent {
                name,
                amount: adj.amount,
            }),
            AdjustmentKind::PostTaxDeduction => post_tax_deductions.push(PayComponent {
                name,
                amount: adj.amount,
            }),
        }
    }
    let bonuses = round2(bonuses);
    let reimbursements = round2(reimbursements);

    let gross_pay = round2(base_pay + overtime_pay + bonuses + reimbursements);

    let pre_tax_total = round2(component_total(&pre_tax_deductions));
    let taxable = (gross_pay - pre_tax_total).max(Decimal::ZERO);
    let assessment = policy.assess(taxable, employee);

    let taxes = assessment.taxes;
    post_tax_deductions.extend(assessment.post_tax_deductions);
    let employer_contributions = assessment.employer_contributions;

    let total_taxes = round2(component_total(&taxes));
    let total_deductions = round2(pre_tax_total + component_total(&post_tax_deductions));
    let net_pay = round2(gross_pay - total_deductions - total_taxes);

    Ok(RecordDraft {
        employee_id: employee.id,
        pay_basis: employee.pay_basis,
        regular_hours,
        overtime_hours,
        hourly_rate: Some(rate),
        base_pay,
        overtime_pay,
        bonuses,
        reimbursements,
        gross_pay,
        pre_tax_deductions,
        taxes,
        post_tax_deductions,
        employer_contributions,
        total_deductions,
        total_taxes,
        net_pay,
    })
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRun {
    #[schema(value_type = String, format = "date")]
    pub period_start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub period_end: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub pay_date: NaiveDate,
    pub pay_frequency: PayFrequency,
}

pub async fn create_run(pool: &SqlitePool, input: CreateRun) -> Result<PayrollRun, EngineError> {
    if input.period_end < input.period_start {
        return Err(EngineError::Validation(
            "period_end cannot be before period_start".into(),
        ));
    }

    let suffix = Uuid::new_v4().to_simple().to_string();
    let run_number = format!(
        "PR-{}-{}",
        input.period_start.format("%Y-%m"),
        &suffix[..8]
    );
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO payroll_runs
            (run_number, period_start, period_end, pay_date, pay_frequency,
             status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 'DRAFT', ?, ?)
        "#,
    )
    .bind(&run_number)
    .bind(input.period_start)
    .bind(input.period_end)
    .bind(input.pay_date)
    .bind(input.pay_frequency.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_run(pool, result.last_insert_rowid()).await
}

/// Calculate every overlapping timesheet into payroll records, all or
/// nothing. Exactly one calculation may hold the CALCULATING claim; losers
/// fail with `AlreadyCalculating`. Any per-employee failure releases the run
/// back to DRAFT with zero records persisted.
pub async fn calculate(
    pool: &SqlitePool,
    run_id: i64,
    policy: &dyn DeductionPolicy,
    working_days_per_week: Decimal,
) -> Result<PayrollRun, EngineError> {
    let run = get_run(pool, run_id).await?;
    if run.status == RunStatus::Calculating {
        return Err(EngineError::AlreadyCalculating);
    }
    next_run_status(run.status, RunAction::Calculate)?;

    let claimed = sqlx::query(
        "UPDATE payroll_runs SET status = 'CALCULATING', updated_at = ? WHERE id = ? AND status = 'DRAFT'",
    )
    .bind(Utc::now())
    .bind(run_id)
    .execute(pool)
    .await?;
    if claimed.rows_affected() == 0 {
        return Err(EngineError::AlreadyCalculating);
    }

    let computed = compute_run_records(pool, &run, policy, working_days_per_week).await;
    let drafts = match computed {
        Ok(drafts) => drafts,
        Err(e) => {
            tracing::warn!(run_id, error = %e, "payroll calculation aborted; run released to DRAFT");
            release_claim(pool, run_id).await;
            return Err(e);
        }
    };

    if let Err(e) = persist_records(pool, run_id, &drafts).await {
        tracing::error!(run_id, error = %e, "failed to persist payroll records; run released to DRAFT");
        release_claim(pool, run_id).await;
        return Err(e);
    }

    tracing::info!(run_id, employees = drafts.len(), "payroll run calculated");
    get_run(pool, run_id).await
}

async fn compute_run_records(
    pool: &SqlitePool,
    run: &PayrollRun,
    policy: &dyn DeductionPolicy,
    working_days_per_week: Decimal,
) -> Result<Vec<RecordDraft>, EngineError> {
    let timesheets = overlapping(pool, run.period_start, run.period_end).await?;
    let mut drafts = Vec::with_capacity(timesheets.len());

    for timesheet in &timesheets {
        let employee = match get_employee(pool, timesheet.employee_id).await {
            Ok(e) => e,
            Err(EngineError::NotFound(_)) => {
                return Err(EngineError::ReferenceDataMissing(format!(
                    "employee {}",
                    timesheet.employee_id
                )));
            }
            Err(e) => return Err(e),
        };
        let rule = resolve_rule(pool, employee.id).await?;
        let adjustments =
            adjustments_in_period(pool, employee.id, run.period_start, run.period_end).await?;
        drafts.push(compute_record(
            &employee,
            timesheet,
            &rule,
            &adjustments,
            policy,
            working_days_per_week,
        )?);
    }
    Ok(drafts)
}

async fn persist_records(
    pool: &SqlitePool,
    run_id: i64,
    drafts: &[RecordDraft],
) -> Result<(), EngineError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM payroll_records WHERE run_id = ?")
        .bind(run_id)
        .execute(&mut *tx)
        .await?;

    let mut total_gross = Decimal::ZERO;
    let mut total_deductions = Decimal::ZERO;
    let mut total_taxes = Decimal::ZERO;
    let mut total_net = Decimal::ZERO;
    let mut total_employer = Decimal::ZERO;

    for draft in drafts {
        sqlx::query(
            r#"
            INSERT INTO payroll_records
                (run_id, employee_id, pay_basis, regular_hours, overtime_hours,
                 hourly_rate, base_pay, overtime_pay, bonuses, reimbursements,
                 gross_pay, pre_tax_deductions, taxes, post_tax_deductions,
                 employer_contributions, total_deductions, total_taxes, net_pay,
                 created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id)
        .bind(draft.employee_id)
        .bind(draft.pay_basis.to_string())
        .bind(draft.regular_hours.to_string())
        .bind(draft.overtime_hours.to_string())
        .bind(draft.hourly_rate.map(|r| r.to_string()))
        .bind(draft.base_pay.to_string())
        .bind(draft.overtime_pay.to_string())
        .bind(draft.bonuses.to_string())
        .bind(draft.reimbursements.to_string())
        .bind(draft.gross_pay.to_string())
        .bind(components_to_db(&draft.pre_tax_deductions))
        .bind(components_to_db(&draft.taxes))
        .bind(components_to_db(&draft.post_tax_deductions))
        .bind(components_to_db(&draft.employer_contributions))
        .bind(draft.total_deductions.to_string())
        .bind(draft.total_taxes.to_string())
        .bind(draft.net_pay.to_string())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        total_gross += draft.gross_pay;
        total_deductions += draft.total_deductions;
        total_taxes += draft.total_taxes;
        total_net += draft.net_pay;
        total_employer += component_total(&draft.employer_contributions);
    }

    let updated = sqlx::query(
        r#"
        UPDATE payroll_runs
        SET status = 'CALCULATED', total_employees = ?, total_gross = ?,
            total_deductions = ?, total_taxes = ?, total_net = ?,
            total_employer_contributions = ?, updated_at = ?
        WHERE id = ? AND status = 'CALCULATING'
        "#,
    )
    .bind(drafts.len() as i64)
    .bind(total_gross.to_string())
    .bind(total_deductions.to_string())
    .bind(total_taxes.to_string())
    .bind(total_net.to_string())
    .bind(round2(total_employer).to_string())
    .bind(Utc::now())
    .bind(run_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(EngineError::Conflict(
            "payroll run lost its calculating claim".into(),
        ));
    }

    tx.commit().await?;
    Ok(())
}

/// Best-effort rollback to DRAFT after a failed calculation; the claim
/// guard keeps it from clobbering a state someone else has since set.
async fn release_claim(pool: &SqlitePool, run_id: i64) {
    let released = sqlx::query(
        "UPDATE payroll_runs SET status = 'DRAFT', updated_at = ? WHERE id = ? AND status = 'CALCULATING'",
    )
    .bind(Utc::now())
    .bind(run_id)
    .execute(pool)
    .await;
    if let Err(e) = released {
        tracing::error!(run_id, error = %e, "failed to release payroll run claim");
    }
}

pub async fn approve_run(
    pool: &SqlitePool,
    run_id: i64,
    actor_id: i64,
) -> Result<PayrollRun, EngineError> {
    let run = get_run(pool, run_id).await?;
    next_run_status(run.status, RunAction::Approve)?;

    let updated = sqlx::query(
        r#"
        UPDATE payroll_runs
        SET status = 'APPROVED', approved_by = ?, approved_at = ?, updated_at = ?
        WHERE id = ? AND status = 'CALCULATED'
        "#,
    )
    .bind(actor_id)
    .bind(Utc::now())
    .bind(Utc::now())
    .bind(run_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        let fresh = get_run(pool, run_id).await?;
        return Err(EngineError::InvalidStateTransition {
            entity: "payroll run",
            from: fresh.status.to_string(),
            action: "APPROVE",
        });
    }
    get_run(pool, run_id).await
}

/// Marks the run as posted. Records for the run are immutable from here on.
pub async fn process_run(pool: &SqlitePool, run_id: i64) -> Result<PayrollRun, EngineError> {
    let run = get_run(pool, run_id).await?;
    next_run_status(run.status, RunAction::Process)?;

    let updated = sqlx::query(
        r#"
        UPDATE payroll_runs
        SET status = 'PROCESSED', processed_at = ?, updated_at = ?
        WHERE id = ? AND status = 'APPROVED'
        "#,
    )
    .bind(Utc::now())
    .bind(Utc::now())
    .bind(run_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        let fresh = get_run(pool, run_id).await?;
        return Err(EngineError::InvalidStateTransition {
            entity: "payroll run",
            from: fresh.status.to_string(),
            action: "PROCESS",
        });
    }
    get_run(pool, run_id).await
}

pub async fn get_run(pool: &SqlitePool, run_id: i64) -> Result<PayrollRun, EngineError> {
    let row = sqlx::query_as::<_, PayrollRunRow>("SELECT * FROM payroll_runs WHERE id = ?")
        .bind(run_id)
        .fetch_optional(pool)
        .await?
        .ok_or(EngineError::NotFound("payroll run"))?;
    row.try_into()
}

pub async fn list_runs(pool: &SqlitePool) -> Result<Vec<PayrollRun>, EngineError> {
    let rows = sqlx::query_as::<_, PayrollRunRow>("SELECT * FROM payroll_runs ORDER BY id DESC")
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(PayrollRun::try_from).collect()
}

pub async fn records_for_run(
    pool: &SqlitePool,
    run_id: i64,
) -> Result<Vec<PayrollRecord>, EngineError> {
    let rows = sqlx::query_as::<_, PayrollRecordRow>(
        "SELECT * FROM payroll_records WHERE run_id = ? ORDER BY employee_id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(PayrollRecord::try_from).collect()
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAdjustment {
    pub employee_id: i64,
    #[schema(value_type = String, format = "date")]
    pub effective_date: NaiveDate,
    pub kind: AdjustmentKind,
    #[schema(value_type = String, example = "150.00")]
    pub amount: Decimal,
    pub description: Option<String>,
}

pub async fn add_adjustment(
    pool: &SqlitePool,
    input: CreateAdjustment,
) -> Result<PayAdjustment, EngineError> {
    let result = sqlx::query(
        r#"
        INSERT INTO pay_adjustments (employee_id, effective_date, kind, amount, description, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.employee_id)
    .bind(input.effective_date)
    .bind(input.kind.to_string())
    .bind(input.amount.to_string())
    .bind(&input.description)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    let row = sqlx::query_as::<_, PayAdjustmentRow>("SELECT * FROM pay_adjustments WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(pool)
        .await?;
    row.try_into()
}

pub async fn list_adjustments(
    pool: &SqlitePool,
    employee_id: Option<i64>,
) -> Result<Vec<PayAdjustment>, EngineError> {
    let rows = match employee_id {
        Some(emp) => {
            sqlx::query_as::<_, PayAdjustmentRow>(
                "SELECT * FROM pay_adjustments WHERE employee_id = ? ORDER BY effective_date DESC",
            )
            .bind(emp)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, PayAdjustmentRow>(
                "SELECT * FROM pay_adjustments ORDER BY effective_date DESC",
            )
            .fetch_all(pool)
            .await?
        }
    };
    rows.into_iter().map(PayAdjustment::try_from).collect()
}

async fn adjustments_in_period(
    pool: &SqlitePool,
    employee_id: i64,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Result<Vec<PayAdjustment>, EngineError> {
    let rows = sqlx::query_as::<_, PayAdjustmentRow>(
        r#"
        SELECT * FROM pay_adjustments
        WHERE employee_id = ? AND effective_date >= ? AND effective_date <= ?
        ORDER BY id
        "#,
    )
    .bind(employee_id)
    .bind(period_start)
    .bind(period_end)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(PayAdjustment::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveTime;
    use rust_decimal_macros::dec;

    use crate::model::timesheet::TimesheetStatus;
    use crate::service::policy::{FlatRatePolicy, ZeroPolicy};

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

    fn timesheet(regular: Decimal, overtime: Decimal) -> Timesheet {
        Timesheet {
            id: 1,
            employee_id: 1,
            period_start: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            total_regular_hours: regular,
            total_overtime_hours: overtime,
            present_days: 10,
            absent_days: 0,
            leave_days: dec!(0),
            status: TimesheetStatus::Generated,
            generated_at: Utc::now(),
        }
    }

    fn hourly_employee() -> Employee {
        Employee {
            id: 1,
            employee_code: "EMP-001".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            email: "jane@company.com".into(),
            active: true,
            department_id: None,
            pay_basis: PayBasis::Hourly,
            hourly_rate: Some(dec!(25)),
            annual_salary: None,
            pay_frequency: PayFrequency::Biweekly,
            attendance_rule_id: None,
            created_at: Utc::now(),
        }
    }

    fn salaried_employee() -> Employee {
        Employee {
            pay_basis: PayBasis::Salaried,
            hourly_rate: None,
            annual_salary: Some(dec!(65000)),
            ..hourly_employee()
        }
    }

    #[test]
    fn hourly_pay_with_overtime() {
        let draft = compute_record(
            &hourly_employee(),
            &timesheet(dec!(80), dec!(1.5)),
            &rule(),
            &[],
            &ZeroPolicy,
            dec!(5),
        )
        .unwrap();
        assert_eq!(draft.base_pay, dec!(2000.00));
        assert_eq!(draft.overtime_pay, dec!(56.25)); // 1.5h * 25 * 1.5
        assert_eq!(draft.gross_pay, dec!(2056.25));
        assert_eq!(draft.total_taxes, dec!(0));
        assert_eq!(draft.net_pay, dec!(2056.25));
    }

    #[test]
    fn salaried_pay_uses_period_salary() {
        let draft = compute_record(
            &salaried_employee(),
            &timesheet(dec!(80), dec!(0)),
            &rule(),
            &[],
            &ZeroPolicy,
            dec!(5),
        )
        .unwrap();
        // 65000 / 26 pay periods
        assert_eq!(draft.base_pay, dec!(2500.00));
        assert_eq!(draft.overtime_pay, dec!(0.00));
        assert_eq!(draft.net_pay, dec!(2500.00));
    }

    #[test]
    fn salaried_overtime_prices_off_derived_rate() {
        let draft = compute_record(
            &salaried_employee(),
            &timesheet(dec!(80), dec!(2)),
            &rule(),
            &[],
            &ZeroPolicy,
            dec!(5),
        )
        .unwrap();
        // 65000 / 52 / 5 / 8 = 31.25/h; 2h * 31.25 * 1.5 = 93.75
        assert_eq!(draft.hourly_rate, Some(dec!(31.25)));
        assert_eq!(draft.overtime_pay, dec!(93.75));
    }

    #[test]
    fn missing_hourly_rate_is_reference_data_error() {
        let mut employee = hourly_employee();
        employee.hourly_rate = None;
        let err = compute_record(
            &employee,
            &timesheet(dec!(80), dec!(0)),
            &rule(),
            &[],
            &ZeroPolicy,
            dec!(5),
        )
        .unwrap_err();
        assert_matches!(err, EngineError::ReferenceDataMissing(_));
    }

    #[test]
    fn adjustments_and_flat_tax_flow_through() {
        let adjustments = vec![
            PayAdjustment {
                id: 1,
                employee_id: 1,
                effective_date: NaiveDate::from_ymd_opt(2026, 3, 5).unwrap(),
                kind: AdjustmentKind::Bonus,
                amount: dec!(200),
                description: Some("spot bonus".into()),
            },
            PayAdjustment {
                id: 2,
                employee_id: 1,
                effective_date: NaiveDate::from_ymd_opt(2026, 3, 6).unwrap(),
                kind: AdjustmentKind::PreTaxDeduction,
                amount: dec!(100),
                description: Some("retirement".into()),
            },
        ];
        let policy = FlatRatePolicy {
            rate_percent: dec!(10),
        };
        let draft = compute_record(
            &hourly_employee(),
            &timesheet(dec!(80), dec!(0)),
            &rule(),
            &adjustments,
            &policy,
            dec!(5),
        )
        .unwrap();
        assert_eq!(draft.gross_pay, dec!(2200.00));
        // taxable 2100 -> 210 withheld
        assert_eq!(draft.total_taxes, dec!(210.00));
        assert_eq!(draft.total_deductions, dec!(100.00));
        assert_eq!(draft.net_pay, dec!(1890.00));
    }
}
