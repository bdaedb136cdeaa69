use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::EngineError;
use crate::model::employee::PayBasis;
use crate::utils::db_utils::{dec_col, enum_col, opt_dec_col};

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
pub enum RunStatus {
    Draft,
    Calculating,
    Calculated,
    Approved,
    Processed,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RunAction {
    Calculate,
    CompleteCalculation,
    FailCalculation,
    Approve,
    Process,
}

/// Run lifecycle as a static transition table; the CALCULATING claim itself
/// is taken with a compare-and-swap on the status column.
static RUN_TRANSITIONS: Lazy<HashMap<(RunStatus, RunAction), RunStatus>> = Lazy::new(|| {
    use RunAction::*;
    use RunStatus::*;
    HashMap::from([
        ((Draft, Calculate), Calculating),
        ((Calculating, CompleteCalculation), Calculated),
        ((Calculating, FailCalculation), Draft),
        ((Calculated, Approve), Approved),
        ((Approved, Process), Processed),
    ])
});

pub fn next_run_status(from: RunStatus, action: RunAction) -> Result<RunStatus, EngineError> {
    RUN_TRANSITIONS.get(&(from, action)).copied().ok_or_else(|| {
        EngineError::InvalidStateTransition {
            entity: "payroll run",
            from: from.to_string(),
            action: action.into(),
        }
    })
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
pub enum AdjustmentKind {
    Bonus,
    Reimbursement,
    PreTaxDeduction,
    PostTaxDeduction,
}

/// One itemized line on a pay record (a deduction, a tax, a contribution).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PayComponent {
    #[schema(example = "withholding")]
    pub name: String,
    #[schema(value_type = String, example = "120.00")]
    pub amount: Decimal,
}

pub fn component_total(components: &[PayComponent]) -> Decimal {
    components.iter().map(|c| c.amount).sum()
}

fn components_col(column: &str, raw: &str) -> Result<Vec<PayComponent>, EngineError> {
    serde_json::from_str(raw).map_err(|_| crate::error::corrupt(column, raw))
}

pub fn components_to_db(components: &[PayComponent]) -> String {
    serde_json::to_string(components).unwrap_or_else(|_| "[]".into())
}

#[derive(Debug, sqlx::FromRow)]
pub struct PayrollRunRow {
    pub id: i64,
    pub run_number: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub pay_date: NaiveDate,
    pub pay_frequency: String,
    pub status: String,
    pub total_employees: i64,
    pub total_gross: String,
    pub total_deductions: String,
    pub total_taxes: String,
    pub total_net: String,
    pub total_employer_contributions: String,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayrollRun {
    pub id: i64,
    #[schema(example = "PR-2026-01-4fa31b2c")]
    pub run_number: String,
    #[schema(value_type = String, format = "date")]
    pub period_start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub period_end: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub pay_date: NaiveDate,
    pub pay_frequency: String,
    pub status: RunStatus,
    pub total_employees: i64,
    #[schema(value_type = String, example = "10250.00")]
    pub total_gross: Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub total_deductions: Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub total_taxes: Decimal,
    #[schema(value_type = String, example = "10250.00")]
    pub total_net: Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub total_employer_contributions: Decimal,
    pub approved_by: Option<i64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub processed_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PayrollRunRow> for PayrollRun {
    type Error = EngineError;

    fn try_from(row: PayrollRunRow) -> Result<Self, Self::Error> {
        Ok(PayrollRun {
            id: row.id,
            run_number: row.run_number,
            period_start: row.period_start,
            period_end: row.period_end,
            pay_date: row.pay_date,
            pay_frequency: row.pay_frequency,
            status: enum_col("status", &row.status)?,
            total_employees: row.total_employees,
            total_gross: dec_col("total_gross", &row.total_gross)?,
            total_deductions: dec_col("total_deductions", &row.total_deductions)?,
            total_taxes: dec_col("total_taxes", &row.total_taxes)?,
            total_net: dec_col("total_net", &row.total_net)?,
            total_employer_contributions: dec_col(
                "total_employer_contributions",
                &row.total_employer_contributions,
            )?,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            processed_at: row.processed_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PayrollRecordRow {
    pub id: i64,
    pub run_id: i64,
    pub employee_id: i64,
    pub pay_basis: String,
    pub regular_hours: String,
    pub overtime_hours: String,
    pub hourly_rate: Option<String>,
    pub base_pay: String,
    pub overtime_pay: String,
    pub bonuses: String,
    pub reimbursements: String,
    pub gross_pay: String,
    pub pre_tax_deductions: String,
    pub taxes: String,
    pub post_tax_deductions: String,
    pub employer_contributions: String,
    pub total_deductions: String,
    pub total_taxes: String,
    pub net_pay: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayrollRecord {
    pub id: i64,
    pub run_id: i64,
    pub employee_id: i64,
    pub pay_basis: PayBasis,
    #[schema(value_type = String, example = "80.00")]
    pub regular_hours: Decimal,
    #[schema(value_type = String, example = "1.50")]
    pub overtime_hours: Decimal,
    #[schema(value_type = Option<String>, example = "25.00")]
    pub hourly_rate: Option<Decimal>,
    #[schema(value_type = String, example = "2000.00")]
    pub base_pay: Decimal,
    #[schema(value_type = String, example = "56.25")]
    pub overtime_pay: Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub bonuses: Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub reimbursements: Decimal,
    #[schema(value_type = String, example = "2056.25")]
    pub gross_pay: Decimal,
    pub pre_tax_deductions: Vec<PayComponent>,
    pub taxes: Vec<PayComponent>,
    pub post_tax_deductions: Vec<PayComponent>,
    pub employer_contributions: Vec<PayComponent>,
    #[schema(value_type = String, example = "0.00")]
    pub total_deductions: Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub total_taxes: Decimal,
    #[schema(value_type = String, example = "2056.25")]
    pub net_pay: Decimal,
}

impl TryFrom<PayrollRecordRow> for PayrollRecord {
    type Error = EngineError;

    fn try_from(row: PayrollRecordRow) -> Result<Self, Self::Error> {
        Ok(PayrollRecord {
            id: row.id,
            run_id: row.run_id,
            employee_id: row.employee_id,
            pay_basis: enum_col("pay_basis", &row.pay_basis)?,
            regular_hours: dec_col("regular_hours", &row.regular_hours)?,
            overtime_hours: dec_col("overtime_hours", &row.overtime_hours)?,
            hourly_rate: opt_dec_col("hourly_rate", row.hourly_rate.as_deref())?,
            base_pay: dec_col("base_pay", &row.base_pay)?,
            overtime_pay: dec_col("overtime_pay", &row.overtime_pay)?,
            bonuses: dec_col("bonuses", &row.bonuses)?,
            reimbursements: dec_col("reimbursements", &row.reimbursements)?,
            gross_pay: dec_col("gross_pay", &row.gross_pay)?,
            pre_tax_deductions: components_col("pre_tax_deductions", &row.pre_tax_deductions)?,
            taxes: components_col("taxes", &row.taxes)?,
            post_tax_deductions: components_col("post_tax_deductions", &row.post_tax_deductions)?,
            employer_contributions: components_col(
                "employer_contributions",
                &row.employer_contributions,
            )?,
            total_deductions: dec_col("total_deductions", &row.total_deductions)?,
            total_taxes: dec_col("total_taxes", &row.total_taxes)?,
            net_pay: dec_col("net_pay", &row.net_pay)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PayAdjustmentRow {
    pub id: i64,
    pub employee_id: i64,
    pub effective_date: NaiveDate,
    pub kind: String,
    pub amount: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayAdjustment {
    pub id: i64,
    pub employee_id: i64,
    #[schema(value_type = String, format = "date")]
    pub effective_date: NaiveDate,
    pub kind: AdjustmentKind,
    #[schema(value_type = String, example = "150.00")]
    pub amount: Decimal,
    pub description: Option<String>,
}

impl TryFrom<PayAdjustmentRow> for PayAdjustment {
    type Error = EngineError;

    fn try_from(row: PayAdjustmentRow) -> Result<Self, Self::Error> {
        Ok(PayAdjustment {
            id: row.id,
            employee_id: row.employee_id,
            effective_date: row.effective_date,
            kind: enum_col("kind", &row.kind)?,
            amount: dec_col("amount", &row.amount)?,
            description: row.description,
        })
    }
}
