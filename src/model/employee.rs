use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::EngineError;
use crate::utils::db_utils::{enum_col, opt_dec_col};

/// Explicit classification; the payroll engine never infers it from which
/// rate field happens to be populated.
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
pub enum PayBasis {
    Hourly,
    Salaried,
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
pub enum PayFrequency {
    Weekly,
    Biweekly,
    Semimonthly,
    Monthly,
}

impl PayFrequency {
    pub fn periods_per_year(&self) -> Decimal {
        match self {
            PayFrequency::Weekly => dec!(52),
            PayFrequency::Biweekly => dec!(26),
            PayFrequency::Semimonthly => dec!(24),
            PayFrequency::Monthly => dec!(12),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct EmployeeRow {
    pub id: i64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub active: bool,
    pub department_id: Option<i64>,
    pub pay_basis: String,
    pub hourly_rate: Option<String>,
    pub annual_salary: Option<String>,
    pub pay_frequency: String,
    pub attendance_rule_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    #[schema(example = "john.doe@company.com")]
    pub email: String,
    pub active: bool,
    pub department_id: Option<i64>,
    pub pay_basis: PayBasis,
    #[schema(value_type = Option<String>, example = "25.00")]
    pub hourly_rate: Option<Decimal>,
    #[schema(value_type = Option<String>, example = "65000.00")]
    pub annual_salary: Option<Decimal>,
    pub pay_frequency: PayFrequency,
    pub attendance_rule_id: Option<i64>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = EngineError;

    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        Ok(Employee {
            id: row.id,
            employee_code: row.employee_code,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            active: row.active,
            department_id: row.department_id,
            pay_basis: enum_col("pay_basis", &row.pay_basis)?,
            hourly_rate: opt_dec_col("hourly_rate", row.hourly_rate.as_deref())?,
            annual_salary: opt_dec_col("annual_salary", row.annual_salary.as_deref())?,
            pay_frequency: enum_col("pay_frequency", &row.pay_frequency)?,
            attendance_rule_id: row.attendance_rule_id,
            created_at: row.created_at,
        })
    }
}
