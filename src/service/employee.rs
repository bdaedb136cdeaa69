use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::EngineError;
use crate::model::employee::{Employee, EmployeeRow, PayBasis, PayFrequency};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterEmployee {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    #[schema(example = "jane.doe@company.com")]
    pub email: String,
    pub department_id: Option<i64>,
    pub pay_basis: PayBasis,
    #[schema(value_type = Option<String>, example = "25.00")]
    pub hourly_rate: Option<Decimal>,
    #[schema(value_type = Option<String>, example = "65000.00")]
    pub annual_salary: Option<Decimal>,
    pub pay_frequency: PayFrequency,
    pub attendance_rule_id: Option<i64>,
}

pub async fn register(
    pool: &SqlitePool,
    input: RegisterEmployee,
) -> Result<Employee, EngineError> {
    let result = sqlx::query(
        r#"
        INSERT INTO employees
            (employee_code, first_name, last_name, email, active, department_id,
             pay_basis, hourly_rate, annual_salary, pay_frequency,
             attendance_rule_id, created_at)
        VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.employee_code)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.email)
    .bind(input.department_id)
    .bind(input.pay_basis.to_string())
    .bind(input.hourly_rate.map(|r| r.to_string()))
    .bind(input.annual_salary.map(|s| s.to_string()))
    .bind(input.pay_frequency.to_string())
    .bind(input.attendance_rule_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    get_employee(pool, result.last_insert_rowid()).await
}

pub async fn get_employee(pool: &SqlitePool, id: i64) -> Result<Employee, EngineError> {
    let row = sqlx::query_as::<_, EmployeeRow>("SELECT * FROM employees WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(EngineError::NotFound("employee"))?;
    row.try_into()
}

pub async fn list_employees(pool: &SqlitePool) -> Result<Vec<Employee>, EngineError> {
    let rows = sqlx::query_as::<_, EmployeeRow>("SELECT * FROM employees ORDER BY id")
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(Employee::try_from).collect()
}
