use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use wfm::model::attendance::AttendanceRule;
use wfm::model::employee::{PayBasis, PayFrequency};
use wfm::service::attendance::{self, CreateRule};

/// Fresh in-memory database with the full schema applied. One connection so
/// every query sees the same memory store.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    pool
}

// The attendance-rule cache is process-global and keyed by employee id, so
// every test gets ids no other test will ever use.
static NEXT_ID: AtomicI64 = AtomicI64::new(1000);

pub fn unique_id() -> i64 {
    NEXT_ID.fetch_add(1, Ordering::SeqCst)
}

pub fn standard_rule(is_default: bool) -> CreateRule {
    CreateRule {
        name: format!("standard-{}", unique_id()),
        start_time: "09:00:00".parse().unwrap(),
        end_time: "18:00:00".parse().unwrap(),
        regular_hours_per_day: Decimal::from(8),
        grace_minutes_in: 10,
        grace_minutes_out: 0,
        break_duration_minutes: 60,
        auto_deduct_break: true,
        overtime_enabled: true,
        overtime_multiplier: "1.5".parse().unwrap(),
        max_overtime_hours_daily: Decimal::from(4),
        half_day_threshold_hours: Decimal::from(4),
        is_default,
    }
}

pub async fn seed_default_rule(pool: &SqlitePool) -> AttendanceRule {
    attendance::create_rule(pool, standard_rule(true))
        .await
        .expect("seed rule")
}

pub async fn seed_employee(
    pool: &SqlitePool,
    pay_basis: PayBasis,
    hourly_rate: Option<Decimal>,
    annual_salary: Option<Decimal>,
) -> i64 {
    let id = unique_id();
    sqlx::query(
        r#"
        INSERT INTO employees
            (id, employee_code, first_name, last_name, email, active, pay_basis,
             hourly_rate, annual_salary, pay_frequency, created_at)
        VALUES (?, ?, 'Test', 'Employee', ?, 1, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(format!("EMP-{id}"))
    .bind(format!("emp{id}@company.com"))
    .bind(pay_basis.to_string())
    .bind(hourly_rate.map(|r| r.to_string()))
    .bind(annual_salary.map(|s| s.to_string()))
    .bind(PayFrequency::Biweekly.to_string())
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("seed employee");
    id
}

pub async fn seed_leave_type(pool: &SqlitePool) -> i64 {
    let name = format!("annual-{}", unique_id());
    wfm::service::leave::create_leave_type(pool, &name, wfm::model::leave::LeaveUnit::Days, false)
        .await
        .expect("seed leave type")
        .id
}
