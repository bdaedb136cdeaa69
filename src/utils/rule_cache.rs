use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::SqlitePool;
use std::time::Duration;

use crate::error::EngineError;
use crate::model::attendance::{AttendanceRule, AttendanceRuleRow};

/// Resolved attendance rule per employee. Rules change rarely; clock-out and
/// payroll calculation hit this on every record.
static RULE_CACHE: Lazy<Cache<i64, AttendanceRule>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(3600))
        .build()
});

/// The applicable rule for an employee: their assigned rule, or the default.
pub async fn resolve_rule(
    pool: &SqlitePool,
    employee_id: i64,
) -> Result<AttendanceRule, EngineError> {
    if let Some(rule) = RULE_CACHE.get(&employee_id).await {
        return Ok(rule);
    }

    let assigned = sqlx::query_as::<_, AttendanceRuleRow>(
        r#"
        SELECT r.*
        FROM attendance_rules r
        JOIN employees e ON e.attendance_rule_id = r.id
        WHERE e.id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;

    let row = match assigned {
        Some(row) => row,
        None => sqlx::query_as::<_, AttendanceRuleRow>(
            "SELECT * FROM attendance_rules WHERE is_default = 1",
        )
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            EngineError::ReferenceDataMissing("no default attendance rule configured".into())
        })?,
    };

    let rule = AttendanceRule::try_from(row)?;
    RULE_CACHE.insert(employee_id, rule.clone()).await;
    Ok(rule)
}

/// Rule definitions changed; resolved entries are stale.
pub fn invalidate_rules() {
    RULE_CACHE.invalidate_all();
}

/// Pre-resolve rules for active employees so the first clock-outs of the day
/// don't all miss.
pub async fn warmup_rule_cache(pool: &SqlitePool) -> Result<()> {
    let mut stream =
        sqlx::query_as::<_, (i64,)>("SELECT id FROM employees WHERE active = 1").fetch(pool);

    let mut total_count = 0usize;
    while let Some(row) = stream.next().await {
        let (employee_id,) = row?;
        if resolve_rule(pool, employee_id).await.is_ok() {
            total_count += 1;
        }
    }

    tracing::info!(total_count, "Attendance rule cache warmup complete");
    Ok(())
}
