use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::actor::Actor;
use crate::config::Config;
use crate::service::timesheet;

#[derive(Deserialize, ToSchema)]
pub struct GeneratePeriod {
    #[schema(value_type = String, format = "date")]
    pub period_start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub period_end: NaiveDate,
    /// Restrict generation to these employees; omit for everyone.
    pub employee_ids: Option<Vec<i64>>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct TimesheetQuery {
    pub employee_id: Option<i64>,
}

/// Aggregate approved attendance into timesheets. Safe to re-run: snapshots
/// for the same (employee, period) are replaced, not merged.
#[utoipa::path(
    post,
    path = "/api/v1/timesheets/generate",
    request_body = GeneratePeriod,
    responses(
        (status = 200, description = "Generated timesheets", body = [crate::model::timesheet::Timesheet]),
        (status = 400, description = "Bad period"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Timesheet"
)]
pub async fn generate(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
    payload: web::Json<GeneratePeriod>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let payload = payload.into_inner();
    let timesheets = timesheet::generate(
        pool.get_ref(),
        payload.period_start,
        payload.period_end,
        payload.employee_ids.as_deref(),
        config.include_leave_in_timesheets,
    )
    .await?;
    Ok(HttpResponse::Ok().json(timesheets))
}

#[utoipa::path(
    get,
    path = "/api/v1/timesheets",
    params(TimesheetQuery),
    responses(
        (status = 200, description = "Timesheets, newest period first", body = [crate::model::timesheet::Timesheet])
    ),
    tag = "Timesheet"
)]
pub async fn list(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    query: web::Query<TimesheetQuery>,
) -> actix_web::Result<impl Responder> {
    if query.employee_id != auth.employee_id {
        auth.require_manager()?;
    }
    let timesheets = timesheet::list_timesheets(pool.get_ref(), query.employee_id).await?;
    Ok(HttpResponse::Ok().json(timesheets))
}
