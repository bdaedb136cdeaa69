use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::actor::Actor;
use crate::config::Config;
use crate::service::payroll::{self, CreateAdjustment, CreateRun};
use crate::service::policy::PolicyHandle;

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AdjustmentQuery {
    pub employee_id: Option<i64>,
}

/* =========================
Run lifecycle
========================= */

#[utoipa::path(
    post,
    path = "/api/v1/payroll/runs",
    request_body = CreateRun,
    responses(
        (status = 200, description = "Run created in DRAFT", body = crate::model::payroll::PayrollRun),
        (status = 403, description = "Forbidden")
    ),
    tag = "Payroll"
)]
pub async fn create_run(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    payload: web::Json<CreateRun>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let run = payroll::create_run(pool.get_ref(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(run))
}

/// All-or-nothing: one record per employee with an overlapping timesheet, or
/// the run returns to DRAFT with no records at all.
#[utoipa::path(
    post,
    path = "/api/v1/payroll/runs/{run_id}/calculate",
    params(("run_id" = i64, Path, description = "Payroll run id")),
    responses(
        (status = 200, description = "Run calculated", body = crate::model::payroll::PayrollRun),
        (status = 409, description = "Run is not DRAFT, or a calculation is in flight"),
        (status = 422, description = "Reference data missing; run released to DRAFT")
    ),
    tag = "Payroll"
)]
pub async fn calculate(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
    policy: web::Data<PolicyHandle>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let run = payroll::calculate(
        pool.get_ref(),
        path.into_inner(),
        policy.0.as_ref(),
        config.working_days_per_week,
    )
    .await?;
    Ok(HttpResponse::Ok().json(run))
}

#[utoipa::path(
    put,
    path = "/api/v1/payroll/runs/{run_id}/approve",
    params(("run_id" = i64, Path, description = "Payroll run id")),
    responses(
        (status = 200, description = "Run approved", body = crate::model::payroll::PayrollRun),
        (status = 409, description = "Run is not CALCULATED")
    ),
    tag = "Payroll"
)]
pub async fn approve(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let run = payroll::approve_run(pool.get_ref(), path.into_inner(), auth.actor_id).await?;
    Ok(HttpResponse::Ok().json(run))
}

#[utoipa::path(
    put,
    path = "/api/v1/payroll/runs/{run_id}/process",
    params(("run_id" = i64, Path, description = "Payroll run id")),
    responses(
        (status = 200, description = "Run posted; records now immutable", body = crate::model::payroll::PayrollRun),
        (status = 409, description = "Run is not APPROVED")
    ),
    tag = "Payroll"
)]
pub async fn process(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let run = payroll::process_run(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(run))
}

/* =========================
Queries
========================= */

#[utoipa::path(
    get,
    path = "/api/v1/payroll/runs",
    responses((status = 200, description = "Runs, newest first", body = [crate::model::payroll::PayrollRun])),
    tag = "Payroll"
)]
pub async fn list_runs(
    auth: Actor,
    pool: web::Data<SqlitePool>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let runs = payroll::list_runs(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(runs))
}

#[utoipa::path(
    get,
    path = "/api/v1/payroll/runs/{run_id}",
    params(("run_id" = i64, Path, description = "Payroll run id")),
    responses(
        (status = 200, description = "Run detail with totals", body = crate::model::payroll::PayrollRun),
        (status = 404, description = "Run not found")
    ),
    tag = "Payroll"
)]
pub async fn get_run(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let run = payroll::get_run(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(run))
}

#[utoipa::path(
    get,
    path = "/api/v1/payroll/runs/{run_id}/records",
    params(("run_id" = i64, Path, description = "Payroll run id")),
    responses(
        (status = 200, description = "One record per employee", body = [crate::model::payroll::PayrollRecord])
    ),
    tag = "Payroll"
)]
pub async fn run_records(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let records = payroll::records_for_run(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(records))
}

/* =========================
Adjustments
========================= */

#[utoipa::path(
    post,
    path = "/api/v1/payroll/adjustments",
    request_body = CreateAdjustment,
    responses((status = 200, description = "Adjustment recorded", body = crate::model::payroll::PayAdjustment)),
    tag = "Payroll"
)]
pub async fn add_adjustment(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    payload: web::Json<CreateAdjustment>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let adjustment = payroll::add_adjustment(pool.get_ref(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(adjustment))
}

#[utoipa::path(
    get,
    path = "/api/v1/payroll/adjustments",
    params(AdjustmentQuery),
    responses((status = 200, description = "Adjustments, newest first", body = [crate::model::payroll::PayAdjustment])),
    tag = "Payroll"
)]
pub async fn list_adjustments(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    query: web::Query<AdjustmentQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let adjustments = payroll::list_adjustments(pool.get_ref(), query.employee_id).await?;
    Ok(HttpResponse::Ok().json(adjustments))
}
