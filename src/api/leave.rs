use actix_web::{HttpResponse, Responder, web};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::actor::Actor;
use crate::model::leave::{LeaveRequest, LeaveStatus, LeaveUnit};
use crate::service::leave::{self, CreateLeave};

#[derive(Deserialize, ToSchema)]
pub struct DecisionBody {
    pub remarks: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by employee ID
    pub employee_id: Option<i64>,
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    /// Pagination per page number
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    pub page: u64,
    pub per_page: u64,
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateLeaveType {
    #[schema(example = "annual")]
    pub name: String,
    pub unit: LeaveUnit,
    pub allows_hourly: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct SeedBalance {
    pub employee_id: i64,
    pub leave_type_id: i64,
    #[schema(example = 2026)]
    pub year: i64,
    #[schema(value_type = String, example = "20")]
    pub opening_balance: Decimal,
    #[schema(value_type = String, example = "0")]
    pub credited: Decimal,
    #[schema(value_type = String, example = "2")]
    pub carry_forward: Decimal,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct BalanceQuery {
    pub employee_id: i64,
    #[schema(example = 2026)]
    pub year: i64,
}

/* =========================
Create leave request
========================= */
/// Swagger doc for create_leave endpoint
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Leave request submitted", body = LeaveRequest),
        (status = 400, description = "Insufficient balance or bad range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee_id()?;
    let request = leave::create_request(pool.get_ref(), employee_id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Two-level decisions
========================= */

#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/manager-approve",
    params(("leave_id" = i64, Path, description = "Leave request id")),
    request_body = DecisionBody,
    responses(
        (status = 200, description = "Moved to PENDING_HR", body = LeaveRequest),
        (status = 409, description = "Not pending at manager level")
    ),
    tag = "Leave"
)]
pub async fn manager_approve(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<DecisionBody>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;
    let request = leave::manager_approve(
        pool.get_ref(),
        path.into_inner(),
        auth.actor_id,
        payload.into_inner().remarks,
    )
    .await?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/manager-reject",
    params(("leave_id" = i64, Path, description = "Leave request id")),
    request_body = DecisionBody,
    responses(
        (status = 200, description = "Rejected; reservation released", body = LeaveRequest),
        (status = 409, description = "Not pending at manager level")
    ),
    tag = "Leave"
)]
pub async fn manager_reject(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<DecisionBody>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;
    let request = leave::manager_reject(
        pool.get_ref(),
        path.into_inner(),
        auth.actor_id,
        payload.into_inner().remarks,
    )
    .await?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/hr-approve",
    params(("leave_id" = i64, Path, description = "Leave request id")),
    request_body = DecisionBody,
    responses(
        (status = 200, description = "Approved; pending converted to used", body = LeaveRequest),
        (status = 409, description = "Not pending at HR level")
    ),
    tag = "Leave"
)]
pub async fn hr_approve(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<DecisionBody>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let request = leave::hr_approve(
        pool.get_ref(),
        path.into_inner(),
        auth.actor_id,
        payload.into_inner().remarks,
    )
    .await?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/hr-reject",
    params(("leave_id" = i64, Path, description = "Leave request id")),
    request_body = DecisionBody,
    responses(
        (status = 200, description = "Rejected; reservation released", body = LeaveRequest),
        (status = 409, description = "Not pending at HR level")
    ),
    tag = "Leave"
)]
pub async fn hr_reject(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<DecisionBody>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let request = leave::hr_reject(
        pool.get_ref(),
        path.into_inner(),
        auth.actor_id,
        payload.into_inner().remarks,
    )
    .await?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/cancel",
    params(("leave_id" = i64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Cancelled; reservation released", body = LeaveRequest),
        (status = 409, description = "Request is in a terminal state")
    ),
    tag = "Leave"
)]
pub async fn cancel(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee_id()?;
    let request = leave::cancel_request(pool.get_ref(), path.into_inner(), employee_id).await?;
    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Queries
========================= */

#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}",
    params(("leave_id" = i64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 404, description = "Leave request not found")
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let request = leave::get_request(pool.get_ref(), path.into_inner()).await?;
    if Some(request.employee_id) != auth.employee_id {
        auth.require_manager()?;
    }
    Ok(HttpResponse::Ok().json(request))
}

/// The append-only audit timeline for one request.
#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}/activity",
    params(("leave_id" = i64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Activity log, oldest first", body = [crate::model::leave::LeaveActivity])
    ),
    tag = "Leave"
)]
pub async fn activity(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let request_id = path.into_inner();
    let request = leave::get_request(pool.get_ref(), request_id).await?;
    if Some(request.employee_id) != auth.employee_id {
        auth.require_manager()?;
    }
    let entries = leave::get_activity(pool.get_ref(), request_id).await?;
    Ok(HttpResponse::Ok().json(entries))
}

#[utoipa::path(
    get,
    path = "/api/v1/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse)
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    let query = query.into_inner();
    if query.employee_id != auth.employee_id {
        auth.require_manager()?;
    }

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let (requests, total) = leave::list_requests(
        pool.get_ref(),
        query.employee_id,
        query.status,
        Some(page),
        Some(per_page),
    )
    .await?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: requests,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/balances",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Balances for the employee and year", body = [crate::model::leave::LeaveBalance])
    ),
    tag = "Leave"
)]
pub async fn balances(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    query: web::Query<BalanceQuery>,
) -> actix_web::Result<impl Responder> {
    if Some(query.employee_id) != auth.employee_id {
        auth.require_manager()?;
    }
    let balances = leave::get_balances(pool.get_ref(), query.employee_id, query.year).await?;
    Ok(HttpResponse::Ok().json(balances))
}

/* =========================
Reference data (HR)
========================= */

#[utoipa::path(
    post,
    path = "/api/v1/leave/types",
    request_body = CreateLeaveType,
    responses((status = 200, description = "Leave type created", body = crate::model::leave::LeaveTypeRecord)),
    tag = "Leave"
)]
pub async fn create_type(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    payload: web::Json<CreateLeaveType>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let payload = payload.into_inner();
    let leave_type = leave::create_leave_type(
        pool.get_ref(),
        &payload.name,
        payload.unit,
        payload.allows_hourly,
    )
    .await?;
    Ok(HttpResponse::Ok().json(leave_type))
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/types",
    responses((status = 200, description = "Leave type catalogue", body = [crate::model::leave::LeaveTypeRecord])),
    tag = "Leave"
)]
pub async fn list_types(
    _auth: Actor,
    pool: web::Data<SqlitePool>,
) -> actix_web::Result<impl Responder> {
    let types = leave::list_leave_types(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(types))
}

#[utoipa::path(
    post,
    path = "/api/v1/leave/balances",
    request_body = SeedBalance,
    responses((status = 200, description = "Balance row established", body = crate::model::leave::LeaveBalance)),
    tag = "Leave"
)]
pub async fn seed_balance(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    payload: web::Json<SeedBalance>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let payload = payload.into_inner();
    let balance = leave::seed_balance(
        pool.get_ref(),
        payload.employee_id,
        payload.leave_type_id,
        payload.year,
        payload.opening_balance,
        payload.credited,
        payload.carry_forward,
    )
    .await?;
    Ok(HttpResponse::Ok().json(balance))
}
