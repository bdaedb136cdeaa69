use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::actor::Actor;
use crate::model::attendance::{ApprovalStatus, AttendanceRecord, CaptureMethod};
use crate::service::attendance::{self, CreateRule, ManualEntry, RecordFilter};

#[derive(Deserialize, ToSchema)]
pub struct ClockIn {
    /// Defaults to WEB when omitted.
    pub capture_method: Option<CaptureMethod>,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectBody {
    pub remarks: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct BulkApproveBody {
    #[schema(example = json!([1, 2, 3]))]
    pub ids: Vec<i64>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AttendanceQuery {
    /// Filter by employee ID
    pub employee_id: Option<i64>,
    #[param(value_type = Option<String>)]
    #[schema(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>)]
    #[schema(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    pub approval_status: Option<ApprovalStatus>,
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceRecord>,
    pub page: u64,
    pub per_page: u64,
    pub total: i64,
}

/* =========================
Clock events
========================= */

/// Swagger doc for clock_in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-in",
    request_body = ClockIn,
    responses(
        (status = 200, description = "Clocked in", body = AttendanceRecord),
        (status = 400, description = "Already clocked in today"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Attendance"
)]
pub async fn clock_in(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    payload: web::Json<ClockIn>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee_id()?;
    let method = payload.capture_method.unwrap_or(CaptureMethod::Web);
    let record = attendance::clock_in(pool.get_ref(), employee_id, method).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Swagger doc for clock_out endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-out",
    responses(
        (status = 200, description = "Clocked out; hours computed", body = AttendanceRecord),
        (status = 400, description = "No open attendance record"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Attendance"
)]
pub async fn clock_out(
    auth: Actor,
    pool: web::Data<SqlitePool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee_id()?;
    let record = attendance::clock_out(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Administrative insert/override bypassing clock events.
#[utoipa::path(
    post,
    path = "/api/v1/attendance/manual",
    request_body = ManualEntry,
    responses(
        (status = 200, description = "Record written", body = AttendanceRecord),
        (status = 400, description = "Bad entry"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Attendance"
)]
pub async fn manual_entry(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    payload: web::Json<ManualEntry>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let record = attendance::manual_entry(pool.get_ref(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

/* =========================
Approval gate
========================= */

#[utoipa::path(
    put,
    path = "/api/v1/attendance/{record_id}/approve",
    params(("record_id" = i64, Path, description = "Attendance record to approve")),
    responses(
        (status = 200, description = "Approved", body = AttendanceRecord),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Record is not pending")
    ),
    tag = "Attendance"
)]
pub async fn approve(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;
    let record = attendance::approve(pool.get_ref(), path.into_inner(), auth.actor_id).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    put,
    path = "/api/v1/attendance/{record_id}/reject",
    params(("record_id" = i64, Path, description = "Attendance record to reject")),
    request_body = RejectBody,
    responses(
        (status = 200, description = "Rejected", body = AttendanceRecord),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Record is not pending")
    ),
    tag = "Attendance"
)]
pub async fn reject(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<RejectBody>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;
    let record = attendance::reject(
        pool.get_ref(),
        path.into_inner(),
        auth.actor_id,
        payload.into_inner().remarks,
    )
    .await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Each id is approved independently; the result is a tally, not a
/// transaction.
#[utoipa::path(
    put,
    path = "/api/v1/attendance/bulk-approve",
    request_body = BulkApproveBody,
    responses(
        (status = 200, description = "Tally of approved/skipped records", body = Object,
         example = json!({ "approved": 5, "skipped": 1 }))
    ),
    tag = "Attendance"
)]
pub async fn bulk_approve(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    payload: web::Json<BulkApproveBody>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;
    let outcome =
        attendance::bulk_approve(pool.get_ref(), &payload.ids, auth.actor_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/* =========================
Queries
========================= */

#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Paginated attendance records", body = AttendanceListResponse)
    ),
    tag = "Attendance"
)]
pub async fn list(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    query: web::Query<AttendanceQuery>,
) -> actix_web::Result<impl Responder> {
    // employees may read their own ledger; anything wider needs manager
    let query = query.into_inner();
    if query.employee_id != auth.employee_id {
        auth.require_manager()?;
    }

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let (records, total) = attendance::list_records(
        pool.get_ref(),
        RecordFilter {
            employee_id: query.employee_id,
            from: query.from,
            to: query.to,
            approval_status: query.approval_status,
            page: Some(page),
            per_page: Some(per_page),
        },
    )
    .await?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data: records,
        page,
        per_page,
        total,
    }))
}

/* =========================
Rules
========================= */

#[utoipa::path(
    post,
    path = "/api/v1/attendance/rules",
    request_body = CreateRule,
    responses(
        (status = 200, description = "Rule created", body = crate::model::attendance::AttendanceRule),
        (status = 403, description = "Forbidden")
    ),
    tag = "Attendance"
)]
pub async fn create_rule(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    payload: web::Json<CreateRule>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let rule = attendance::create_rule(pool.get_ref(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(rule))
}

#[utoipa::path(
    get,
    path = "/api/v1/attendance/rules",
    responses(
        (status = 200, description = "All attendance rules", body = [crate::model::attendance::AttendanceRule])
    ),
    tag = "Attendance"
)]
pub async fn list_rules(
    auth: Actor,
    pool: web::Data<SqlitePool>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;
    let rules = attendance::list_rules(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(rules))
}
