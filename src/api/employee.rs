use actix_web::{HttpResponse, Responder, web};
use sqlx::SqlitePool;

use crate::auth::actor::Actor;
use crate::service::employee::{self, RegisterEmployee};

/// Register Employee (reference data the pipeline reads)
#[utoipa::path(
    post,
    path = "/api/v1/employees",
    request_body = RegisterEmployee,
    responses(
        (status = 200, description = "Employee registered", body = crate::model::employee::Employee),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee"
)]
pub async fn register(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    payload: web::Json<RegisterEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr()?;
    let employee = employee::register(pool.get_ref(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(employee))
}

#[utoipa::path(
    get,
    path = "/api/v1/employees/{id}",
    params(("id" = i64, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Employee found", body = crate::model::employee::Employee),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee"
)]
pub async fn get_employee(
    auth: Actor,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    if Some(id) != auth.employee_id {
        auth.require_manager()?;
    }
    let employee = employee::get_employee(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

#[utoipa::path(
    get,
    path = "/api/v1/employees",
    responses((status = 200, description = "All employees", body = [crate::model::employee::Employee])),
    tag = "Employee"
)]
pub async fn list_employees(
    auth: Actor,
    pool: web::Data<SqlitePool>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;
    let employees = employee::list_employees(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(employees))
}
