use actix_web::{
    FromRequest, HttpRequest,
    dev::Payload,
    error::{ErrorForbidden, ErrorUnauthorized},
};
use futures::future::{Ready, ready};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Roles the engine distinguishes. Authentication itself happens upstream;
/// the gateway forwards the verified identity in trusted headers.
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
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    Manager,
    HrAdmin,
}

/// The already-authenticated caller, resolved from `x-actor-id`,
/// `x-actor-role` and (when the caller is linked to an employee record)
/// `x-employee-id`.
pub struct Actor {
    pub actor_id: i64,
    pub role: Role,
    pub employee_id: Option<i64>,
}

impl FromRequest for Actor {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::to_owned)
        };

        let actor_id = match header("x-actor-id").and_then(|v| v.parse::<i64>().ok()) {
            Some(id) => id,
            None => return ready(Err(ErrorUnauthorized("Missing or invalid x-actor-id"))),
        };

        let role = match header("x-actor-role").and_then(|v| v.parse::<Role>().ok()) {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Missing or invalid x-actor-role"))),
        };

        let employee_id = header("x-employee-id").and_then(|v| v.parse::<i64>().ok());

        ready(Ok(Actor {
            actor_id,
            role,
            employee_id,
        }))
    }
}

impl Actor {
    pub fn require_hr(&self) -> actix_web::Result<()> {
        if self.role == Role::HrAdmin {
            Ok(())
        } else {
            Err(ErrorForbidden("HR/payroll-admin only"))
        }
    }

    pub fn require_manager(&self) -> actix_web::Result<()> {
        if matches!(self.role, Role::Manager | Role::HrAdmin) {
            Ok(())
        } else {
            Err(ErrorForbidden("Manager only"))
        }
    }

    /// The employee record this caller acts as; clock and leave submissions
    /// require one.
    pub fn employee_id(&self) -> actix_web::Result<i64> {
        self.employee_id
            .ok_or_else(|| ErrorForbidden("No employee profile"))
    }
}
