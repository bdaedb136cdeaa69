use actix_web::{HttpResponse, http::StatusCode};
use rust_decimal::Decimal;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid state transition: {entity} in state {from} does not permit {action}")]
    InvalidStateTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    #[error("Already clocked in today")]
    AlreadyClockedIn,

    #[error("No open attendance record to clock out of")]
    NoOpenRecord,

    #[error("Insufficient leave balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },

    #[error("A calculation is already in flight for this payroll run")]
    AlreadyCalculating,

    #[error("Reference data missing: {0}")]
    ReferenceDataMissing(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl actix_web::ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::InvalidStateTransition { .. }
            | EngineError::AlreadyCalculating
            | EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::AlreadyClockedIn
            | EngineError::NoOpenRecord
            | EngineError::InsufficientBalance { .. }
            | EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::ReferenceDataMissing(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Internal(_) | EngineError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let EngineError::Database(e) = self {
            tracing::error!(error = %e, "database error");
            // detail stays in the log
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Internal Server Error"
            }));
        }
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "message": self.to_string()
        }))
    }
}

/// Column-level parse failures surface as internal errors, not user errors.
pub fn corrupt(column: &str, value: &str) -> EngineError {
    EngineError::Internal(format!("unreadable {column} value `{value}`"))
}
