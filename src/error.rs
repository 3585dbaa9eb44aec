use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    ValidationErrors(#[from] validator::ValidationErrors),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("insufficient stock for {name}: {available} available, {requested} requested")]
    InsufficientStock {
        name: String,
        available: i64,
        requested: i64,
    },

    #[error("{0}")]
    InvalidCoupon(&'static str),

    #[error("minimum purchase of {minimum:.2} not met")]
    MinimumPurchaseNotMet { minimum: f64 },

    #[error("cannot transition order from {from} to {to}")]
    InvalidStatusTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::ValidationErrors(_)
            | ApiError::InsufficientStock { .. }
            | ApiError::InvalidCoupon(_)
            | ApiError::MinimumPurchaseNotMet { .. }
            | ApiError::InvalidStatusTransition { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // Do not leak driver internals to clients.
            ApiError::Database(err) => {
                tracing::error!("database error: {}", err);
                "database error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorBody { message })
    }
}

// The driver reports a unique-index violation as write error code 11000.
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_err)) => write_err.code == 11000,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rule_errors_map_to_bad_request() {
        assert_eq!(
            ApiError::InsufficientStock {
                name: "Widget".to_string(),
                available: 1,
                requested: 3,
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidCoupon("coupon is not valid").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::MinimumPurchaseNotMet { minimum: 50.0 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidStatusTransition {
                from: "delivered",
                to: "cancelled",
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn lookup_and_auth_errors_map_to_their_statuses() {
        assert_eq!(ApiError::NotFound("product").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Unauthorized("missing token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Conflict("duplicate".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Internal("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
