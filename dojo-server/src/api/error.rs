use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dojo_types::ErrorResponse;

use crate::error::DomainError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    PayloadTooLarge(String),
    TooManyRequests(String),
    InternalError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, details) = match self {
            ApiError::NotFound(msg) => ("Not Found", Some(msg)),
            ApiError::BadRequest(msg) => ("Bad Request", Some(msg)),
            ApiError::Unauthorized(msg) => ("Unauthorized", Some(msg)),
            ApiError::Forbidden(msg) => ("Forbidden", Some(msg)),
            ApiError::Conflict(msg) => ("Conflict", Some(msg)),
            ApiError::PayloadTooLarge(msg) => ("Payload Too Large", Some(msg)),
            ApiError::TooManyRequests(msg) => ("Too Many Requests", Some(msg)),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    "Internal Server Error",
                    Some("An unexpected error occurred".to_string()),
                )
            }
        };

        let error_response = ErrorResponse {
            error: message.to_string(),
            details,
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ApiError::BadRequest(msg),
            e @ DomainError::NotFound(_) => ApiError::NotFound(e.to_string()),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::Forbidden(msg) => ApiError::Forbidden(msg),
            e @ DomainError::InsufficientStock { .. } => ApiError::BadRequest(e.to_string()),
            e @ DomainError::InvalidTransition { .. } => ApiError::Conflict(e.to_string()),
            DomainError::Internal(e) => ApiError::InternalError(format!("{:#}", e)),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(format!("{:#}", err))
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_statuses() {
        let cases = [
            (DomainError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (DomainError::NotFound("Order"), StatusCode::NOT_FOUND),
            (DomainError::Conflict("dup".into()), StatusCode::CONFLICT),
            (DomainError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (
                DomainError::InsufficientStock { requested: 3, available: 1 },
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::InvalidTransition { from: "A".into(), to: "B".into() },
                StatusCode::CONFLICT,
            ),
        ];
        for (domain, status) in cases {
            assert_eq!(ApiError::from(domain).status(), status);
        }
    }

    #[test]
    fn test_not_found_message() {
        match ApiError::from(DomainError::NotFound("Order")) {
            ApiError::NotFound(msg) => assert_eq!(msg, "Order not found"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
