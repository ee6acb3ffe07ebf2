pub mod account;
pub mod attendance;
pub mod audit;
pub mod classes;
pub mod dashboard;
pub mod error;
pub mod goals;
pub mod graduations;
pub mod inventory;
pub mod lesson_plans;
pub mod rankings;
pub mod reports;
pub mod users;

pub use error::{ApiError, ApiResult};

use uuid::Uuid;

use crate::db::{is_foreign_key_violation, is_unique_violation};

/// Parse a path segment as an id
pub(crate) fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {} ID", what)))
}

/// Map a repository error, turning UNIQUE violations into 409s
pub(crate) fn conflict_or_internal(err: anyhow::Error, conflict_msg: &str) -> ApiError {
    if is_unique_violation(&err) {
        ApiError::Conflict(conflict_msg.to_string())
    } else {
        ApiError::InternalError(format!("{:#}", err))
    }
}

/// Map a delete error, turning "still referenced" failures into 409s
pub(crate) fn in_use_or_internal(err: anyhow::Error, in_use_msg: &str) -> ApiError {
    if is_foreign_key_violation(&err) {
        ApiError::Conflict(in_use_msg.to_string())
    } else {
        ApiError::InternalError(format!("{:#}", err))
    }
}
