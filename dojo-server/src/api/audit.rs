use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use dojo_types::{AuditLog, LogStatus};

use super::{ApiError, ApiResult};
use crate::db::repositories::AuditLogRepository;
use crate::middleware::RequestUserContext;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub user_id: Option<Uuid>,
    pub status: Option<LogStatus>,
    pub limit: Option<i64>,
}

/// GET /audit-logs - Newest entries first (admin, read-only)
pub async fn list_audit_logs(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditLog>>> {
    ctx.require_admin()?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let logs = AuditLogRepository::new(state.db.pool.clone())
        .list(query.user_id.as_ref(), query.status, limit)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(Json(logs))
}
