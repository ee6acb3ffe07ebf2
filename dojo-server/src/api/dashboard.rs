use axum::{extract::State, Extension, Json};

use dojo_types::{
    AttendanceStatus, Dashboard, NotificationSummary, OrderStatus, ReviewStatus, Role, UserStatus,
};

use super::ApiResult;
use crate::db::repositories::{AttendanceRepository, ClassRepository, OrderRepository, UserRepository};
use crate::middleware::RequestUserContext;
use crate::notifications;
use crate::state::AppState;

/// GET /dashboard - Counters for the staff home page
pub async fn dashboard(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<Dashboard>> {
    ctx.require_staff()?;
    let pool = state.db.pool.clone();
    let users = UserRepository::new(pool.clone());

    Ok(Json(Dashboard {
        pending_attendance: AttendanceRepository::new(pool.clone()).count_with_status(AttendanceStatus::Pending)?,
        active_students: users.count(Some(Role::Student), Some(UserStatus::Active))?,
        pending_enrollments: ClassRepository::new(pool.clone()).count_enrollments(ReviewStatus::Pending)?,
        pending_orders: OrderRepository::new(pool).count_with_status(OrderStatus::Pending)?,
        pending_users: users.count(None, Some(UserStatus::Pending))?,
    }))
}

/// GET /notifications - Notifications for the effective user
pub async fn notifications(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<NotificationSummary>> {
    let user = ctx.require_user()?;
    Ok(Json(notifications::for_user(&state.db, user)?))
}
