use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use dojo_types::{
    AttendanceRequest, AttendanceStatus, AttendanceSummary, CreateAttendanceRequest,
    CreateAttendanceResponse, Decision, DecisionRequest, User,
};

use super::{parse_id, ApiError, ApiResult};
use crate::db::repositories::{AttendanceFilter, AttendanceRepository, ClassRepository};
use crate::middleware::RequestUserContext;
use crate::state::AppState;
use crate::stats;
use crate::validation::non_blank;

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    /// Staff may ask for any student; students always get their own
    pub student_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// The student a staff member or student is allowed to look at
pub(crate) fn target_student(user: &User, requested: Option<Uuid>) -> ApiResult<Uuid> {
    match requested {
        Some(student_id) if student_id != user.id => {
            if user.is_staff() {
                Ok(student_id)
            } else {
                Err(ApiError::Forbidden("You can only view your own attendance.".to_string()))
            }
        }
        _ => Ok(user.id),
    }
}

/// POST /attendance - Request attendance for one or more dates (student)
///
/// Dates that already have a request for the same class and class type are
/// skipped and reported back instead of failing the whole batch.
pub async fn request_attendance(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Json(payload): Json<CreateAttendanceRequest>,
) -> ApiResult<(StatusCode, Json<CreateAttendanceResponse>)> {
    let student = ctx.require_student()?;

    let reason = non_blank(&payload.reason)
        .ok_or_else(|| ApiError::BadRequest("A reason is required.".to_string()))?;
    if payload.dates.is_empty() {
        return Err(ApiError::BadRequest("Select at least one date.".to_string()));
    }

    let class = ClassRepository::new(state.db.pool.clone())
        .get_by_id(&payload.class_id)?
        .ok_or_else(|| ApiError::NotFound("Class not found".to_string()))?;
    if !class.active {
        return Err(ApiError::BadRequest("This class is not active.".to_string()));
    }

    let mut dates = payload.dates.clone();
    dates.sort();
    dates.dedup();

    let repo = AttendanceRepository::new(state.db.pool.clone());
    let mut created = Vec::new();
    let mut skipped = Vec::new();
    for date in dates {
        match repo.create(&student.id, &class.id, date, payload.class_type, reason)? {
            Some(request) => created.push(request),
            None => skipped.push(date),
        }
    }

    tracing::info!(
        "Student {} requested attendance for {} date(s), {} skipped",
        student.id,
        created.len(),
        skipped.len()
    );
    Ok((StatusCode::CREATED, Json(CreateAttendanceResponse { created, skipped })))
}

/// GET /attendance/mine - Own requests, newest date first
///
/// Viewing the list marks approved requests as notified.
pub async fn my_attendance(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<AttendanceRequest>>> {
    let user = ctx.require_user()?;
    let repo = AttendanceRepository::new(state.db.pool.clone());

    let requests = repo.list(&AttendanceFilter {
        student_id: Some(user.id),
        ..Default::default()
    })?;
    repo.mark_notified(&user.id)?;

    Ok(Json(requests))
}

/// POST /attendance/:id/cancel - Cancel an own pending request
pub async fn cancel_attendance(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> ApiResult<Json<AttendanceRequest>> {
    let user = ctx.require_user()?;
    let request_id = parse_id(&request_id, "attendance request")?;
    let repo = AttendanceRepository::new(state.db.pool.clone());

    let request = repo
        .get_by_id(&request_id)?
        .filter(|r| r.student_id == user.id)
        .ok_or_else(|| ApiError::NotFound("Attendance request not found".to_string()))?;
    if request.status != AttendanceStatus::Pending || !repo.cancel(&request_id, &user.id)? {
        return Err(ApiError::Conflict("Only pending requests can be cancelled.".to_string()));
    }

    let request = repo
        .get_by_id(&request_id)?
        .ok_or_else(|| ApiError::NotFound("Attendance request not found".to_string()))?;
    Ok(Json(request))
}

/// GET /attendance/pending - Requests waiting for a decision (staff)
pub async fn pending_attendance(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<AttendanceRequest>>> {
    ctx.require_staff()?;
    let requests = AttendanceRepository::new(state.db.pool.clone()).list(&AttendanceFilter {
        status: Some(AttendanceStatus::Pending),
        ..Default::default()
    })?;
    Ok(Json(requests))
}

/// GET /attendance/processed - Requests the current staff member decided
pub async fn processed_attendance(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<AttendanceRequest>>> {
    let staff = ctx.require_staff()?;
    let requests = AttendanceRepository::new(state.db.pool.clone()).list(&AttendanceFilter {
        processed_by: Some(staff.id),
        ..Default::default()
    })?;
    Ok(Json(requests))
}

/// POST /attendance/:id/decision - Approve or reject a pending request (staff)
pub async fn process_attendance(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(payload): Json<DecisionRequest>,
) -> ApiResult<Json<AttendanceRequest>> {
    let staff = ctx.require_staff()?;
    let request_id = parse_id(&request_id, "attendance request")?;

    let reason = payload.reason.as_deref().and_then(non_blank).unwrap_or("");
    if payload.decision == Decision::Reject && reason.is_empty() {
        return Err(ApiError::BadRequest("A rejection reason is required.".to_string()));
    }

    let repo = AttendanceRepository::new(state.db.pool.clone());
    repo.get_by_id(&request_id)?
        .ok_or_else(|| ApiError::NotFound("Attendance request not found".to_string()))?;
    if !repo.process(&request_id, payload.decision.attendance_status(), reason, &staff.id)? {
        return Err(ApiError::Conflict("This request was already processed.".to_string()));
    }

    let request = repo
        .get_by_id(&request_id)?
        .ok_or_else(|| ApiError::NotFound("Attendance request not found".to_string()))?;
    Ok(Json(request))
}

/// GET /attendance/summary - Weekday by class-type counts for a student
pub async fn attendance_summary(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<AttendanceSummary>> {
    let user = ctx.require_user()?;
    let student_id = target_student(user, query.student_id)?;

    let requests = AttendanceRepository::new(state.db.pool.clone()).list(&AttendanceFilter {
        student_id: Some(student_id),
        from: query.from,
        to: query.to,
        ..Default::default()
    })?;
    Ok(Json(stats::attendance_summary(&requests, query.from, query.to)))
}
