use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use dojo_types::{
    Belt, DateChangeRequest, Decision, DecisionRequest, Graduation, GraduationDateChange,
    GraduationRequest, ReviewStatus, UserStatus,
};

use super::{conflict_or_internal, parse_id, ApiError, ApiResult};
use crate::db::repositories::{GraduationRepository, UserRepository};
use crate::middleware::RequestUserContext;
use crate::state::AppState;
use crate::validation::{non_blank, DATE_CHANGE_REASON_MAX};

const DUPLICATE_RANK: &str = "This belt and degree is already recorded for the student.";

#[derive(Debug, Deserialize)]
pub struct DateChangeQuery {
    pub status: Option<ReviewStatus>,
}

pub(crate) fn check_degree(degree: i32) -> ApiResult<()> {
    if !(0..=Belt::MAX_DEGREE).contains(&degree) {
        return Err(ApiError::BadRequest(format!(
            "Degree must be between 0 and {}.",
            Belt::MAX_DEGREE
        )));
    }
    Ok(())
}

/// POST /graduations - Award a graduation (staff) or record one's own (student)
pub async fn create_graduation(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Json(payload): Json<GraduationRequest>,
) -> ApiResult<(StatusCode, Json<Graduation>)> {
    let user = ctx.require_user()?;
    check_degree(payload.degree)?;

    let student_id = if user.is_staff() {
        let student_id = payload
            .student_id
            .ok_or_else(|| ApiError::BadRequest("student_id is required.".to_string()))?;
        let student = UserRepository::new(state.db.pool.clone())
            .get_by_id(&student_id)?
            .filter(|u| u.is_student() && u.status != UserStatus::Inactive)
            .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;
        student.id
    } else {
        user.id
    };

    let graduation = GraduationRepository::new(state.db.pool.clone())
        .create(&student_id, payload.belt, payload.degree, payload.graduation_date)
        .map_err(|e| conflict_or_internal(e, DUPLICATE_RANK))?;

    tracing::info!("Recorded {} for student {}", graduation.label(), student_id);
    Ok((StatusCode::CREATED, Json(graduation)))
}

/// GET /graduations/mine - Own history, newest first
///
/// Viewing the history marks the graduations as notified.
pub async fn my_graduations(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Graduation>>> {
    let user = ctx.require_user()?;
    let repo = GraduationRepository::new(state.db.pool.clone());
    let history = repo.history(&user.id)?;
    repo.mark_notified(&user.id)?;
    Ok(Json(history))
}

/// GET /students/:id/graduations - A student's history (staff)
pub async fn student_graduations(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<Json<Vec<Graduation>>> {
    ctx.require_staff()?;
    let student_id = parse_id(&student_id, "student")?;
    Ok(Json(GraduationRepository::new(state.db.pool.clone()).history(&student_id)?))
}

/// GET /students/:id/graduations/current - Most recent graduation
pub async fn current_graduation(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<Json<Graduation>> {
    let user = ctx.require_user()?;
    let student_id = parse_id(&student_id, "student")?;
    if !user.is_staff() && user.id != student_id {
        return Err(ApiError::Forbidden("Staff only".to_string()));
    }
    let graduation = GraduationRepository::new(state.db.pool.clone())
        .current(&student_id)?
        .ok_or_else(|| ApiError::NotFound("Graduation not found".to_string()))?;
    Ok(Json(graduation))
}

/// POST /graduations/:id/date-change - Ask staff to correct a graduation date
pub async fn request_date_change(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(graduation_id): Path<String>,
    Json(payload): Json<DateChangeRequest>,
) -> ApiResult<(StatusCode, Json<GraduationDateChange>)> {
    let user = ctx.require_student()?;
    let graduation_id = parse_id(&graduation_id, "graduation")?;

    let reason = non_blank(&payload.reason)
        .ok_or_else(|| ApiError::BadRequest("A reason is required.".to_string()))?;
    if reason.chars().count() > DATE_CHANGE_REASON_MAX {
        return Err(ApiError::BadRequest(format!(
            "The reason must have at most {} characters.",
            DATE_CHANGE_REASON_MAX
        )));
    }

    let repo = GraduationRepository::new(state.db.pool.clone());
    repo.get_by_id(&graduation_id)?
        .filter(|g| g.student_id == user.id)
        .ok_or_else(|| ApiError::NotFound("Graduation not found".to_string()))?;
    if repo.has_pending_date_change(&graduation_id)? {
        return Err(ApiError::Conflict(
            "There is already a pending date change for this graduation.".to_string(),
        ));
    }

    let change = repo.request_date_change(&graduation_id, payload.new_date, reason)?;
    Ok((StatusCode::CREATED, Json(change)))
}

/// GET /graduation-date-changes?status= - Date change requests (staff)
pub async fn list_date_changes(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Query(query): Query<DateChangeQuery>,
) -> ApiResult<Json<Vec<GraduationDateChange>>> {
    ctx.require_staff()?;
    let changes = GraduationRepository::new(state.db.pool.clone()).list_date_changes(query.status)?;
    Ok(Json(changes))
}

/// POST /graduation-date-changes/:id/decision - Approve or reject (staff)
///
/// Approval rewrites the graduation date.
pub async fn decide_date_change(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(change_id): Path<String>,
    Json(payload): Json<DecisionRequest>,
) -> ApiResult<Json<GraduationDateChange>> {
    let staff = ctx.require_staff()?;
    let change_id = parse_id(&change_id, "date change")?;

    let reason = payload.reason.as_deref().and_then(non_blank);
    if payload.decision == Decision::Reject && reason.is_none() {
        return Err(ApiError::BadRequest("A rejection reason is required.".to_string()));
    }

    let repo = GraduationRepository::new(state.db.pool.clone());
    repo.get_date_change(&change_id)?
        .ok_or_else(|| ApiError::NotFound("Date change not found".to_string()))?;
    let rejection_reason = reason.filter(|_| payload.decision == Decision::Reject);
    if !repo.decide_date_change(&change_id, payload.decision.review_status(), rejection_reason, &staff.id)? {
        return Err(ApiError::Conflict("This request was already processed.".to_string()));
    }

    let change = repo
        .get_date_change(&change_id)?
        .ok_or_else(|| ApiError::NotFound("Date change not found".to_string()))?;
    Ok(Json(change))
}
