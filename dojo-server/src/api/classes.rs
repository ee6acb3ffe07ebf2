use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use dojo_types::{ClassRequest, DecisionRequest, Enrollment, ReviewStatus, TrainingClass};

use super::{conflict_or_internal, parse_id, ApiError, ApiResult};
use crate::db::repositories::{ClassRepository, UserRepository};
use crate::middleware::RequestUserContext;
use crate::state::AppState;
use crate::validation::non_blank;

#[derive(Debug, Deserialize)]
pub struct EnrollmentQuery {
    pub status: Option<ReviewStatus>,
}

fn load_class(repo: &ClassRepository, class_id: &Uuid) -> ApiResult<TrainingClass> {
    repo.get_by_id(class_id)?
        .ok_or_else(|| ApiError::NotFound("Class not found".to_string()))
}

/// Resolve and check the instructor a class is assigned to
fn instructor_for(state: &AppState, payload: &ClassRequest, fallback: Uuid) -> ApiResult<Uuid> {
    if non_blank(&payload.name).is_none() {
        return Err(ApiError::BadRequest("Class name is required.".to_string()));
    }
    let Some(instructor_id) = payload.instructor_id else {
        return Ok(fallback);
    };
    let instructor = UserRepository::new(state.db.pool.clone())
        .get_by_id(&instructor_id)?
        .ok_or_else(|| ApiError::BadRequest("Instructor not found.".to_string()))?;
    if !instructor.is_staff() {
        return Err(ApiError::BadRequest("Classes can only be assigned to staff.".to_string()));
    }
    Ok(instructor_id)
}

/// GET /classes - List classes (students only see active ones)
pub async fn list_classes(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TrainingClass>>> {
    let user = ctx.require_user()?;
    let classes = ClassRepository::new(state.db.pool.clone())
        .list(!user.is_staff())
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(Json(classes))
}

/// GET /classes/:id - Get a single class
pub async fn get_class(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> ApiResult<Json<TrainingClass>> {
    let user = ctx.require_user()?;
    let class_id = parse_id(&class_id, "class")?;
    let class = load_class(&ClassRepository::new(state.db.pool.clone()), &class_id)?;
    if !class.active && !user.is_staff() {
        return Err(ApiError::NotFound("Class not found".to_string()));
    }
    Ok(Json(class))
}

/// POST /classes - Create a class (staff)
pub async fn create_class(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Json(payload): Json<ClassRequest>,
) -> ApiResult<(StatusCode, Json<TrainingClass>)> {
    let staff = ctx.require_staff()?;
    let instructor_id = instructor_for(&state, &payload, staff.id)?;
    let class = ClassRepository::new(state.db.pool.clone()).create(&payload, instructor_id)?;
    tracing::info!("Class '{}' created by {}", class.name, staff.id);
    Ok((StatusCode::CREATED, Json(class)))
}

/// PUT /classes/:id - Update a class (staff)
pub async fn update_class(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(class_id): Path<String>,
    Json(payload): Json<ClassRequest>,
) -> ApiResult<Json<TrainingClass>> {
    let staff = ctx.require_staff()?;
    let class_id = parse_id(&class_id, "class")?;
    let repo = ClassRepository::new(state.db.pool.clone());
    let existing = load_class(&repo, &class_id)?;

    let instructor_id = instructor_for(&state, &payload, existing.instructor_id.unwrap_or(staff.id))?;
    repo.update(&class_id, &payload, instructor_id)?;
    Ok(Json(load_class(&repo, &class_id)?))
}

/// DELETE /classes/:id - Delete a class (staff)
pub async fn delete_class(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> ApiResult<StatusCode> {
    ctx.require_staff()?;
    let class_id = parse_id(&class_id, "class")?;
    let deleted = ClassRepository::new(state.db.pool.clone())
        .delete(&class_id)
        .map_err(|e| conflict_or_internal(e, "Class is still referenced"))?;
    if !deleted {
        return Err(ApiError::NotFound("Class not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /classes/:id/enroll - Ask to join a class (student)
pub async fn request_enrollment(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> ApiResult<(StatusCode, Json<Enrollment>)> {
    let student = ctx.require_student()?;
    let class_id = parse_id(&class_id, "class")?;
    let repo = ClassRepository::new(state.db.pool.clone());

    let class = load_class(&repo, &class_id)?;
    if !class.active {
        return Err(ApiError::BadRequest("This class is not accepting enrollments.".to_string()));
    }

    let enrollment = repo
        .request_enrollment(&class_id, &student.id)
        .map_err(|e| conflict_or_internal(e, "You already requested enrollment in this class."))?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// GET /enrollments/mine - The student's own enrollments
pub async fn my_enrollments(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Enrollment>>> {
    let user = ctx.require_user()?;
    let enrollments = ClassRepository::new(state.db.pool.clone()).enrollments_for_student(&user.id)?;
    Ok(Json(enrollments))
}

/// GET /classes/:id/enrollments - Class roster (staff)
pub async fn class_enrollments(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> ApiResult<Json<Vec<Enrollment>>> {
    ctx.require_staff()?;
    let class_id = parse_id(&class_id, "class")?;
    let repo = ClassRepository::new(state.db.pool.clone());
    load_class(&repo, &class_id)?;
    Ok(Json(repo.enrollments_for_class(&class_id)?))
}

/// GET /enrollments?status= - Enrollments by status, pending by default (staff)
pub async fn list_enrollments(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Query(query): Query<EnrollmentQuery>,
) -> ApiResult<Json<Vec<Enrollment>>> {
    ctx.require_staff()?;
    let status = query.status.unwrap_or(ReviewStatus::Pending);
    let enrollments = ClassRepository::new(state.db.pool.clone()).enrollments_with_status(status)?;
    Ok(Json(enrollments))
}

/// POST /enrollments/:id/decision - Approve or reject an enrollment (staff)
pub async fn decide_enrollment(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(enrollment_id): Path<String>,
    Json(payload): Json<DecisionRequest>,
) -> ApiResult<Json<Enrollment>> {
    let staff = ctx.require_staff()?;
    let enrollment_id = parse_id(&enrollment_id, "enrollment")?;
    let repo = ClassRepository::new(state.db.pool.clone());

    repo.get_enrollment(&enrollment_id)?
        .ok_or_else(|| ApiError::NotFound("Enrollment not found".to_string()))?;
    if !repo.decide_enrollment(&enrollment_id, payload.decision.review_status())? {
        return Err(ApiError::Conflict("This enrollment was already processed.".to_string()));
    }
    tracing::info!("Enrollment {} decided by {}: {:?}", enrollment_id, staff.id, payload.decision);

    let enrollment = repo
        .get_enrollment(&enrollment_id)?
        .ok_or_else(|| ApiError::NotFound("Enrollment not found".to_string()))?;
    Ok(Json(enrollment))
}
