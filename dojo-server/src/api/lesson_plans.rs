use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use dojo_types::{LessonPlan, LessonPlanItem, LessonPlanItemRequest, LessonPlanRequest};

use super::{parse_id, ApiError, ApiResult};
use crate::db::repositories::{ClassRepository, LessonPlanRepository};
use crate::middleware::RequestUserContext;
use crate::state::AppState;
use crate::validation::non_blank;

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    pub class_id: Option<Uuid>,
}

fn validate_plan(state: &AppState, payload: &LessonPlanRequest) -> ApiResult<()> {
    if non_blank(&payload.title).is_none() {
        return Err(ApiError::BadRequest("Title is required.".to_string()));
    }
    if payload.end_date.is_some_and(|end| end < payload.start_date) {
        return Err(ApiError::BadRequest("End date cannot be before the start date.".to_string()));
    }
    if let Some(class_id) = payload.class_id {
        ClassRepository::new(state.db.pool.clone())
            .get_by_id(&class_id)?
            .ok_or_else(|| ApiError::BadRequest("Class not found.".to_string()))?;
    }
    Ok(())
}

fn validate_item(payload: &LessonPlanItemRequest) -> ApiResult<()> {
    if non_blank(&payload.topic).is_none() {
        return Err(ApiError::BadRequest("Topic is required.".to_string()));
    }
    if payload.position < 1 {
        return Err(ApiError::BadRequest("Position must be at least 1.".to_string()));
    }
    Ok(())
}

fn load_plan(repo: &LessonPlanRepository, plan_id: &Uuid) -> ApiResult<LessonPlan> {
    repo.get_by_id(plan_id)?
        .ok_or_else(|| ApiError::NotFound("Lesson plan not found".to_string()))
}

/// GET /lesson-plans?class_id= - List lesson plans
pub async fn list_plans(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Query(query): Query<PlanQuery>,
) -> ApiResult<Json<Vec<LessonPlan>>> {
    ctx.require_user()?;
    let plans = LessonPlanRepository::new(state.db.pool.clone()).list(query.class_id.as_ref())?;
    Ok(Json(plans))
}

/// GET /lesson-plans/:id - A plan with its items
pub async fn get_plan(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
) -> ApiResult<Json<LessonPlan>> {
    ctx.require_user()?;
    let plan_id = parse_id(&plan_id, "lesson plan")?;
    Ok(Json(load_plan(&LessonPlanRepository::new(state.db.pool.clone()), &plan_id)?))
}

/// POST /lesson-plans - Create a plan (staff)
pub async fn create_plan(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Json(payload): Json<LessonPlanRequest>,
) -> ApiResult<(StatusCode, Json<LessonPlan>)> {
    let staff = ctx.require_staff()?;
    validate_plan(&state, &payload)?;
    let plan = LessonPlanRepository::new(state.db.pool.clone()).create(&payload, &staff.id)?;
    Ok((StatusCode::CREATED, Json(plan)))
}

/// PUT /lesson-plans/:id - Update a plan (staff)
pub async fn update_plan(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
    Json(payload): Json<LessonPlanRequest>,
) -> ApiResult<Json<LessonPlan>> {
    ctx.require_staff()?;
    let plan_id = parse_id(&plan_id, "lesson plan")?;
    validate_plan(&state, &payload)?;

    let repo = LessonPlanRepository::new(state.db.pool.clone());
    if !repo.update(&plan_id, &payload)? {
        return Err(ApiError::NotFound("Lesson plan not found".to_string()));
    }
    Ok(Json(load_plan(&repo, &plan_id)?))
}

/// DELETE /lesson-plans/:id - Delete a plan and its items (staff)
pub async fn delete_plan(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
) -> ApiResult<StatusCode> {
    ctx.require_staff()?;
    let plan_id = parse_id(&plan_id, "lesson plan")?;
    if !LessonPlanRepository::new(state.db.pool.clone()).delete(&plan_id)? {
        return Err(ApiError::NotFound("Lesson plan not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /lesson-plans/:id/items - Add an item (staff)
pub async fn add_item(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
    Json(payload): Json<LessonPlanItemRequest>,
) -> ApiResult<(StatusCode, Json<LessonPlanItem>)> {
    ctx.require_staff()?;
    let plan_id = parse_id(&plan_id, "lesson plan")?;
    validate_item(&payload)?;

    let repo = LessonPlanRepository::new(state.db.pool.clone());
    load_plan(&repo, &plan_id)?;
    let item = repo.add_item(&plan_id, &payload)?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /lesson-plans/:id/items/:item_id - Update an item (staff)
pub async fn update_item(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path((plan_id, item_id)): Path<(String, String)>,
    Json(payload): Json<LessonPlanItemRequest>,
) -> ApiResult<Json<LessonPlan>> {
    ctx.require_staff()?;
    let plan_id = parse_id(&plan_id, "lesson plan")?;
    let item_id = parse_id(&item_id, "item")?;
    validate_item(&payload)?;

    let repo = LessonPlanRepository::new(state.db.pool.clone());
    if !repo.update_item(&plan_id, &item_id, &payload)? {
        return Err(ApiError::NotFound("Lesson plan item not found".to_string()));
    }
    Ok(Json(load_plan(&repo, &plan_id)?))
}

/// DELETE /lesson-plans/:id/items/:item_id - Remove an item (staff)
pub async fn delete_item(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path((plan_id, item_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    ctx.require_staff()?;
    let plan_id = parse_id(&plan_id, "lesson plan")?;
    let item_id = parse_id(&item_id, "item")?;
    if !LessonPlanRepository::new(state.db.pool.clone()).delete_item(&plan_id, &item_id)? {
        return Err(ApiError::NotFound("Lesson plan item not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
