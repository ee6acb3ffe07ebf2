use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use dojo_types::{Goal, GoalReport, GoalRequest, Role, UserStatus};

use super::{parse_id, ApiError, ApiResult};
use crate::db::repositories::{AttendanceRepository, GoalRepository, UserRepository};
use crate::db::Database;
use crate::middleware::RequestUserContext;
use crate::state::AppState;
use crate::stats;
use crate::validation::non_blank;

fn validate_goal(payload: &GoalRequest) -> ApiResult<()> {
    if non_blank(&payload.title).is_none() {
        return Err(ApiError::BadRequest("Title is required.".to_string()));
    }
    if payload.end_date < payload.start_date {
        return Err(ApiError::BadRequest("End date cannot be before the start date.".to_string()));
    }
    if payload.target_classes < 1 {
        return Err(ApiError::BadRequest("Target must be at least one class.".to_string()));
    }
    if payload.minimum_classes < 0 || payload.minimum_classes > payload.target_classes {
        return Err(ApiError::BadRequest(
            "Minimum classes must be between 0 and the target.".to_string(),
        ));
    }
    if !(0..=100).contains(&payload.minimum_frequency_pct) {
        return Err(ApiError::BadRequest(
            "Minimum frequency must be between 0 and 100.".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn load_goal(db: &Database, goal_id: &Uuid) -> ApiResult<Goal> {
    GoalRepository::new(db.pool.clone())
        .get_by_id(goal_id)?
        .ok_or_else(|| ApiError::NotFound("Goal not found".to_string()))
}

/// Progress of every active student towards `goal`
pub(crate) fn progress(db: &Database, goal: Goal) -> anyhow::Result<GoalReport> {
    let students = UserRepository::new(db.pool.clone()).list(Some(Role::Student), Some(UserStatus::Active))?;
    let attended: HashMap<Uuid, i64> = AttendanceRepository::new(db.pool.clone())
        .approved_counts(goal.start_date, Some(goal.end_date), None)?
        .into_iter()
        .collect();
    Ok(stats::goal_report(goal, &students, &attended))
}

/// GET /goals - List goals, newest start first (staff)
pub async fn list_goals(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Goal>>> {
    ctx.require_staff()?;
    let goals = GoalRepository::new(state.db.pool.clone())
        .list()
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(Json(goals))
}

/// GET /goals/:id
pub async fn get_goal(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(goal_id): Path<String>,
) -> ApiResult<Json<Goal>> {
    ctx.require_staff()?;
    let goal_id = parse_id(&goal_id, "goal")?;
    Ok(Json(load_goal(&state.db, &goal_id)?))
}

/// POST /goals - Create a goal (staff)
pub async fn create_goal(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Json(payload): Json<GoalRequest>,
) -> ApiResult<(StatusCode, Json<Goal>)> {
    let staff = ctx.require_staff()?;
    validate_goal(&payload)?;
    let goal = GoalRepository::new(state.db.pool.clone()).create(&payload, &staff.id)?;
    Ok((StatusCode::CREATED, Json(goal)))
}

/// PUT /goals/:id - Update a goal (staff)
pub async fn update_goal(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(goal_id): Path<String>,
    Json(payload): Json<GoalRequest>,
) -> ApiResult<Json<Goal>> {
    ctx.require_staff()?;
    let goal_id = parse_id(&goal_id, "goal")?;
    validate_goal(&payload)?;
    if !GoalRepository::new(state.db.pool.clone()).update(&goal_id, &payload)? {
        return Err(ApiError::NotFound("Goal not found".to_string()));
    }
    Ok(Json(load_goal(&state.db, &goal_id)?))
}

/// DELETE /goals/:id - Delete a goal (staff)
pub async fn delete_goal(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(goal_id): Path<String>,
) -> ApiResult<StatusCode> {
    ctx.require_staff()?;
    let goal_id = parse_id(&goal_id, "goal")?;
    if !GoalRepository::new(state.db.pool.clone()).delete(&goal_id)? {
        return Err(ApiError::NotFound("Goal not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /goals/:id/progress - Per-student progress (staff)
pub async fn goal_progress(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(goal_id): Path<String>,
) -> ApiResult<Json<GoalReport>> {
    ctx.require_staff()?;
    let goal_id = parse_id(&goal_id, "goal")?;
    let goal = load_goal(&state.db, &goal_id)?;
    Ok(Json(progress(&state.db, goal)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_class, seed_named_user, test_db};
    use chrono::NaiveDate;
    use dojo_types::{AttendanceStatus, ClassType, GoalStatus};

    fn request() -> GoalRequest {
        GoalRequest {
            title: "Spring".to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(),
            target_classes: 24,
            minimum_classes: 12,
            minimum_frequency_pct: 50,
        }
    }

    #[test]
    fn test_goal_validation() {
        assert!(validate_goal(&request()).is_ok());

        let mut bad = request();
        bad.end_date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert!(validate_goal(&bad).is_err());

        let mut bad = request();
        bad.minimum_classes = 30;
        assert!(validate_goal(&bad).is_err());

        let mut bad = request();
        bad.minimum_frequency_pct = 101;
        assert!(validate_goal(&bad).is_err());
    }

    #[test]
    fn test_progress_counts_approved_days_inside_the_window() {
        let db = test_db();
        let instructor = seed_named_user(&db, "sensei@x.io", "Carla", "Lima", Role::Instructor);
        let ana = seed_named_user(&db, "ana@x.io", "Ana", "Souza", Role::Student);
        let bia = seed_named_user(&db, "bia@x.io", "Bia", "Reis", Role::Student);
        let caio = seed_named_user(&db, "caio@x.io", "Caio", "Melo", Role::Student);
        let class = seed_class(&db, "Adults", instructor);

        let attendance = AttendanceRepository::new(db.pool.clone());
        let record = |student: &Uuid, (m, d): (u32, u32), class_type: ClassType, status: AttendanceStatus| {
            let date = NaiveDate::from_ymd_opt(2025, m, d).unwrap();
            let request = attendance
                .create(student, &class, date, class_type, "training")
                .unwrap()
                .unwrap();
            if status != AttendanceStatus::Pending {
                attendance.process(&request.id, status, "", &instructor).unwrap();
            }
        };
        for day in [3, 5, 7, 10] {
            record(&ana, (3, day), ClassType::Gi, AttendanceStatus::Approved);
        }
        record(&bia, (3, 3), ClassType::Gi, AttendanceStatus::Approved);
        record(&bia, (3, 3), ClassType::NoGi, AttendanceStatus::Approved);
        record(&bia, (3, 4), ClassType::Gi, AttendanceStatus::Approved);
        record(&bia, (3, 6), ClassType::Gi, AttendanceStatus::Pending);
        record(&caio, (3, 12), ClassType::Gi, AttendanceStatus::Approved);
        record(&caio, (2, 20), ClassType::Gi, AttendanceStatus::Approved);
        record(&caio, (3, 14), ClassType::Gi, AttendanceStatus::Rejected);

        let goal = GoalRepository::new(db.pool.clone())
            .create(
                &GoalRequest {
                    title: "Q1/2025".to_string(),
                    start_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                    end_date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
                    target_classes: 4,
                    minimum_classes: 2,
                    minimum_frequency_pct: 50,
                },
                &instructor,
            )
            .unwrap();

        let report = progress(&db, goal).unwrap();
        assert_eq!(report.students.len(), 3);
        let of = |id: Uuid| {
            let p = report.students.iter().find(|p| p.student_id == id).unwrap();
            (p.attended, p.frequency_pct, p.status)
        };
        assert_eq!(of(ana), (4, 100, GoalStatus::GoalReached));
        assert_eq!(of(bia), (2, 50, GoalStatus::OnTrack));
        assert_eq!(of(caio), (1, 25, GoalStatus::BelowMinimum));
    }
}
