use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use dojo_types::{
    Ranking, RankingKind, RankingPositionRequest, RankingRequest, ReviewStatus, Role, UserStatus,
};

use super::{conflict_or_internal, parse_id, ApiError, ApiResult};
use crate::db::repositories::{AttendanceRepository, ClassRepository, RankingRepository, UserRepository};
use crate::db::Database;
use crate::middleware::RequestUserContext;
use crate::state::AppState;
use crate::stats;
use crate::validation::non_blank;

fn load_ranking(repo: &RankingRepository, ranking_id: &Uuid) -> ApiResult<Ranking> {
    repo.get_by_id(ranking_id)?
        .ok_or_else(|| ApiError::NotFound("Ranking not found".to_string()))
}

/// Positions for a fewest-absences ranking: approved attendance days in
/// the ranking window, scoped to the class roster when a class is set.
pub(crate) fn attendance_positions(db: &Database, ranking: &Ranking) -> anyhow::Result<Vec<(Uuid, i32, f64)>> {
    let students: Vec<(Uuid, String)> = match ranking.class_id {
        Some(class_id) => ClassRepository::new(db.pool.clone())
            .enrollments_for_class(&class_id)?
            .into_iter()
            .filter(|e| e.status == ReviewStatus::Approved)
            .map(|e| (e.student_id, e.student_name))
            .collect(),
        None => UserRepository::new(db.pool.clone())
            .list(Some(Role::Student), Some(UserStatus::Active))?
            .into_iter()
            .map(|u| (u.id, u.full_name()))
            .collect(),
    };

    let counts: HashMap<Uuid, i64> = AttendanceRepository::new(db.pool.clone())
        .approved_counts(ranking.start_date, ranking.end_date, ranking.class_id.as_ref())?
        .into_iter()
        .collect();

    let entries = students
        .into_iter()
        .map(|(id, name)| {
            let score = counts.get(&id).copied().unwrap_or(0);
            (id, name, score)
        })
        .collect();
    Ok(stats::dense_rank(entries))
}

/// Every listed id must belong to a student account
fn check_students(db: &Database, payload: &[RankingPositionRequest]) -> ApiResult<()> {
    let users = UserRepository::new(db.pool.clone());
    for entry in payload {
        let is_student = users
            .get_by_id(&entry.student_id)?
            .is_some_and(|u| u.role == Role::Student);
        if !is_student {
            return Err(ApiError::BadRequest(format!(
                "Student {} not found.",
                entry.student_id
            )));
        }
    }
    Ok(())
}

/// GET /rankings - List rankings (students only see active ones)
pub async fn list_rankings(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Ranking>>> {
    let user = ctx.require_user()?;
    let rankings = RankingRepository::new(state.db.pool.clone()).list(!user.is_staff())?;
    Ok(Json(rankings))
}

/// GET /rankings/:id - A ranking with its positions
pub async fn get_ranking(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(ranking_id): Path<String>,
) -> ApiResult<Json<Ranking>> {
    let user = ctx.require_user()?;
    let ranking_id = parse_id(&ranking_id, "ranking")?;
    let ranking = load_ranking(&RankingRepository::new(state.db.pool.clone()), &ranking_id)?;
    if !ranking.active && !user.is_staff() {
        return Err(ApiError::NotFound("Ranking not found".to_string()));
    }
    Ok(Json(ranking))
}

/// POST /rankings - Create a ranking (staff)
pub async fn create_ranking(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Json(payload): Json<RankingRequest>,
) -> ApiResult<(StatusCode, Json<Ranking>)> {
    ctx.require_staff()?;
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

    let ranking = RankingRepository::new(state.db.pool.clone()).create(&payload)?;
    Ok((StatusCode::CREATED, Json(ranking)))
}

/// DELETE /rankings/:id - Delete a ranking (staff)
pub async fn delete_ranking(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(ranking_id): Path<String>,
) -> ApiResult<StatusCode> {
    ctx.require_staff()?;
    let ranking_id = parse_id(&ranking_id, "ranking")?;
    if !RankingRepository::new(state.db.pool.clone()).delete(&ranking_id)? {
        return Err(ApiError::NotFound("Ranking not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /rankings/:id/positions - Replace positions manually (staff)
pub async fn set_positions(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(ranking_id): Path<String>,
    Json(payload): Json<Vec<RankingPositionRequest>>,
) -> ApiResult<Json<Ranking>> {
    ctx.require_staff()?;
    let ranking_id = parse_id(&ranking_id, "ranking")?;
    let repo = RankingRepository::new(state.db.pool.clone());
    load_ranking(&repo, &ranking_id)?;

    if payload.iter().any(|p| p.position < 1) {
        return Err(ApiError::BadRequest("Positions start at 1.".to_string()));
    }
    check_students(&state.db, &payload)?;
    let positions: Vec<(Uuid, i32, f64)> = payload
        .iter()
        .map(|p| (p.student_id, p.position, p.score))
        .collect();
    repo.replace_positions(&ranking_id, &positions)
        .map_err(|e| conflict_or_internal(e, "A student can only appear once in a ranking."))?;

    Ok(Json(load_ranking(&repo, &ranking_id)?))
}

/// POST /rankings/:id/recompute - Derive positions from approved attendance
pub async fn recompute_ranking(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(ranking_id): Path<String>,
) -> ApiResult<Json<Ranking>> {
    ctx.require_staff()?;
    let ranking_id = parse_id(&ranking_id, "ranking")?;
    let repo = RankingRepository::new(state.db.pool.clone());
    let ranking = load_ranking(&repo, &ranking_id)?;

    if ranking.kind != RankingKind::FewestAbsences {
        return Err(ApiError::BadRequest(
            "Only attendance rankings can be recomputed.".to_string(),
        ));
    }

    let positions = attendance_positions(&state.db, &ranking)?;
    repo.replace_positions(&ranking_id, &positions)?;
    tracing::info!("Recomputed ranking {} ({} students)", ranking_id, positions.len());

    Ok(Json(load_ranking(&repo, &ranking_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_class, seed_named_user, test_db};
    use chrono::NaiveDate;
    use dojo_types::{AttendanceStatus, ClassType};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_attendance_positions_use_distinct_approved_days() {
        let db = test_db();
        let instructor = seed_named_user(&db, "sensei@x.io", "Carla", "Lima", Role::Instructor);
        let ana = seed_named_user(&db, "ana@x.io", "Ana", "Souza", Role::Student);
        let bia = seed_named_user(&db, "bia@x.io", "Bia", "Reis", Role::Student);
        let caio = seed_named_user(&db, "caio@x.io", "Caio", "Melo", Role::Student);
        let class = seed_class(&db, "Adults", instructor);

        let attendance = AttendanceRepository::new(db.pool.clone());
        let approve = |student: &Uuid, date: NaiveDate, class_type: ClassType| {
            let request = attendance
                .create(student, &class, date, class_type, "training")
                .unwrap()
                .unwrap();
            attendance
                .process(&request.id, AttendanceStatus::Approved, "", &instructor)
                .unwrap();
        };
        approve(&ana, day(3), ClassType::Gi);
        approve(&ana, day(3), ClassType::NoGi);
        approve(&bia, day(4), ClassType::Gi);
        approve(&caio, day(5), ClassType::Gi);
        approve(&caio, day(6), ClassType::Gi);

        let ranking = RankingRepository::new(db.pool.clone())
            .create(&RankingRequest {
                title: "March".to_string(),
                kind: RankingKind::FewestAbsences,
                class_id: None,
                start_date: day(1),
                end_date: Some(day(31)),
                active: true,
            })
            .unwrap();

        let positions = attendance_positions(&db, &ranking).unwrap();
        assert_eq!(
            positions,
            vec![(caio, 1, 2.0), (ana, 2, 1.0), (bia, 2, 1.0)]
        );
    }

    #[test]
    fn test_class_ranking_only_counts_the_approved_roster() {
        let db = test_db();
        let instructor = seed_named_user(&db, "sensei@x.io", "Carla", "Lima", Role::Instructor);
        let ana = seed_named_user(&db, "ana@x.io", "Ana", "Souza", Role::Student);
        let bia = seed_named_user(&db, "bia@x.io", "Bia", "Reis", Role::Student);
        let caio = seed_named_user(&db, "caio@x.io", "Caio", "Melo", Role::Student);
        let adults = seed_class(&db, "Adults", instructor);
        let kids = seed_class(&db, "Kids", instructor);

        let classes = ClassRepository::new(db.pool.clone());
        for student in [&ana, &bia] {
            let enrollment = classes.request_enrollment(&adults, student).unwrap();
            classes.decide_enrollment(&enrollment.id, ReviewStatus::Approved).unwrap();
        }
        // Caio is still waiting for approval
        classes.request_enrollment(&adults, &caio).unwrap();

        let attendance = AttendanceRepository::new(db.pool.clone());
        let approve = |student: &Uuid, class: &Uuid, date: NaiveDate| {
            let request = attendance
                .create(student, class, date, ClassType::Gi, "training")
                .unwrap()
                .unwrap();
            attendance
                .process(&request.id, AttendanceStatus::Approved, "", &instructor)
                .unwrap();
        };
        approve(&ana, &adults, day(3));
        approve(&caio, &adults, day(3));
        approve(&caio, &adults, day(5));
        // Other classes do not count towards this ranking
        approve(&bia, &kids, day(4));
        approve(&bia, &kids, day(6));

        let ranking = RankingRepository::new(db.pool.clone())
            .create(&RankingRequest {
                title: "Adults March".to_string(),
                kind: RankingKind::FewestAbsences,
                class_id: Some(adults),
                start_date: day(1),
                end_date: Some(day(31)),
                active: true,
            })
            .unwrap();

        let positions = attendance_positions(&db, &ranking).unwrap();
        assert_eq!(positions, vec![(ana, 1, 1.0), (bia, 2, 0.0)]);
    }

    #[test]
    fn test_positions_must_name_students() {
        let db = test_db();
        let instructor = seed_named_user(&db, "sensei@x.io", "Carla", "Lima", Role::Instructor);
        let ana = seed_named_user(&db, "ana@x.io", "Ana", "Souza", Role::Student);
        let entry = |student_id| RankingPositionRequest {
            student_id,
            position: 1,
            score: 0.0,
        };

        assert!(check_students(&db, &[entry(ana)]).is_ok());
        assert!(matches!(
            check_students(&db, &[entry(instructor)]),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            check_students(&db, &[entry(Uuid::new_v4())]),
            Err(ApiError::BadRequest(_))
        ));
    }
}
