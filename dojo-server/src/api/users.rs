use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use dojo_types::{
    Belt, LogStatus, Role, SetRoleRequest, SetStatusRequest, UpdateProfileRequest, User, UserStatus,
};

use super::graduations::check_degree;
use super::{conflict_or_internal, parse_id, ApiError, ApiResult};
use crate::audit;
use crate::db::repositories::{GraduationRepository, ProfileUpdate, UserRepository};
use crate::middleware::RequestUserContext;
use crate::photo::{self, MAX_PHOTO_BYTES};
use crate::state::AppState;
use crate::validation::{format_whatsapp, is_valid_email, non_blank};

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

fn load_user(state: &AppState, user_id: &Uuid) -> ApiResult<User> {
    UserRepository::new(state.db.pool.clone())
        .get_by_id(user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// GET /profile - The effective user's profile
pub async fn get_profile(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<User>> {
    let user = ctx.require_user()?;
    Ok(Json(load_user(&state, &user.id)?))
}

/// PUT /profile - Update the effective user's profile
///
/// The birthday can only be filled in once. For students a belt or degree
/// updates the latest graduation, creating a first one when none exists.
pub async fn update_profile(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    let user = ctx.require_user()?;

    let first_name = non_blank(&payload.first_name)
        .ok_or_else(|| ApiError::BadRequest("First name is required.".to_string()))?;
    let last_name = non_blank(&payload.last_name)
        .ok_or_else(|| ApiError::BadRequest("Last name is required.".to_string()))?;
    let email = payload.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::BadRequest("Enter a valid email address.".to_string()));
    }
    for value in [payload.height_cm, payload.weight_kg].into_iter().flatten() {
        if value <= 0 {
            return Err(ApiError::BadRequest("Height and weight must be positive.".to_string()));
        }
    }

    let repo = UserRepository::new(state.db.pool.clone());
    if repo.email_in_use(&email, Some(&user.id))? {
        return Err(ApiError::Conflict("This email is already registered.".to_string()));
    }

    let whatsapp = non_blank(&payload.whatsapp).map(format_whatsapp);
    let update = ProfileUpdate {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email,
        whatsapp,
        birthday: user.birthday.or(payload.birthday),
        height_cm: payload.height_cm,
        weight_kg: payload.weight_kg,
        kimono_size: payload.kimono_size,
        belt_size: payload.belt_size,
    };

    if user.is_student() && (payload.belt.is_some() || payload.degree.is_some()) {
        update_rank(&state, &user.id, payload.belt, payload.degree)?;
    }

    repo.update_profile(&user.id, &update)
        .map_err(|e| conflict_or_internal(e, "This email is already registered."))?;

    Ok(Json(load_user(&state, &user.id)?))
}

fn update_rank(state: &AppState, student_id: &Uuid, belt: Option<Belt>, degree: Option<i32>) -> ApiResult<()> {
    if let Some(degree) = degree {
        check_degree(degree)?;
    }

    let repo = GraduationRepository::new(state.db.pool.clone());
    let conflict = "This belt and degree is already recorded.";
    match repo.current(student_id)? {
        Some(current) => {
            let belt = belt.unwrap_or(current.belt);
            let degree = degree.unwrap_or(current.degree);
            if belt != current.belt || degree != current.degree {
                repo.update_rank(&current.id, belt, degree)
                    .map_err(|e| conflict_or_internal(e, conflict))?;
            }
        }
        None => {
            repo.create(
                student_id,
                belt.unwrap_or(Belt::White),
                degree.unwrap_or(0),
                Utc::now().date_naive(),
            )
            .map_err(|e| conflict_or_internal(e, conflict))?;
        }
    }
    Ok(())
}

/// POST /profile/photo - Upload a new profile photo (multipart field `photo`)
pub async fn upload_photo(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<User>> {
    let user = ctx.require_user()?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("photo") {
            upload = Some(field.bytes().await.map_err(multipart_error)?);
            break;
        }
    }
    let bytes = upload.ok_or_else(|| ApiError::BadRequest("Missing photo field".to_string()))?;
    if bytes.len() > MAX_PHOTO_BYTES {
        return Err(ApiError::PayloadTooLarge("Photo must be at most 5 MB.".to_string()));
    }

    let png = photo::process(&bytes).map_err(|e| ApiError::BadRequest(format!("{:#}", e)))?;
    let media_dir = state.media_dir();
    let relative = photo::store(&media_dir, &user.id, &png, Utc::now().timestamp())?;

    UserRepository::new(state.db.pool.clone()).set_photo(&user.id, &relative)?;
    photo::remove_old(&media_dir, &user.photo);

    Ok(Json(load_user(&state, &user.id)?))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Photo must be at most 5 MB.".to_string())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// GET /users - List users (staff)
pub async fn list_users(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Json<Vec<User>>> {
    ctx.require_staff()?;
    let users = UserRepository::new(state.db.pool.clone())
        .list(query.role, query.status)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(Json(users))
}

/// GET /users/:id - A single user (staff, or the user themself)
pub async fn get_user(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<User>> {
    let current = ctx.require_user()?;
    let user_id = parse_id(&user_id, "user")?;
    if !current.is_staff() && current.id != user_id {
        return Err(ApiError::Forbidden("Staff only".to_string()));
    }
    Ok(Json(load_user(&state, &user_id)?))
}

/// PUT /users/:id/status - Approve, deactivate or reactivate an account (staff)
pub async fn set_status(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<SetStatusRequest>,
) -> ApiResult<Json<User>> {
    let staff = ctx.require_staff()?;
    let user_id = parse_id(&user_id, "user")?;
    change_status(&state, staff, &user_id, payload.status)
}

/// DELETE /users/:id - Soft delete (the account becomes inactive)
pub async fn deactivate_user(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<User>> {
    let staff = ctx.require_staff()?;
    let user_id = parse_id(&user_id, "user")?;
    change_status(&state, staff, &user_id, UserStatus::Inactive)
}

fn change_status(state: &AppState, staff: &User, user_id: &Uuid, status: UserStatus) -> ApiResult<Json<User>> {
    if staff.id == *user_id && status != UserStatus::Active {
        return Err(ApiError::BadRequest("You cannot deactivate your own account.".to_string()));
    }
    let target = load_user(state, user_id)?;
    if target.role == Role::Admin && staff.role != Role::Admin {
        return Err(ApiError::Forbidden("Administrators only".to_string()));
    }

    UserRepository::new(state.db.pool.clone()).set_status(user_id, status)?;
    if status != UserStatus::Active {
        state.session_manager.delete_user_sessions(user_id)?;
    }

    audit::record_system(
        &state.db,
        &format!(
            "Status of {} changed from {} to {} by {}",
            target.email,
            target.status.as_str(),
            status.as_str(),
            staff.email
        ),
        LogStatus::Success,
    );

    Ok(Json(load_user(state, user_id)?))
}

/// PUT /users/:id/role - Change a user's role (admin)
pub async fn set_role(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<SetRoleRequest>,
) -> ApiResult<Json<User>> {
    let admin = ctx.require_admin()?;
    let user_id = parse_id(&user_id, "user")?;
    if admin.id == user_id && payload.role != Role::Admin {
        return Err(ApiError::BadRequest("You cannot demote your own account.".to_string()));
    }

    let updated = UserRepository::new(state.db.pool.clone()).set_role(&user_id, payload.role)?;
    if !updated {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    Ok(Json(load_user(&state, &user_id)?))
}
