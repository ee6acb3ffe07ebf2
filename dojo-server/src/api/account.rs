use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Duration;
use serde::Serialize;

use dojo_types::{
    AccountOverview, LoginRequest, LoginResponse, PasswordResetConfirm, PasswordResetRequest,
    RegisterRequest, Role, User, UserStatus,
};

use super::{conflict_or_internal, parse_id, ApiError, ApiResult};
use crate::db::repositories::{NewUser, PasswordResetRepository, UserRepository};
use crate::middleware::RequestUserContext;
use crate::session::SessionIdentity;
use crate::password::{hash_password, verify_password, MIN_PASSWORD_LEN};
use crate::state::AppState;
use crate::validation::{format_whatsapp, is_valid_email, non_blank};

const RESET_TOKEN_TTL_DAYS: i64 = 1;

/// Response for session validation
#[derive(Serialize)]
pub struct ValidateSessionResponse {
    pub user: User,
    pub valid: bool,
}

fn required<'a>(value: &'a str, field: &str) -> ApiResult<&'a str> {
    non_blank(value).ok_or_else(|| ApiError::BadRequest(format!("{} is required.", field)))
}

fn check_new_password(password: &str, confirm: &str) -> ApiResult<()> {
    if password.is_empty() || confirm.is_empty() {
        return Err(ApiError::BadRequest("Password and confirmation are required.".to_string()));
    }
    if password != confirm {
        return Err(ApiError::BadRequest("Passwords do not match.".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// POST /auth/register - Self-registration of a student account
///
/// New accounts start as pending students and cannot log in until staff
/// approve them. Dependents are linked to an existing guardian account
/// and get no usable password of their own.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let first_name = required(&payload.first_name, "First name")?;
    let last_name = required(&payload.last_name, "Last name")?;
    let email = required(&payload.email, "Email")?.to_lowercase();
    let whatsapp = required(&payload.whatsapp, "WhatsApp")?;
    let birthday = payload
        .birthday
        .ok_or_else(|| ApiError::BadRequest("Birthday is required.".to_string()))?;

    if !is_valid_email(&email) {
        return Err(ApiError::BadRequest("Enter a valid email address.".to_string()));
    }

    let repo = UserRepository::new(state.db.pool.clone());
    if repo.email_in_use(&email, None)? {
        return Err(ApiError::Conflict("This email is already registered.".to_string()));
    }

    let (password_hash, responsible_id) = if payload.has_responsible {
        let responsible_email = payload
            .responsible_email
            .as_deref()
            .and_then(non_blank)
            .ok_or_else(|| ApiError::BadRequest("Responsible email is required.".to_string()))?;
        let responsible = repo
            .get_by_email(&responsible_email.to_lowercase())?
            .ok_or_else(|| {
                ApiError::BadRequest("No account found for the responsible email.".to_string())
            })?;
        (None, Some(responsible.id))
    } else {
        check_new_password(&payload.password, &payload.password_confirm)?;
        (Some(hash_password(&payload.password)), None)
    };

    let user = repo
        .create(&NewUser {
            email,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            birthday: Some(birthday),
            whatsapp: Some(format_whatsapp(whatsapp)),
            role: Role::Student,
            status: UserStatus::Pending,
            password_hash,
            responsible_id,
        })
        .map_err(|e| conflict_or_internal(e, "This email is already registered."))?;

    tracing::info!("Registered pending student {}", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/login - Login by email, password and role
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid email, password or role.".to_string());
    let repo = UserRepository::new(state.db.pool.clone());

    let user = repo
        .get_by_email(&payload.email.trim().to_lowercase())?
        .filter(|u| u.role == payload.role)
        .ok_or_else(invalid)?;

    let stored = repo.password_hash(&user.id)?.ok_or_else(invalid)?;
    if !verify_password(&payload.password, &stored) {
        return Err(invalid());
    }

    if user.status != UserStatus::Active {
        return Err(ApiError::Forbidden(
            "This account is not active. Wait for approval or contact the academy.".to_string(),
        ));
    }

    let session_token = state
        .session_manager
        .create_session(user.id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok(Json(LoginResponse {
        user,
        session_token,
    }))
}

/// POST /auth/logout - Logout and delete session
pub async fn logout(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<StatusCode> {
    let token = ctx.require_token()?;
    state
        .session_manager
        .delete_session(token)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/session - Validate the current session
pub async fn validate_session(
    Extension(ctx): Extension<RequestUserContext>,
) -> ApiResult<Json<ValidateSessionResponse>> {
    let user = ctx.require_user()?.clone();
    Ok(Json(ValidateSessionResponse { user, valid: true }))
}

fn overview(state: &AppState, ctx: &RequestUserContext) -> ApiResult<AccountOverview> {
    let identity = ctx
        .identity
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;
    let repo = UserRepository::new(state.db.pool.clone());

    let user = repo
        .get_by_id(&identity.effective_user_id())?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let original_user_id = identity
        .acting_user_id
        .filter(|acting| *acting != identity.user_id)
        .map(|_| identity.user_id);
    let dependents = repo.dependents(&identity.user_id)?;

    Ok(AccountOverview {
        user,
        original_user_id,
        dependents,
    })
}

/// GET /account - Current account, guardian and dependents
pub async fn account_overview(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<AccountOverview>> {
    ctx.require_user()?;
    Ok(Json(overview(&state, &ctx)?))
}

/// POST /account/switch/:id - Act as one of the guardian's dependents
pub async fn switch_account(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(dependent_id): Path<String>,
) -> ApiResult<Json<AccountOverview>> {
    let token = ctx.require_token()?;
    let identity = ctx
        .identity
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;
    let dependent_id = parse_id(&dependent_id, "user")?;

    let dependent = UserRepository::new(state.db.pool.clone())
        .get_by_id(&dependent_id)?
        .filter(|u| u.responsible_id == Some(identity.user_id))
        .ok_or_else(|| ApiError::Forbidden("You can only switch to your own dependents.".to_string()))?;

    state.session_manager.set_acting_user(token, Some(dependent.id))?;
    tracing::info!("User {} now acting as {}", identity.user_id, dependent.id);

    let mut ctx = ctx.clone();
    ctx.identity = Some(SessionIdentity {
        acting_user_id: Some(dependent.id),
        ..identity
    });
    Ok(Json(overview(&state, &ctx)?))
}

/// POST /account/switch-back - Return to the guardian account
pub async fn switch_back(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<AccountOverview>> {
    let token = ctx.require_token()?;
    state.session_manager.set_acting_user(token, None)?;

    let mut ctx = ctx.clone();
    if let Some(identity) = ctx.identity.as_mut() {
        identity.acting_user_id = None;
    }
    Ok(Json(overview(&state, &ctx)?))
}

/// POST /auth/password-reset - Issue a reset token
///
/// Always answers 202 so the endpoint cannot be used to probe for
/// registered emails. The token is written to the log.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> ApiResult<StatusCode> {
    let email = payload.email.trim().to_lowercase();
    let user = UserRepository::new(state.db.pool.clone()).get_by_email(&email)?;

    match user {
        Some(user) if user.status == UserStatus::Active => {
            let token = PasswordResetRepository::new(state.db.pool.clone())
                .create(&user.id, Duration::days(RESET_TOKEN_TTL_DAYS))?;
            tracing::info!("Password reset token for {}: {}", user.email, token);
        }
        _ => tracing::debug!("Password reset requested for unknown or inactive email"),
    }

    Ok(StatusCode::ACCEPTED)
}

/// POST /auth/password-reset/confirm - Set a new password with a reset token
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetConfirm>,
) -> ApiResult<StatusCode> {
    check_new_password(&payload.password, &payload.password_confirm)?;

    let user_id = PasswordResetRepository::new(state.db.pool.clone())
        .consume(payload.token.trim())?
        .ok_or_else(|| ApiError::BadRequest("Invalid or expired reset token.".to_string()))?;

    UserRepository::new(state.db.pool.clone()).set_password(&user_id, &hash_password(&payload.password))?;
    let dropped = state.session_manager.delete_user_sessions(&user_id)?;
    tracing::info!("Password reset for user {} ({} sessions closed)", user_id, dropped);

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_rules() {
        assert!(check_new_password("secret1", "secret1").is_ok());
        assert!(matches!(check_new_password("", ""), Err(ApiError::BadRequest(_))));
        match check_new_password("secret1", "secret2") {
            Err(ApiError::BadRequest(msg)) => assert_eq!(msg, "Passwords do not match."),
            other => panic!("unexpected {:?}", other),
        }
        assert!(check_new_password("abc", "abc").is_err());
    }
}
