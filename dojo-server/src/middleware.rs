use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use dojo_types::{Role, User, UserStatus};

use crate::api::{ApiError, ApiResult};
use crate::db::repositories::UserRepository;
use crate::session::SessionIdentity;
use crate::state::AppState;

pub const SESSION_HEADER: &str = "X-Session-Token";

/// Who is making the request, resolved once per request from the session token
#[derive(Clone, Debug, Default)]
pub struct RequestUserContext {
    pub token: Option<String>,
    pub identity: Option<SessionIdentity>,
    /// Effective account (the dependent while a guardian is acting for one)
    pub user: Option<User>,
}

impl RequestUserContext {
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user.as_ref().map(|u| u.id)
    }

    /// The effective user; 401 without a valid session
    pub fn require_user(&self) -> ApiResult<&User> {
        self.user
            .as_ref()
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }

    pub fn require_token(&self) -> ApiResult<&str> {
        self.token
            .as_deref()
            .filter(|_| self.identity.is_some())
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }

    /// Instructors and admins
    pub fn require_staff(&self) -> ApiResult<&User> {
        let user = self.require_user()?;
        if !user.is_staff() {
            return Err(ApiError::Forbidden("Staff only".to_string()));
        }
        Ok(user)
    }

    pub fn require_admin(&self) -> ApiResult<&User> {
        let user = self.require_user()?;
        if user.role != Role::Admin {
            return Err(ApiError::Forbidden("Administrators only".to_string()));
        }
        Ok(user)
    }

    pub fn require_student(&self) -> ApiResult<&User> {
        let user = self.require_user()?;
        if !user.is_student() {
            return Err(ApiError::Forbidden("Students only".to_string()));
        }
        Ok(user)
    }
}

/// Resolve the session token into a [`RequestUserContext`] extension.
///
/// Invalid or expired tokens, and sessions whose effective account is no
/// longer active, are treated as anonymous.
pub async fn user_context_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let context = match token {
        Some(token) => match resolve(&state, &token) {
            Ok(context) => context,
            Err(e) => {
                tracing::debug!("Ignoring session token: {:#}", e);
                RequestUserContext::unauthenticated()
            }
        },
        None => RequestUserContext::unauthenticated(),
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

fn resolve(state: &AppState, token: &str) -> anyhow::Result<RequestUserContext> {
    let identity = state.session_manager.validate_session(token)?;
    let repo = UserRepository::new(state.db.pool.clone());

    let login = repo
        .get_by_id(&identity.user_id)?
        .ok_or_else(|| anyhow::anyhow!("User not found"))?;
    if login.status != UserStatus::Active {
        anyhow::bail!("Account is not active");
    }

    let user = match identity.acting_user_id {
        Some(acting) if acting != login.id => repo
            .get_by_id(&acting)?
            .filter(|u| u.responsible_id == Some(login.id))
            .ok_or_else(|| anyhow::anyhow!("Dependent not found"))?,
        _ => login,
    };

    Ok(RequestUserContext {
        token: Some(token.to_string()),
        identity: Some(identity),
        user: Some(user),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_context() {
        let context = RequestUserContext::unauthenticated();
        assert!(!context.is_authenticated());
        assert!(matches!(context.require_user(), Err(ApiError::Unauthorized(_))));
        assert!(matches!(context.require_token(), Err(ApiError::Unauthorized(_))));
        assert_eq!(context.user_id(), None);
    }
}
