use axum::{
    extract::{MatchedPath, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use dojo_types::LogStatus;

use crate::db::repositories::AuditLogRepository;
use crate::db::Database;
use crate::middleware::RequestUserContext;
use crate::state::AppState;

const SKIPPED_PREFIXES: [&str; 3] = ["/static/", "/media/", "/health"];

/// Decoded value of `key` in a raw query string, if present (possibly empty)
fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    query?.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        (k == key).then(|| {
            let v = v.replace('+', " ");
            urlencoding::decode(&v).map(|d| d.into_owned()).unwrap_or(v)
        })
    })
}

/// Describe a finished request as an audit entry
pub fn describe_action(
    method: &Method,
    path: &str,
    query: Option<&str>,
    route: Option<&str>,
    status_code: u16,
) -> (String, LogStatus) {
    let mut verb = if *method == Method::POST {
        "Submitted data to"
    } else if *method == Method::DELETE {
        "Deleted in"
    } else if *method == Method::PUT || *method == Method::PATCH {
        "Updated in"
    } else {
        "Accessed"
    };

    let mut extra = String::new();
    if let Some(format) = query_param(query, "export") {
        verb = "Exported data from";
        extra = format!(" (Format: {})", format);
    } else if path.contains("report") && *method == Method::GET {
        verb = "Viewed report in";
    }

    let mut action = format!(
        "{} {} [{}]{} (Route: {})",
        verb,
        path,
        method,
        extra,
        route.unwrap_or("unknown")
    );

    let status = if status_code >= 400 {
        action.push_str(&format!(" - Status Code: {}", status_code));
        LogStatus::Failure
    } else {
        LogStatus::Success
    };

    (action, status)
}

/// Store an entry unless it repeats the user's latest one
pub fn record(db: &Database, user_id: &Uuid, action: &str, status: LogStatus) -> anyhow::Result<bool> {
    let repo = AuditLogRepository::new(db.pool.clone());
    if let Some((last_action, last_status)) = repo.latest_for_user(user_id)? {
        if last_action == action && last_status == status {
            return Ok(false);
        }
    }
    repo.create(Some(user_id), action, status)?;
    Ok(true)
}

/// Record a system event (no acting user). Failures are logged only.
pub fn record_system(db: &Database, action: &str, status: LogStatus) {
    let repo = AuditLogRepository::new(db.pool.clone());
    if let Err(e) = repo.create(None, action, status) {
        tracing::error!("Failed to write system audit log: {:#}", e);
    }
}

/// Audit every request made by an authenticated user.
///
/// Must run inside `user_context_middleware`. A failure to write the log
/// never changes the response.
pub async fn audit_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if SKIPPED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return next.run(request).await;
    }

    let user_id = request
        .extensions()
        .get::<RequestUserContext>()
        .and_then(RequestUserContext::user_id);
    let method = request.method().clone();
    let query = request.uri().query().map(str::to_string);
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string());

    let response = next.run(request).await;

    if let Some(user_id) = user_id {
        let (action, status) = describe_action(
            &method,
            &path,
            query.as_deref(),
            route.as_deref(),
            response.status().as_u16(),
        );
        if let Err(e) = record(&state.db, &user_id, &action, status) {
            tracing::error!("Failed to write audit log: {:#}", e);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_user, test_db};
    use dojo_types::Role;

    #[test]
    fn test_verbs_by_method() {
        let (a, s) = describe_action(&Method::GET, "/classes", None, Some("/classes"), 200);
        assert_eq!(a, "Accessed /classes [GET] (Route: /classes)");
        assert_eq!(s, LogStatus::Success);

        let (a, _) = describe_action(&Method::POST, "/orders", None, Some("/orders"), 201);
        assert_eq!(a, "Submitted data to /orders [POST] (Route: /orders)");

        let (a, _) = describe_action(&Method::PATCH, "/users/1/status", None, None, 200);
        assert_eq!(a, "Updated in /users/1/status [PATCH] (Route: unknown)");

        let (a, _) = describe_action(&Method::DELETE, "/classes/1", None, Some("/classes/:id"), 204);
        assert!(a.starts_with("Deleted in /classes/1 [DELETE]"));
    }

    #[test]
    fn test_export_and_report_verbs() {
        let (a, _) = describe_action(
            &Method::GET,
            "/reports/attendance",
            Some("student=1&export=pdf"),
            Some("/reports/attendance"),
            200,
        );
        assert_eq!(
            a,
            "Exported data from /reports/attendance [GET] (Format: pdf) (Route: /reports/attendance)"
        );

        let (a, _) = describe_action(&Method::GET, "/reports/orders", None, Some("/reports/orders"), 200);
        assert!(a.starts_with("Viewed report in /reports/orders"));

        let (a, _) = describe_action(&Method::POST, "/reports/orders", None, None, 200);
        assert!(a.starts_with("Submitted data to"));
    }

    #[test]
    fn test_export_format_is_decoded() {
        let (a, _) = describe_action(
            &Method::GET,
            "/reports/orders",
            Some("export=x%6Csx&status=PENDING"),
            Some("/reports/orders"),
            200,
        );
        assert_eq!(
            a,
            "Exported data from /reports/orders [GET] (Format: xlsx) (Route: /reports/orders)"
        );

        assert_eq!(query_param(Some("export=my+file%2Fv2"), "export").as_deref(), Some("my file/v2"));
        assert_eq!(query_param(Some("export="), "export").as_deref(), Some(""));
        assert_eq!(query_param(Some("exported=pdf"), "export"), None);
    }

    #[test]
    fn test_failures_carry_status_code() {
        let (a, s) = describe_action(&Method::GET, "/x", None, None, 404);
        assert_eq!(a, "Accessed /x [GET] (Route: unknown) - Status Code: 404");
        assert_eq!(s, LogStatus::Failure);
    }

    #[test]
    fn test_consecutive_duplicates_are_skipped() {
        let db = test_db();
        let user = seed_user(&db, "a@x.io", Role::Admin);

        assert!(record(&db, &user, "Accessed /a [GET] (Route: /a)", LogStatus::Success).unwrap());
        assert!(!record(&db, &user, "Accessed /a [GET] (Route: /a)", LogStatus::Success).unwrap());
        assert!(record(&db, &user, "Accessed /a [GET] (Route: /a)", LogStatus::Failure).unwrap());
        assert!(record(&db, &user, "Accessed /b [GET] (Route: /b)", LogStatus::Success).unwrap());
        assert!(record(&db, &user, "Accessed /a [GET] (Route: /a)", LogStatus::Success).unwrap());

        let logs = AuditLogRepository::new(db.pool.clone()).list(Some(&user), None, 10).unwrap();
        assert_eq!(logs.len(), 4);
    }
}
