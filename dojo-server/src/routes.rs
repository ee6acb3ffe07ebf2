use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::api;
use crate::audit::audit_middleware;
use crate::middleware::user_context_middleware;
use crate::photo::MAX_PHOTO_BYTES;
use crate::rate_limit::{self, RateLimiter};
use crate::state::AppState;

/// Multipart framing on top of the photo itself
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let rate_limiter = RateLimiter::new(
        state.settings.rate_limit.max_requests,
        state.settings.rate_limit.window_secs,
    );

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Authentication routes
        .route("/auth/register", post(api::account::register))
        .route("/auth/login", post(api::account::login))
        .route("/auth/logout", post(api::account::logout))
        .route("/auth/session", get(api::account::validate_session))
        .route("/auth/password-reset", post(api::account::request_password_reset))
        .route("/auth/password-reset/confirm", post(api::account::confirm_password_reset))
        // Account switching (guardians acting for dependents)
        .route("/account", get(api::account::account_overview))
        .route("/account/switch/:id", post(api::account::switch_account))
        .route("/account/switch-back", post(api::account::switch_back))
        // Profile routes
        .route("/profile", get(api::users::get_profile).put(api::users::update_profile))
        .route(
            "/profile/photo",
            post(api::users::upload_photo)
                .layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES + UPLOAD_OVERHEAD_BYTES)),
        )
        // User administration
        .route("/users", get(api::users::list_users))
        .route("/users/:id", get(api::users::get_user).delete(api::users::deactivate_user))
        .route("/users/:id/status", put(api::users::set_status))
        .route("/users/:id/role", put(api::users::set_role))
        // Class routes
        .route("/classes", get(api::classes::list_classes).post(api::classes::create_class))
        .route(
            "/classes/:id",
            get(api::classes::get_class)
                .put(api::classes::update_class)
                .delete(api::classes::delete_class),
        )
        .route("/classes/:id/enroll", post(api::classes::request_enrollment))
        .route("/classes/:id/enrollments", get(api::classes::class_enrollments))
        .route("/enrollments", get(api::classes::list_enrollments))
        .route("/enrollments/mine", get(api::classes::my_enrollments))
        .route("/enrollments/:id/decision", post(api::classes::decide_enrollment))
        // Attendance routes
        .route("/attendance", post(api::attendance::request_attendance))
        .route("/attendance/mine", get(api::attendance::my_attendance))
        .route("/attendance/pending", get(api::attendance::pending_attendance))
        .route("/attendance/processed", get(api::attendance::processed_attendance))
        .route("/attendance/summary", get(api::attendance::attendance_summary))
        .route("/attendance/:id/cancel", post(api::attendance::cancel_attendance))
        .route("/attendance/:id/decision", post(api::attendance::process_attendance))
        // Graduation routes
        .route("/graduations", post(api::graduations::create_graduation))
        .route("/graduations/mine", get(api::graduations::my_graduations))
        .route("/graduations/:id/date-change", post(api::graduations::request_date_change))
        .route("/students/:id/graduations", get(api::graduations::student_graduations))
        .route("/students/:id/graduations/current", get(api::graduations::current_graduation))
        .route("/graduation-date-changes", get(api::graduations::list_date_changes))
        .route(
            "/graduation-date-changes/:id/decision",
            post(api::graduations::decide_date_change),
        )
        // Lesson plan routes
        .route(
            "/lesson-plans",
            get(api::lesson_plans::list_plans).post(api::lesson_plans::create_plan),
        )
        .route(
            "/lesson-plans/:id",
            get(api::lesson_plans::get_plan)
                .put(api::lesson_plans::update_plan)
                .delete(api::lesson_plans::delete_plan),
        )
        .route("/lesson-plans/:id/items", post(api::lesson_plans::add_item))
        .route(
            "/lesson-plans/:id/items/:item_id",
            put(api::lesson_plans::update_item).delete(api::lesson_plans::delete_item),
        )
        // Ranking routes
        .route("/rankings", get(api::rankings::list_rankings).post(api::rankings::create_ranking))
        .route(
            "/rankings/:id",
            get(api::rankings::get_ranking).delete(api::rankings::delete_ranking),
        )
        .route("/rankings/:id/positions", put(api::rankings::set_positions))
        .route("/rankings/:id/recompute", post(api::rankings::recompute_ranking))
        // Goal routes
        .route("/goals", get(api::goals::list_goals).post(api::goals::create_goal))
        .route(
            "/goals/:id",
            get(api::goals::get_goal)
                .put(api::goals::update_goal)
                .delete(api::goals::delete_goal),
        )
        .route("/goals/:id/progress", get(api::goals::goal_progress))
        // Inventory routes
        .route("/items", get(api::inventory::list_items).post(api::inventory::create_item))
        .route(
            "/items/:id",
            get(api::inventory::get_item)
                .put(api::inventory::update_item)
                .delete(api::inventory::delete_item),
        )
        .route("/orders", get(api::inventory::list_orders).post(api::inventory::place_order))
        .route("/orders/mine", get(api::inventory::my_orders))
        .route("/orders/expire", post(api::inventory::expire_orders))
        .route("/orders/:id", get(api::inventory::get_order))
        .route("/orders/:id/transition", post(api::inventory::transition_order))
        // Report routes
        .route("/reports/attendance", get(api::reports::attendance_report))
        .route("/reports/orders", get(api::reports::orders_report))
        .route("/reports/goals/:id", get(api::reports::goal_report))
        // Dashboard, notifications and audit
        .route("/dashboard", get(api::dashboard::dashboard))
        .route("/notifications", get(api::dashboard::notifications))
        .route("/audit-logs", get(api::audit::list_audit_logs))
        // Uploaded photos
        .nest_service("/media", ServeDir::new(state.media_dir()))
        .layer(middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), user_context_middleware))
        .with_state(state)
        .layer(middleware::from_fn(rate_limit::rate_limit_middleware))
        .layer(axum::Extension(rate_limiter))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health_check() -> &'static str {
    "OK"
}
