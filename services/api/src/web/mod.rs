pub mod enrollments;
pub mod middleware;
pub mod quizzes;
pub mod rest;
pub mod state;

pub use middleware::require_auth;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::web::state::AppState;

/// Builds the API router. Everything except `/health` requires an authenticated principal.
pub fn router(app_state: Arc<AppState>) -> Router {
    let public_routes = Router::new().route("/health", get(|| async { "ok" }));

    let protected_routes = Router::new()
        .route("/api/enrollments", post(enrollments::enroll_handler))
        .route("/api/enrollments/me", get(enrollments::list_my_enrollments_handler))
        .route("/api/enrollments/{id}", get(enrollments::get_enrollment_handler))
        .route(
            "/api/courses/{id}/enrollments",
            get(enrollments::list_course_enrollments_handler),
        )
        .route("/api/quizzes/{id}/attempts", post(quizzes::start_attempt_handler))
        .route("/api/quizzes/{id}/attempts/me", get(quizzes::my_attempts_handler))
        .route("/api/attempts/{id}/submit", post(quizzes::submit_answers_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
