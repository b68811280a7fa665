//! services/api/src/web/quizzes.rs
//!
//! Axum handlers for the quiz-attempt lifecycle.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use lms_core::{Principal, SubmittedAnswer};
use std::sync::Arc;

use crate::error::{ApiError, ErrorBody};
use crate::web::rest::{AttemptResponse, StartAttemptResponse, SubmitAnswerRequest};
use crate::web::state::AppState;

/// Start a new attempt on a quiz.
///
/// Returns the attempt and the quiz's questions in order. Option correctness is never included.
#[utoipa::path(
    post,
    path = "/api/quizzes/{id}/attempts",
    params(("id" = i64, Path, description = "Quiz id")),
    responses(
        (status = 201, description = "Attempt started", body = StartAttemptResponse),
        (status = 400, description = "Maximum number of attempts reached", body = ErrorBody),
        (status = 404, description = "Quiz not found", body = ErrorBody)
    )
)]
pub async fn start_attempt_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    quiz_id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(quiz_id) = quiz_id?;
    let started = state.assessments.start_attempt(&principal, quiz_id).await?;
    Ok((StatusCode::CREATED, Json(StartAttemptResponse::from(started))))
}

/// Submit answers for an in-progress attempt and receive the graded result.
#[utoipa::path(
    post,
    path = "/api/attempts/{id}/submit",
    params(("id" = i64, Path, description = "Attempt id")),
    request_body = [SubmitAnswerRequest],
    responses(
        (status = 200, description = "Attempt completed", body = AttemptResponse),
        (status = 400, description = "Attempt already completed, late, or malformed request",
            body = ErrorBody),
        (status = 403, description = "Attempt belongs to another user", body = ErrorBody),
        (status = 404, description = "Attempt not found", body = ErrorBody)
    )
)]
pub async fn submit_answers_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    attempt_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<Vec<SubmitAnswerRequest>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(attempt_id) = attempt_id?;
    let Json(answers) = payload?;
    let answers: Vec<SubmittedAnswer> = answers.into_iter().map(SubmittedAnswer::from).collect();

    let attempt = state
        .assessments
        .submit_answers(&principal, attempt_id, &answers)
        .await?;
    Ok(Json(AttemptResponse::from(attempt)))
}

/// List the caller's attempts on a quiz.
#[utoipa::path(
    get,
    path = "/api/quizzes/{id}/attempts/me",
    params(("id" = i64, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "The caller's attempts", body = [AttemptResponse])
    )
)]
pub async fn my_attempts_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    quiz_id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(quiz_id) = quiz_id?;
    let attempts = state.assessments.my_attempts(&principal, quiz_id).await?;
    Ok(Json(
        attempts
            .into_iter()
            .map(AttemptResponse::from)
            .collect::<Vec<_>>(),
    ))
}
