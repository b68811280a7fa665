//! services/api/src/web/enrollments.rs
//!
//! Axum handlers for enrolling into courses and reading enrollments.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use lms_core::{EnrollmentScope, EnrollmentStatus, PageRequest, Principal};
use std::sync::Arc;

use crate::error::{ApiError, ErrorBody};
use crate::web::rest::{EnrollRequest, EnrollmentResponse, ListEnrollmentsParams};
use crate::web::state::AppState;

/// Splits the listing query into the engine's status filter and page request.
fn parse_listing(
    params: ListEnrollmentsParams,
) -> Result<(Option<EnrollmentStatus>, PageRequest), ApiError> {
    let status = match params.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<EnrollmentStatus>()
                .map_err(|e| ApiError::invalid_input(e.to_string()))?,
        ),
    };
    let page = PageRequest {
        limit: params.limit,
        offset: params.offset,
    };
    Ok((status, page))
}

/// Enroll the calling student into a course.
#[utoipa::path(
    post,
    path = "/api/enrollments",
    request_body = EnrollRequest,
    responses(
        (status = 201, description = "Enrolled", body = EnrollmentResponse),
        (status = 400, description = "Course unpublished, full, or malformed request",
            body = ErrorBody),
        (status = 403, description = "Only students can enroll", body = ErrorBody),
        (status = 404, description = "Course not found", body = ErrorBody),
        (status = 409, description = "Already enrolled", body = ErrorBody)
    )
)]
pub async fn enroll_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<EnrollRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let enrollment = state.enrollments.enroll(&principal, req.course_id).await?;
    Ok((StatusCode::CREATED, Json(EnrollmentResponse::from(enrollment))))
}

/// List the caller's own enrollments, newest first.
#[utoipa::path(
    get,
    path = "/api/enrollments/me",
    params(ListEnrollmentsParams),
    responses(
        (status = 200, description = "The caller's enrollments", body = [EnrollmentResponse]),
        (status = 400, description = "Unknown status filter", body = ErrorBody)
    )
)]
pub async fn list_my_enrollments_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    params: Result<Query<ListEnrollmentsParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;
    let (status, page) = parse_listing(params)?;
    let enrollments = state
        .enrollments
        .list_enrollments(&principal, EnrollmentScope::Mine, status, page)
        .await?;
    Ok(Json(
        enrollments
            .into_iter()
            .map(EnrollmentResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Read a single enrollment.
#[utoipa::path(
    get,
    path = "/api/enrollments/{id}",
    params(("id" = i64, Path, description = "Enrollment id")),
    responses(
        (status = 200, description = "The enrollment", body = EnrollmentResponse),
        (status = 403, description = "Students can only read their own enrollments",
            body = ErrorBody),
        (status = 404, description = "Enrollment not found", body = ErrorBody)
    )
)]
pub async fn get_enrollment_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let enrollment = state.enrollments.get_enrollment(&principal, id).await?;
    Ok(Json(EnrollmentResponse::from(enrollment)))
}

/// List a course's enrollments. Restricted to the course's instructor and admins.
#[utoipa::path(
    get,
    path = "/api/courses/{id}/enrollments",
    params(("id" = i64, Path, description = "Course id"), ListEnrollmentsParams),
    responses(
        (status = 200, description = "The course's enrollments", body = [EnrollmentResponse]),
        (status = 403, description = "Not the course's instructor", body = ErrorBody),
        (status = 404, description = "Course not found", body = ErrorBody)
    )
)]
pub async fn list_course_enrollments_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    course_id: Result<Path<i64>, PathRejection>,
    params: Result<Query<ListEnrollmentsParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(course_id) = course_id?;
    let Query(params) = params?;
    let (status, page) = parse_listing(params)?;
    let enrollments = state
        .enrollments
        .list_enrollments(&principal, EnrollmentScope::Course(course_id), status, page)
        .await?;
    Ok(Json(
        enrollments
            .into_iter()
            .map(EnrollmentResponse::from)
            .collect::<Vec<_>>(),
    ))
}
