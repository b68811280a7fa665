//! services/api/src/web/rest.rs
//!
//! Contains the request/response payloads of the REST API and the master
//! definition for the OpenAPI specification.

use chrono::{DateTime, Utc};
use lms_core::{Enrollment, OptionView, QuestionView, QuizAttempt, StartedAttempt, SubmittedAnswer};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::error::ErrorBody;
use crate::web::{enrollments, quizzes};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        enrollments::enroll_handler,
        enrollments::list_my_enrollments_handler,
        enrollments::get_enrollment_handler,
        enrollments::list_course_enrollments_handler,
        quizzes::start_attempt_handler,
        quizzes::submit_answers_handler,
        quizzes::my_attempts_handler,
    ),
    components(
        schemas(
            EnrollRequest,
            EnrollmentResponse,
            SubmitAnswerRequest,
            AttemptResponse,
            StartAttemptResponse,
            QuestionResponse,
            OptionResponse,
            ErrorBody,
        )
    ),
    tags(
        (name = "LMS API", description = "Capacity-gated enrollment and quiz attempts.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Request Payloads
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct EnrollRequest {
    pub course_id: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitAnswerRequest {
    pub question_id: i64,
    pub selected_option_id: Option<i64>,
    pub answer_text: Option<String>,
}

impl From<SubmitAnswerRequest> for SubmittedAnswer {
    fn from(req: SubmitAnswerRequest) -> Self {
        SubmittedAnswer {
            question_id: req.question_id,
            selected_option_id: req.selected_option_id,
            answer_text: req.answer_text,
        }
    }
}

/// Query string accepted by the enrollment listings.
#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct ListEnrollmentsParams {
    /// One of `active`, `completed`, `dropped`. Absent or empty lists every status.
    pub status: Option<String>,
    /// Page size in (0, 100]; other values fall back to the listing's default.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

//=========================================================================================
// Response Payloads
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct EnrollmentResponse {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: f64,
    pub status: String,
}

impl From<Enrollment> for EnrollmentResponse {
    fn from(e: Enrollment) -> Self {
        Self {
            id: e.id,
            user_id: e.user_id,
            course_id: e.course_id,
            enrolled_at: e.enrolled_at,
            completed_at: e.completed_at,
            progress: e.progress,
            status: e.status.to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AttemptResponse {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    pub attempt_number: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    pub passed: Option<bool>,
}

impl From<QuizAttempt> for AttemptResponse {
    fn from(a: QuizAttempt) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            quiz_id: a.quiz_id,
            attempt_number: a.attempt_number,
            started_at: a.started_at,
            completed_at: a.completed_at,
            score: a.score,
            passed: a.passed,
        }
    }
}

/// An answer option without its correctness flag.
#[derive(Serialize, ToSchema)]
pub struct OptionResponse {
    pub id: i64,
    pub option_text: String,
    pub order_index: i32,
}

impl From<OptionView> for OptionResponse {
    fn from(o: OptionView) -> Self {
        Self {
            id: o.id,
            option_text: o.option_text,
            order_index: o.order_index,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct QuestionResponse {
    pub id: i64,
    pub question_text: String,
    pub question_type: String,
    pub points: i32,
    pub order_index: i32,
    /// Absent for short-answer questions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<OptionResponse>>,
}

impl From<QuestionView> for QuestionResponse {
    fn from(view: QuestionView) -> Self {
        let q = view.question;
        Self {
            id: q.id,
            question_text: q.question_text,
            question_type: q.question_type.to_string(),
            points: q.points,
            order_index: q.order_index,
            options: view
                .options
                .map(|options| options.into_iter().map(OptionResponse::from).collect()),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StartAttemptResponse {
    pub attempt: AttemptResponse,
    pub questions: Vec<QuestionResponse>,
}

impl From<StartedAttempt> for StartAttemptResponse {
    fn from(started: StartedAttempt) -> Self {
        Self {
            attempt: started.attempt.into(),
            questions: started.questions.into_iter().map(QuestionResponse::from).collect(),
        }
    }
}
