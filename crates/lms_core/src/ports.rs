//! crates/lms_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the relational store and the authentication collaborator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    AttemptCompletion, AttemptId, Course, CourseId, Enrollment, EnrollmentId, EnrollmentQuery,
    QuestionId, Quiz, QuizAnswer, QuizAttempt, QuizId, QuizQuestion, QuizQuestionOption, UserId,
};
use crate::principal::Principal;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Conditional Write Outcomes
//=========================================================================================

/// Result of the atomic check-and-insert of an enrollment.
#[derive(Debug, Clone)]
pub enum EnrollmentInsert {
    Created(Enrollment),
    AlreadyEnrolled,
    CourseFull,
    CourseUnpublished,
}

/// Result of the atomic count-and-insert of a quiz attempt.
#[derive(Debug, Clone)]
pub enum AttemptInsert {
    Created(QuizAttempt),
    LimitReached,
}

/// Result of writing an attempt's answers and completion fields as one unit.
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    Completed(QuizAttempt),
    AlreadyCompleted,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait RecordStore: Send + Sync {
    // --- Courses & Enrollments ---
    async fn get_course(&self, course_id: CourseId) -> PortResult<Course>;

    async fn get_enrollment(&self, enrollment_id: EnrollmentId) -> PortResult<Enrollment>;

    async fn find_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> PortResult<Option<Enrollment>>;

    /// Counts enrollments of any status.
    async fn count_enrollments(&self, course_id: CourseId) -> PortResult<i64>;

    /// Inserts an `active` enrollment with zero progress.
    ///
    /// Publication, uniqueness and capacity are re-validated inside a unit that is
    /// serialized per course, so the committed count can never exceed the capacity.
    async fn insert_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
        enrolled_at: DateTime<Utc>,
    ) -> PortResult<EnrollmentInsert>;

    /// Ordered by enrollment timestamp, newest first.
    async fn list_enrollments(&self, query: &EnrollmentQuery) -> PortResult<Vec<Enrollment>>;

    // --- Quizzes ---
    async fn get_quiz(&self, quiz_id: QuizId) -> PortResult<Quiz>;

    /// Ordered by ascending order index.
    async fn list_questions(&self, quiz_id: QuizId) -> PortResult<Vec<QuizQuestion>>;

    /// Includes correctness flags. Ordered by ascending order index.
    async fn list_options(&self, question_id: QuestionId) -> PortResult<Vec<QuizQuestionOption>>;

    // --- Attempts ---
    async fn get_attempt(&self, attempt_id: AttemptId) -> PortResult<QuizAttempt>;

    async fn count_attempts(&self, user_id: UserId, quiz_id: QuizId) -> PortResult<i64>;

    /// Creates attempt number `count + 1`, re-checking the quiz's attempt cap inside a
    /// unit serialized per (user, quiz).
    async fn insert_attempt(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        started_at: DateTime<Utc>,
    ) -> PortResult<AttemptInsert>;

    /// Persists the answers and the completion fields together, only if the attempt is
    /// still in progress.
    async fn complete_attempt(&self, completion: AttemptCompletion)
        -> PortResult<CompletionOutcome>;

    /// In storage order.
    async fn list_attempts(&self, user_id: UserId, quiz_id: QuizId)
        -> PortResult<Vec<QuizAttempt>>;

    async fn list_answers(&self, attempt_id: AttemptId) -> PortResult<Vec<QuizAnswer>>;
}

#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// Resolves a transport-level credential into a verified principal.
    async fn resolve_principal(&self, credential: &str) -> PortResult<Principal>;
}
