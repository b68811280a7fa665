//! crates/lms_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

pub type UserId = i64;
pub type CourseId = i64;
pub type EnrollmentId = i64;
pub type QuizId = i64;
pub type QuestionId = i64;
pub type OptionId = i64;
pub type AttemptId = i64;
pub type AnswerId = i64;

/// Error returned when a stored or submitted label does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

//=========================================================================================
// Courses & Enrollments
//=========================================================================================

/// A course as seen by the enrollment engine. Never mutated by the core.
#[derive(Debug, Clone)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub is_published: bool,
    /// `None` means unlimited.
    pub enrollment_limit: Option<i64>,
    pub instructor_id: Option<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Dropped,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Dropped => "dropped",
        }
    }
}

impl FromStr for EnrollmentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EnrollmentStatus::Active),
            "completed" => Ok(EnrollmentStatus::Completed),
            "dropped" => Ok(EnrollmentStatus::Dropped),
            other => Err(UnknownVariant {
                kind: "enrollment status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A learner's membership in a course. At most one per (user, course).
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: f64,
    pub status: EnrollmentStatus,
}

//=========================================================================================
// Quizzes
//=========================================================================================

#[derive(Debug, Clone)]
pub struct Quiz {
    pub id: QuizId,
    pub lesson_id: i64,
    pub title: String,
    pub passing_score: i32,
    pub time_limit_minutes: Option<i32>,
    /// `None` means unlimited attempts.
    pub max_attempts: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl QuestionType {
    /// Objective questions are graded automatically from the options' correctness flags.
    pub fn is_objective(&self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::TrueFalse)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::ShortAnswer => "short_answer",
        }
    }
}

impl FromStr for QuestionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "true_false" => Ok(QuestionType::TrueFalse),
            "short_answer" => Ok(QuestionType::ShortAnswer),
            other => Err(UnknownVariant {
                kind: "question type",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct QuizQuestion {
    pub id: QuestionId,
    pub quiz_id: QuizId,
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: i32,
    pub order_index: i32,
}

/// A stored option, including its correctness flag. Never handed to a learner as-is.
#[derive(Debug, Clone)]
pub struct QuizQuestionOption {
    pub id: OptionId,
    pub question_id: QuestionId,
    pub option_text: String,
    pub is_correct: bool,
    pub order_index: i32,
}

/// One occurrence of a user taking a quiz.
#[derive(Debug, Clone)]
pub struct QuizAttempt {
    pub id: AttemptId,
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub attempt_number: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    pub passed: Option<bool>,
}

impl QuizAttempt {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct QuizAnswer {
    pub id: AnswerId,
    pub attempt_id: AttemptId,
    pub question_id: QuestionId,
    pub selected_option_id: Option<OptionId>,
    pub answer_text: Option<String>,
    /// `None` means "not (yet) automatically gradable", which is distinct from `Some(false)`.
    pub is_correct: Option<bool>,
    pub points_earned: f64,
}

//=========================================================================================
// Submission & View Types
//=========================================================================================

/// A single answer as submitted by the learner.
#[derive(Debug, Clone, Default)]
pub struct SubmittedAnswer {
    pub question_id: QuestionId,
    pub selected_option_id: Option<OptionId>,
    pub answer_text: Option<String>,
}

/// A graded answer waiting to be persisted together with its attempt's completion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuizAnswer {
    pub question_id: QuestionId,
    pub selected_option_id: Option<OptionId>,
    pub answer_text: Option<String>,
    pub is_correct: Option<bool>,
    pub points_earned: f64,
}

/// Everything the store needs to complete an attempt in one unit.
#[derive(Debug, Clone)]
pub struct AttemptCompletion {
    pub attempt_id: AttemptId,
    pub completed_at: DateTime<Utc>,
    pub score: f64,
    pub passed: bool,
    pub answers: Vec<NewQuizAnswer>,
}

/// An option with its correctness flag stripped.
#[derive(Debug, Clone)]
pub struct OptionView {
    pub id: OptionId,
    pub option_text: String,
    pub order_index: i32,
}

impl From<QuizQuestionOption> for OptionView {
    fn from(option: QuizQuestionOption) -> Self {
        Self {
            id: option.id,
            option_text: option.option_text,
            order_index: option.order_index,
        }
    }
}

/// A question as presented to a learner starting an attempt.
#[derive(Debug, Clone)]
pub struct QuestionView {
    pub question: QuizQuestion,
    /// `None` for short-answer questions, which carry no options.
    pub options: Option<Vec<OptionView>>,
}

#[derive(Debug, Clone)]
pub struct StartedAttempt {
    pub attempt: QuizAttempt,
    pub questions: Vec<QuestionView>,
}

/// Filter handed to the store when listing enrollments.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentQuery {
    pub user_id: Option<UserId>,
    pub course_id: Option<CourseId>,
    pub status: Option<EnrollmentStatus>,
    pub limit: i64,
    pub offset: i64,
}
