//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `RecordStore` and `PrincipalResolver` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lms_core::domain::{
    AttemptCompletion, AttemptId, Course, CourseId, Enrollment, EnrollmentId, EnrollmentQuery,
    QuestionId, Quiz, QuizAnswer, QuizAttempt, QuizId, QuizQuestion, QuizQuestionOption, UserId,
};
use lms_core::ports::{
    AttemptInsert, CompletionOutcome, EnrollmentInsert, PortError, PortResult, PrincipalResolver,
    RecordStore,
};
use lms_core::principal::Principal;
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `RecordStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(what: &'static str, id: i64) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} {}", what, id)),
        other => unexpected(other),
    }
}

fn parse_label<T>(raw: &str) -> PortResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| PortError::Unexpected(format!("corrupt row: {}", e)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CourseRecord {
    id: i64,
    title: String,
    is_published: bool,
    enrollment_limit: Option<i64>,
    instructor_id: Option<i64>,
}
impl CourseRecord {
    fn to_domain(self) -> Course {
        Course {
            id: self.id,
            title: self.title,
            is_published: self.is_published,
            enrollment_limit: self.enrollment_limit,
            instructor_id: self.instructor_id,
        }
    }
}

#[derive(FromRow)]
struct EnrollmentRecord {
    id: i64,
    user_id: i64,
    course_id: i64,
    enrolled_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    progress: f64,
    status: String,
}
impl EnrollmentRecord {
    fn to_domain(self) -> PortResult<Enrollment> {
        Ok(Enrollment {
            id: self.id,
            user_id: self.user_id,
            course_id: self.course_id,
            enrolled_at: self.enrolled_at,
            completed_at: self.completed_at,
            progress: self.progress,
            status: parse_label(&self.status)?,
        })
    }
}

#[derive(FromRow)]
struct QuizRecord {
    id: i64,
    lesson_id: i64,
    title: String,
    passing_score: i32,
    time_limit_minutes: Option<i32>,
    max_attempts: Option<i32>,
}
impl QuizRecord {
    fn to_domain(self) -> Quiz {
        Quiz {
            id: self.id,
            lesson_id: self.lesson_id,
            title: self.title,
            passing_score: self.passing_score,
            time_limit_minutes: self.time_limit_minutes,
            max_attempts: self.max_attempts,
        }
    }
}

#[derive(FromRow)]
struct QuestionRecord {
    id: i64,
    quiz_id: i64,
    question_text: String,
    question_type: String,
    points: i32,
    order_index: i32,
}
impl QuestionRecord {
    fn to_domain(self) -> PortResult<QuizQuestion> {
        Ok(QuizQuestion {
            id: self.id,
            quiz_id: self.quiz_id,
            question_text: self.question_text,
            question_type: parse_label(&self.question_type)?,
            points: self.points,
            order_index: self.order_index,
        })
    }
}

#[derive(FromRow)]
struct OptionRecord {
    id: i64,
    question_id: i64,
    option_text: String,
    is_correct: bool,
    order_index: i32,
}
impl OptionRecord {
    fn to_domain(self) -> QuizQuestionOption {
        QuizQuestionOption {
            id: self.id,
            question_id: self.question_id,
            option_text: self.option_text,
            is_correct: self.is_correct,
            order_index: self.order_index,
        }
    }
}

#[derive(FromRow)]
struct AttemptRecord {
    id: i64,
    user_id: i64,
    quiz_id: i64,
    attempt_number: i32,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    score: Option<f64>,
    passed: Option<bool>,
}
impl AttemptRecord {
    fn to_domain(self) -> QuizAttempt {
        QuizAttempt {
            id: self.id,
            user_id: self.user_id,
            quiz_id: self.quiz_id,
            attempt_number: self.attempt_number,
            started_at: self.started_at,
            completed_at: self.completed_at,
            score: self.score,
            passed: self.passed,
        }
    }
}

#[derive(FromRow)]
struct AnswerRecord {
    id: i64,
    attempt_id: i64,
    question_id: i64,
    selected_option_id: Option<i64>,
    answer_text: Option<String>,
    is_correct: Option<bool>,
    points_earned: f64,
}
impl AnswerRecord {
    fn to_domain(self) -> QuizAnswer {
        QuizAnswer {
            id: self.id,
            attempt_id: self.attempt_id,
            question_id: self.question_id,
            selected_option_id: self.selected_option_id,
            answer_text: self.answer_text,
            is_correct: self.is_correct,
            points_earned: self.points_earned,
        }
    }
}

#[derive(FromRow)]
struct PrincipalRecord {
    id: i64,
    role: String,
}

const ENROLLMENT_COLUMNS: &str =
    "id, user_id, course_id, enrolled_at, completed_at, progress, status";
const ATTEMPT_COLUMNS: &str =
    "id, user_id, quiz_id, attempt_number, started_at, completed_at, score, passed";

//=========================================================================================
// `RecordStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RecordStore for DbAdapter {
    async fn get_course(&self, course_id: CourseId) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(
            "SELECT id, title, is_published, enrollment_limit, instructor_id \
             FROM courses WHERE id = $1",
        )
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("Course", course_id))?;
        Ok(record.to_domain())
    }

    async fn get_enrollment(&self, enrollment_id: EnrollmentId) -> PortResult<Enrollment> {
        let record = sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "SELECT {} FROM enrollments WHERE id = $1",
            ENROLLMENT_COLUMNS
        ))
        .bind(enrollment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("Enrollment", enrollment_id))?;
        record.to_domain()
    }

    async fn find_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> PortResult<Option<Enrollment>> {
        let record = sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "SELECT {} FROM enrollments WHERE user_id = $1 AND course_id = $2",
            ENROLLMENT_COLUMNS
        ))
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(EnrollmentRecord::to_domain).transpose()
    }

    async fn count_enrollments(&self, course_id: CourseId) -> PortResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM enrollments WHERE course_id = $1")
                .bind(course_id)
                .fetch_one(&self.pool)
                .await
                .map_err(unexpected)?;
        Ok(count)
    }

    async fn insert_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
        enrolled_at: DateTime<Utc>,
    ) -> PortResult<EnrollmentInsert> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Locking the course row serializes competing enrollments for the same course.
        let course: Option<(bool, Option<i64>)> = sqlx::query_as(
            "SELECT is_published, enrollment_limit FROM courses WHERE id = $1 FOR UPDATE",
        )
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?;
        let Some((is_published, enrollment_limit)) = course else {
            return Err(PortError::NotFound(format!("Course {}", course_id)));
        };
        if !is_published {
            return Ok(EnrollmentInsert::CourseUnpublished);
        }

        // A duplicate outranks a full course.
        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM enrollments WHERE user_id = $1 AND course_id = $2")
                .bind(user_id)
                .bind(course_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(unexpected)?;
        if existing.is_some() {
            return Ok(EnrollmentInsert::AlreadyEnrolled);
        }

        if let Some(limit) = enrollment_limit {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM enrollments WHERE course_id = $1")
                    .bind(course_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(unexpected)?;
            if count >= limit {
                return Ok(EnrollmentInsert::CourseFull);
            }
        }

        let inserted = sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "INSERT INTO enrollments (user_id, course_id, enrolled_at, progress, status) \
             VALUES ($1, $2, $3, 0, 'active') \
             ON CONFLICT (user_id, course_id) DO NOTHING \
             RETURNING {}",
            ENROLLMENT_COLUMNS
        ))
        .bind(user_id)
        .bind(course_id)
        .bind(enrolled_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?;

        let Some(record) = inserted else {
            return Ok(EnrollmentInsert::AlreadyEnrolled);
        };
        let enrollment = record.to_domain()?;
        tx.commit().await.map_err(unexpected)?;
        Ok(EnrollmentInsert::Created(enrollment))
    }

    async fn list_enrollments(&self, query: &EnrollmentQuery) -> PortResult<Vec<Enrollment>> {
        let records = sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "SELECT {} FROM enrollments \
             WHERE ($1::BIGINT IS NULL OR user_id = $1) \
               AND ($2::BIGINT IS NULL OR course_id = $2) \
               AND ($3::TEXT IS NULL OR status = $3) \
             ORDER BY enrolled_at DESC, id DESC \
             LIMIT $4 OFFSET $5",
            ENROLLMENT_COLUMNS
        ))
        .bind(query.user_id)
        .bind(query.course_id)
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(EnrollmentRecord::to_domain).collect()
    }

    async fn get_quiz(&self, quiz_id: QuizId) -> PortResult<Quiz> {
        let record = sqlx::query_as::<_, QuizRecord>(
            "SELECT id, lesson_id, title, passing_score, time_limit_minutes, max_attempts \
             FROM quizzes WHERE id = $1",
        )
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("Quiz", quiz_id))?;
        Ok(record.to_domain())
    }

    async fn list_questions(&self, quiz_id: QuizId) -> PortResult<Vec<QuizQuestion>> {
        let records = sqlx::query_as::<_, QuestionRecord>(
            "SELECT id, quiz_id, question_text, question_type, points, order_index \
             FROM quiz_questions WHERE quiz_id = $1 ORDER BY order_index ASC, id ASC",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(QuestionRecord::to_domain).collect()
    }

    async fn list_options(&self, question_id: QuestionId) -> PortResult<Vec<QuizQuestionOption>> {
        let records = sqlx::query_as::<_, OptionRecord>(
            "SELECT id, question_id, option_text, is_correct, order_index \
             FROM quiz_question_options WHERE question_id = $1 ORDER BY order_index ASC, id ASC",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(OptionRecord::to_domain).collect())
    }

    async fn get_attempt(&self, attempt_id: AttemptId) -> PortResult<QuizAttempt> {
        let record = sqlx::query_as::<_, AttemptRecord>(&format!(
            "SELECT {} FROM quiz_attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("Attempt", attempt_id))?;
        Ok(record.to_domain())
    }

    async fn count_attempts(&self, user_id: UserId, quiz_id: QuizId) -> PortResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1 AND quiz_id = $2",
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count)
    }

    async fn insert_attempt(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        started_at: DateTime<Utc>,
    ) -> PortResult<AttemptInsert> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Serializes attempt creation per (user, quiz) until the transaction ends.
        sqlx::query(
            "SELECT pg_advisory_xact_lock(hashtextextended($1::TEXT || '/' || $2::TEXT, 0))",
        )
        .bind(user_id)
        .bind(quiz_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        let quiz: Option<(Option<i32>,)> =
            sqlx::query_as("SELECT max_attempts FROM quizzes WHERE id = $1")
                .bind(quiz_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(unexpected)?;
        let Some((max_attempts,)) = quiz else {
            return Err(PortError::NotFound(format!("Quiz {}", quiz_id)));
        };

        let (taken,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1 AND quiz_id = $2",
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;
        if matches!(max_attempts, Some(max) if taken >= i64::from(max)) {
            return Ok(AttemptInsert::LimitReached);
        }

        let record = sqlx::query_as::<_, AttemptRecord>(&format!(
            "INSERT INTO quiz_attempts (user_id, quiz_id, attempt_number, started_at) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            ATTEMPT_COLUMNS
        ))
        .bind(user_id)
        .bind(quiz_id)
        .bind((taken + 1) as i32)
        .bind(started_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(AttemptInsert::Created(record.to_domain()))
    }

    async fn complete_attempt(
        &self,
        completion: AttemptCompletion,
    ) -> PortResult<CompletionOutcome> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // The row lock taken here makes a concurrent submission re-check `completed_at`
        // after this transaction commits, and then match nothing.
        let completed = sqlx::query_as::<_, AttemptRecord>(&format!(
            "UPDATE quiz_attempts SET completed_at = $2, score = $3, passed = $4 \
             WHERE id = $1 AND completed_at IS NULL RETURNING {}",
            ATTEMPT_COLUMNS
        ))
        .bind(completion.attempt_id)
        .bind(completion.completed_at)
        .bind(completion.score)
        .bind(completion.passed)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?;

        let Some(record) = completed else {
            return Ok(CompletionOutcome::AlreadyCompleted);
        };

        for answer in &completion.answers {
            sqlx::query(
                "INSERT INTO quiz_answers \
                 (attempt_id, question_id, selected_option_id, answer_text, is_correct, \
                  points_earned) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(completion.attempt_id)
            .bind(answer.question_id)
            .bind(answer.selected_option_id)
            .bind(answer.answer_text.as_deref())
            .bind(answer.is_correct)
            .bind(answer.points_earned)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(CompletionOutcome::Completed(record.to_domain()))
    }

    async fn list_attempts(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> PortResult<Vec<QuizAttempt>> {
        let records = sqlx::query_as::<_, AttemptRecord>(&format!(
            "SELECT {} FROM quiz_attempts WHERE user_id = $1 AND quiz_id = $2",
            ATTEMPT_COLUMNS
        ))
        .bind(user_id)
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(AttemptRecord::to_domain).collect())
    }

    async fn list_answers(&self, attempt_id: AttemptId) -> PortResult<Vec<QuizAnswer>> {
        let records = sqlx::query_as::<_, AnswerRecord>(
            "SELECT id, attempt_id, question_id, selected_option_id, answer_text, is_correct, \
                    points_earned \
             FROM quiz_answers WHERE attempt_id = $1 ORDER BY id ASC",
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(AnswerRecord::to_domain).collect())
    }
}

//=========================================================================================
// `PrincipalResolver` Trait Implementation
//=========================================================================================

#[async_trait]
impl PrincipalResolver for DbAdapter {
    async fn resolve_principal(&self, credential: &str) -> PortResult<Principal> {
        let record = sqlx::query_as::<_, PrincipalRecord>(
            "SELECT u.id, u.role FROM auth_sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > NOW() AND u.is_active",
        )
        .bind(credential)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)?;

        Ok(Principal::new(record.id, parse_label(&record.role)?))
    }
}
