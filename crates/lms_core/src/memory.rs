//! crates/lms_core/src/memory.rs
//!
//! An in-memory `RecordStore` and `PrincipalResolver`. Every conditional write runs
//! under a single lock, giving the same atomicity the Postgres adapter gets from
//! row locks and transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::domain::{
    AttemptCompletion, AttemptId, Course, CourseId, Enrollment, EnrollmentId, EnrollmentQuery,
    EnrollmentStatus, QuestionId, Quiz, QuizAnswer, QuizAttempt, QuizId, QuizQuestion,
    QuizQuestionOption, UserId,
};
use crate::ports::{
    AttemptInsert, CompletionOutcome, EnrollmentInsert, PortError, PortResult, PrincipalResolver,
    RecordStore,
};
use crate::principal::Principal;

#[derive(Default)]
struct State {
    next_id: i64,
    tokens: HashMap<String, Principal>,
    courses: HashMap<CourseId, Course>,
    enrollments: Vec<Enrollment>,
    quizzes: HashMap<QuizId, Quiz>,
    questions: Vec<QuizQuestion>,
    options: Vec<QuizQuestionOption>,
    attempts: Vec<QuizAttempt>,
    answers: Vec<QuizAnswer>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not wedge the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // --- Seeding ---

    pub fn add_token(&self, token: &str, principal: Principal) {
        self.lock().tokens.insert(token.to_string(), principal);
    }

    pub fn add_course(&self, course: Course) {
        self.lock().courses.insert(course.id, course);
    }

    pub fn add_quiz(&self, quiz: Quiz) {
        self.lock().quizzes.insert(quiz.id, quiz);
    }

    pub fn add_question(&self, question: QuizQuestion) {
        self.lock().questions.push(question);
    }

    pub fn add_option(&self, option: QuizQuestionOption) {
        self.lock().options.push(option);
    }

    /// Stores an attempt as-is under a fresh id, bypassing the attempt cap.
    pub fn seed_attempt(&self, mut attempt: QuizAttempt) -> AttemptId {
        let mut state = self.lock();
        attempt.id = state.next_id();
        let id = attempt.id;
        state.attempts.push(attempt);
        id
    }

    /// Stands in for the progress-tracking collaborator.
    pub fn set_enrollment_status(
        &self,
        user_id: UserId,
        course_id: CourseId,
        status: EnrollmentStatus,
    ) {
        let mut state = self.lock();
        if let Some(enrollment) = state
            .enrollments
            .iter_mut()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
        {
            enrollment.status = status;
        }
    }
}

fn not_found(what: &str, id: i64) -> PortError {
    PortError::NotFound(format!("{} {}", what, id))
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn get_course(&self, course_id: CourseId) -> PortResult<Course> {
        self.lock()
            .courses
            .get(&course_id)
            .cloned()
            .ok_or_else(|| not_found("Course", course_id))
    }

    async fn get_enrollment(&self, enrollment_id: EnrollmentId) -> PortResult<Enrollment> {
        self.lock()
            .enrollments
            .iter()
            .find(|e| e.id == enrollment_id)
            .cloned()
            .ok_or_else(|| not_found("Enrollment", enrollment_id))
    }

    async fn find_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> PortResult<Option<Enrollment>> {
        Ok(self
            .lock()
            .enrollments
            .iter()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
            .cloned())
    }

    async fn count_enrollments(&self, course_id: CourseId) -> PortResult<i64> {
        let state = self.lock();
        Ok(state
            .enrollments
            .iter()
            .filter(|e| e.course_id == course_id)
            .count() as i64)
    }

    async fn insert_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
        enrolled_at: DateTime<Utc>,
    ) -> PortResult<EnrollmentInsert> {
        let mut state = self.lock();
        let course = state
            .courses
            .get(&course_id)
            .cloned()
            .ok_or_else(|| not_found("Course", course_id))?;
        if !course.is_published {
            return Ok(EnrollmentInsert::CourseUnpublished);
        }
        let mut taken = 0;
        for enrollment in state.enrollments.iter().filter(|e| e.course_id == course_id) {
            if enrollment.user_id == user_id {
                return Ok(EnrollmentInsert::AlreadyEnrolled);
            }
            taken += 1;
        }
        if matches!(course.enrollment_limit, Some(limit) if taken >= limit) {
            return Ok(EnrollmentInsert::CourseFull);
        }

        let enrollment = Enrollment {
            id: state.next_id(),
            user_id,
            course_id,
            enrolled_at,
            completed_at: None,
            progress: 0.0,
            status: EnrollmentStatus::Active,
        };
        state.enrollments.push(enrollment.clone());
        Ok(EnrollmentInsert::Created(enrollment))
    }

    async fn list_enrollments(&self, query: &EnrollmentQuery) -> PortResult<Vec<Enrollment>> {
        let state = self.lock();
        let mut matching: Vec<Enrollment> = state
            .enrollments
            .iter()
            .filter(|e| query.user_id.map_or(true, |id| e.user_id == id))
            .filter(|e| query.course_id.map_or(true, |id| e.course_id == id))
            .filter(|e| query.status.map_or(true, |status| e.status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.enrolled_at.cmp(&a.enrolled_at).then(b.id.cmp(&a.id)));
        Ok(matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn get_quiz(&self, quiz_id: QuizId) -> PortResult<Quiz> {
        self.lock()
            .quizzes
            .get(&quiz_id)
            .cloned()
            .ok_or_else(|| not_found("Quiz", quiz_id))
    }

    async fn list_questions(&self, quiz_id: QuizId) -> PortResult<Vec<QuizQuestion>> {
        let mut questions: Vec<QuizQuestion> = self
            .lock()
            .questions
            .iter()
            .filter(|q| q.quiz_id == quiz_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.order_index, q.id));
        Ok(questions)
    }

    async fn list_options(&self, question_id: QuestionId) -> PortResult<Vec<QuizQuestionOption>> {
        let mut options: Vec<QuizQuestionOption> = self
            .lock()
            .options
            .iter()
            .filter(|o| o.question_id == question_id)
            .cloned()
            .collect();
        options.sort_by_key(|o| (o.order_index, o.id));
        Ok(options)
    }

    async fn get_attempt(&self, attempt_id: AttemptId) -> PortResult<QuizAttempt> {
        self.lock()
            .attempts
            .iter()
            .find(|a| a.id == attempt_id)
            .cloned()
            .ok_or_else(|| not_found("Attempt", attempt_id))
    }

    async fn count_attempts(&self, user_id: UserId, quiz_id: QuizId) -> PortResult<i64> {
        let state = self.lock();
        Ok(state
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.quiz_id == quiz_id)
            .count() as i64)
    }

    async fn insert_attempt(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        started_at: DateTime<Utc>,
    ) -> PortResult<AttemptInsert> {
        let mut state = self.lock();
        let max_attempts = state
            .quizzes
            .get(&quiz_id)
            .map(|q| q.max_attempts)
            .ok_or_else(|| not_found("Quiz", quiz_id))?;
        let taken = state
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.quiz_id == quiz_id)
            .count() as i32;
        if matches!(max_attempts, Some(max) if taken >= max) {
            return Ok(AttemptInsert::LimitReached);
        }

        let attempt = QuizAttempt {
            id: state.next_id(),
            user_id,
            quiz_id,
            attempt_number: taken + 1,
            started_at,
            completed_at: None,
            score: None,
            passed: None,
        };
        state.attempts.push(attempt.clone());
        Ok(AttemptInsert::Created(attempt))
    }

    async fn complete_attempt(
        &self,
        completion: AttemptCompletion,
    ) -> PortResult<CompletionOutcome> {
        let mut state = self.lock();
        let index = state
            .attempts
            .iter()
            .position(|a| a.id == completion.attempt_id)
            .ok_or_else(|| not_found("Attempt", completion.attempt_id))?;
        if state.attempts[index].is_completed() {
            return Ok(CompletionOutcome::AlreadyCompleted);
        }

        for answer in completion.answers {
            let id = state.next_id();
            state.answers.push(QuizAnswer {
                id,
                attempt_id: completion.attempt_id,
                question_id: answer.question_id,
                selected_option_id: answer.selected_option_id,
                answer_text: answer.answer_text,
                is_correct: answer.is_correct,
                points_earned: answer.points_earned,
            });
        }
        let attempt = &mut state.attempts[index];
        attempt.completed_at = Some(completion.completed_at);
        attempt.score = Some(completion.score);
        attempt.passed = Some(completion.passed);
        Ok(CompletionOutcome::Completed(attempt.clone()))
    }

    async fn list_attempts(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> PortResult<Vec<QuizAttempt>> {
        Ok(self
            .lock()
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.quiz_id == quiz_id)
            .cloned()
            .collect())
    }

    async fn list_answers(&self, attempt_id: AttemptId) -> PortResult<Vec<QuizAnswer>> {
        Ok(self
            .lock()
            .answers
            .iter()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PrincipalResolver for InMemoryStore {
    async fn resolve_principal(&self, credential: &str) -> PortResult<Principal> {
        self.lock()
            .tokens
            .get(credential)
            .copied()
            .ok_or(PortError::Unauthorized)
    }
}
