//! crates/lms_core/src/assessment.rs
//!
//! The assessment engine owns the quiz-attempt state machine:
//! `in_progress` (no completion timestamp) to `completed` (score and pass flag set).
//! A completed attempt is terminal.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{
    AttemptCompletion, AttemptId, OptionView, QuestionView, Quiz, QuizAttempt, QuizId,
    StartedAttempt, SubmittedAnswer, UnknownVariant,
};
use crate::error::{CoreError, CoreResult};
use crate::grading::{grade_answer, score_attempt};
use crate::ports::{AttemptInsert, CompletionOutcome, RecordStore};
use crate::principal::Principal;

/// What to do with a submission that arrives after the quiz's time limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LateSubmissionPolicy {
    /// Grade late submissions like any other.
    #[default]
    Accept,
    /// Fail late submissions with `TimeLimitExceeded`, leaving the attempt in progress.
    Reject,
}

impl FromStr for LateSubmissionPolicy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "accept" => Ok(LateSubmissionPolicy::Accept),
            "reject" => Ok(LateSubmissionPolicy::Reject),
            other => Err(UnknownVariant {
                kind: "late submission policy",
                value: other.to_string(),
            }),
        }
    }
}

/// Whether `at` falls after the attempt's time window. Quizzes without a limit are never late.
pub fn is_late(quiz: &Quiz, attempt: &QuizAttempt, at: DateTime<Utc>) -> bool {
    match quiz.time_limit_minutes {
        Some(minutes) => at > attempt.started_at + Duration::minutes(i64::from(minutes)),
        None => false,
    }
}

#[derive(Clone)]
pub struct AssessmentEngine {
    store: Arc<dyn RecordStore>,
    late_policy: LateSubmissionPolicy,
}

impl AssessmentEngine {
    pub fn new(store: Arc<dyn RecordStore>, late_policy: LateSubmissionPolicy) -> Self {
        Self { store, late_policy }
    }

    /// Opens a new attempt and returns the quiz's questions with correctness stripped.
    pub async fn start_attempt(
        &self,
        principal: &Principal,
        quiz_id: QuizId,
    ) -> CoreResult<StartedAttempt> {
        let quiz = self.store.get_quiz(quiz_id).await?;

        if let Some(max) = quiz.max_attempts {
            let taken = self.store.count_attempts(principal.user_id, quiz_id).await?;
            if taken >= i64::from(max) {
                return Err(CoreError::AttemptLimitExceeded);
            }
        }

        let attempt = match self
            .store
            .insert_attempt(principal.user_id, quiz_id, Utc::now())
            .await?
        {
            AttemptInsert::Created(attempt) => attempt,
            AttemptInsert::LimitReached => {
                warn!(
                    "User {} hit the attempt limit on quiz {} concurrently",
                    principal.user_id, quiz_id
                );
                return Err(CoreError::AttemptLimitExceeded);
            }
        };
        info!(
            "User {} started attempt #{} (id {}) on quiz {}",
            principal.user_id, attempt.attempt_number, attempt.id, quiz_id
        );

        let questions = self.store.list_questions(quiz_id).await?;
        let mut views = Vec::with_capacity(questions.len());
        for question in questions {
            let options = if question.question_type.is_objective() {
                let options = self.store.list_options(question.id).await?;
                Some(options.into_iter().map(OptionView::from).collect())
            } else {
                None
            };
            views.push(QuestionView { question, options });
        }

        Ok(StartedAttempt {
            attempt,
            questions: views,
        })
    }

    /// Grades the submitted answers and completes the attempt. One-shot: a completed
    /// attempt is never re-graded.
    pub async fn submit_answers(
        &self,
        principal: &Principal,
        attempt_id: AttemptId,
        submitted: &[SubmittedAnswer],
    ) -> CoreResult<QuizAttempt> {
        let attempt = self.store.get_attempt(attempt_id).await?;
        if attempt.user_id != principal.user_id {
            return Err(CoreError::Forbidden(
                "this attempt does not belong to you".to_string(),
            ));
        }
        if attempt.is_completed() {
            return Err(CoreError::AlreadyCompleted);
        }

        let quiz = self.store.get_quiz(attempt.quiz_id).await?;
        let now = Utc::now();
        if self.late_policy == LateSubmissionPolicy::Reject && is_late(&quiz, &attempt, now) {
            warn!("Rejecting late submission for attempt {}", attempt_id);
            return Err(CoreError::TimeLimitExceeded);
        }

        let questions = self.store.list_questions(quiz.id).await?;
        let mut seen = HashSet::new();
        let mut answers = Vec::with_capacity(submitted.len());
        for item in submitted {
            let Some(question) = questions.iter().find(|q| q.id == item.question_id) else {
                continue;
            };
            // First answer per question wins.
            if !seen.insert(question.id) {
                continue;
            }
            let needs_options =
                question.question_type.is_objective() && item.selected_option_id.is_some();
            let options = if needs_options {
                self.store.list_options(question.id).await?
            } else {
                Vec::new()
            };
            let (verdict, answer) = grade_answer(question, &options, item);
            debug!(
                "Attempt {} question {} graded {:?} ({} points)",
                attempt_id, question.id, verdict, answer.points_earned
            );
            answers.push(answer);
        }

        let (score, passed) = score_attempt(&questions, &answers, quiz.passing_score);
        let completion = AttemptCompletion {
            attempt_id,
            completed_at: now,
            score,
            passed,
            answers,
        };

        match self.store.complete_attempt(completion).await? {
            CompletionOutcome::Completed(attempt) => {
                info!(
                    "Attempt {} completed with score {:.2} (passed: {})",
                    attempt_id, score, passed
                );
                Ok(attempt)
            }
            CompletionOutcome::AlreadyCompleted => Err(CoreError::AlreadyCompleted),
        }
    }

    pub async fn my_attempts(
        &self,
        principal: &Principal,
        quiz_id: QuizId,
    ) -> CoreResult<Vec<QuizAttempt>> {
        Ok(self.store.list_attempts(principal.user_id, quiz_id).await?)
    }
}
