//! crates/lms_core/src/grading.rs
//!
//! Automatic grading of submitted answers and score aggregation for an attempt.

use crate::domain::{NewQuizAnswer, QuestionType, QuizQuestion, QuizQuestionOption, SubmittedAnswer};

/// How a single answer was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect,
    /// Objective question answered without selecting an option.
    Unanswered,
    /// Short answer, left for manual review outside the automatic grader.
    PendingReview,
}

impl Verdict {
    pub fn is_correct(&self) -> Option<bool> {
        match self {
            Verdict::Correct => Some(true),
            Verdict::Incorrect => Some(false),
            Verdict::Unanswered | Verdict::PendingReview => None,
        }
    }
}

/// Grades one submitted answer against its question.
///
/// `options` must be the question's full option set, correctness flags included.
pub fn grade_answer(
    question: &QuizQuestion,
    options: &[QuizQuestionOption],
    submitted: &SubmittedAnswer,
) -> (Verdict, NewQuizAnswer) {
    let mut answer = NewQuizAnswer {
        question_id: question.id,
        selected_option_id: None,
        answer_text: submitted.answer_text.clone(),
        is_correct: None,
        points_earned: 0.0,
    };

    let verdict = match question.question_type {
        QuestionType::MultipleChoice | QuestionType::TrueFalse => {
            match submitted.selected_option_id {
                None => Verdict::Unanswered,
                Some(selected) => match options.iter().find(|o| o.id == selected) {
                    Some(option) => {
                        answer.selected_option_id = Some(option.id);
                        if option.is_correct {
                            Verdict::Correct
                        } else {
                            Verdict::Incorrect
                        }
                    }
                    // Ids from other questions are not stored; they would dangle.
                    None => Verdict::Incorrect,
                },
            }
        }
        QuestionType::ShortAnswer => Verdict::PendingReview,
    };

    answer.is_correct = verdict.is_correct();
    if verdict == Verdict::Correct {
        answer.points_earned = f64::from(question.points);
    }
    (verdict, answer)
}

/// Total points available from objective questions.
pub fn objective_points(questions: &[QuizQuestion]) -> f64 {
    questions
        .iter()
        .filter(|q| q.question_type.is_objective())
        .map(|q| f64::from(q.points))
        .sum()
}

/// Percentage score rounded to two decimals, and whether it meets the passing score.
///
/// A quiz without objective points scores 0 and never passes.
pub fn score_attempt(
    questions: &[QuizQuestion],
    answers: &[NewQuizAnswer],
    passing_score: i32,
) -> (f64, bool) {
    let total = objective_points(questions);
    if total <= 0.0 {
        return (0.0, false);
    }
    let earned: f64 = answers.iter().map(|a| a.points_earned).sum();
    let score = round_to_hundredths(earned / total * 100.0);
    (score, score >= f64::from(passing_score))
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
