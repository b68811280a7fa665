pub mod assessment;
pub mod domain;
pub mod enrollment;
pub mod error;
pub mod grading;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod ports;
pub mod principal;

pub use assessment::{AssessmentEngine, LateSubmissionPolicy};
pub use domain::{
    Course, Enrollment, EnrollmentStatus, OptionView, QuestionType, QuestionView, Quiz,
    QuizAnswer, QuizAttempt, QuizQuestion, QuizQuestionOption, StartedAttempt, SubmittedAnswer,
};
pub use enrollment::{EnrollmentEngine, EnrollmentScope, PageRequest};
pub use error::{CoreError, CoreResult};
pub use ports::{PortError, PortResult, PrincipalResolver, RecordStore};
pub use principal::{Capability, Principal, Role};
