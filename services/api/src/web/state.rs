//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use lms_core::{
    AssessmentEngine, EnrollmentEngine, LateSubmissionPolicy, PrincipalResolver, RecordStore,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub enrollments: EnrollmentEngine,
    pub assessments: AssessmentEngine,
    pub principals: Arc<dyn PrincipalResolver>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        principals: Arc<dyn PrincipalResolver>,
        late_policy: LateSubmissionPolicy,
    ) -> Self {
        Self {
            enrollments: EnrollmentEngine::new(store.clone()),
            assessments: AssessmentEngine::new(store, late_policy),
            principals,
        }
    }
}
