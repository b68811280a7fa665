//! crates/lms_core/src/error.rs
//!
//! The categorized failures returned by the enrollment and assessment engines.

use crate::ports::PortError;
use crate::principal::Role;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Role '{0}' is not permitted to perform this operation")]
    RoleNotPermitted(Role),

    #[error("{0}")]
    NotEligible(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("Course enrollment is full")]
    CapacityExceeded,

    #[error("Maximum number of attempts reached")]
    AttemptLimitExceeded,

    #[error("Attempt already completed")]
    AlreadyCompleted,

    #[error("Time limit for this attempt has expired")]
    TimeLimitExceeded,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Opaque storage failure. The source is for logs only.
    #[error("An internal error occurred")]
    Internal(#[source] PortError),
}

impl CoreError {
    /// Stable category code reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "not_found",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::RoleNotPermitted(_) => "role_not_permitted",
            CoreError::NotEligible(_) => "not_eligible",
            CoreError::AlreadyExists(_) => "already_exists",
            CoreError::CapacityExceeded => "capacity_exceeded",
            CoreError::AttemptLimitExceeded => "attempt_limit_exceeded",
            CoreError::AlreadyCompleted => "already_completed",
            CoreError::TimeLimitExceeded => "time_limit_exceeded",
            CoreError::InvalidInput(_) => "invalid_input",
            CoreError::Internal(_) => "internal",
        }
    }
}

impl From<PortError> for CoreError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => CoreError::NotFound(what),
            other => CoreError::Internal(other),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
