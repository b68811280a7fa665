//! crates/lms_core/src/principal.rs
//!
//! The authenticated identity attached to every core operation, and the
//! role-based capability checks the engines authorize against.

use crate::domain::{Course, Enrollment, UnknownVariant, UserId};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

/// Operations gated on role alone, before any ownership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Join a course as a learner.
    Enroll,
    /// Read the enrollment list of any course, regardless of ownership.
    ViewAnyCourseRoster,
    /// Read other users' enrollments by id.
    ViewOthersEnrollments,
}

impl Role {
    pub fn allows(&self, capability: Capability) -> bool {
        match (self, capability) {
            (Role::Student, Capability::Enroll) => true,
            (Role::Admin, Capability::ViewAnyCourseRoster) => true,
            (Role::Instructor | Role::Admin, Capability::ViewOthersEnrollments) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verified identity supplied by the authentication collaborator. Trusted verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.allows(capability)
    }

    /// The owning instructor of a course, or any admin.
    pub fn can_view_course_roster(&self, course: &Course) -> bool {
        self.can(Capability::ViewAnyCourseRoster) || course.instructor_id == Some(self.user_id)
    }

    pub fn can_view_enrollment(&self, enrollment: &Enrollment) -> bool {
        enrollment.user_id == self.user_id || self.can(Capability::ViewOthersEnrollments)
    }
}
