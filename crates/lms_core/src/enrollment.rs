//! crates/lms_core/src/enrollment.rs
//!
//! The enrollment engine: decides whether a learner may join a course, and who may
//! read which enrollments.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{CourseId, Enrollment, EnrollmentId, EnrollmentQuery, EnrollmentStatus};
use crate::error::{CoreError, CoreResult};
use crate::ports::{EnrollmentInsert, RecordStore};
use crate::principal::{Capability, Principal};

pub const MAX_PAGE_SIZE: i64 = 100;
pub const MY_ENROLLMENTS_PAGE_SIZE: i64 = 20;
pub const COURSE_ENROLLMENTS_PAGE_SIZE: i64 = 50;

/// Whose enrollments to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentScope {
    Mine,
    Course(CourseId),
}

impl EnrollmentScope {
    fn default_limit(&self) -> i64 {
        match self {
            EnrollmentScope::Mine => MY_ENROLLMENTS_PAGE_SIZE,
            EnrollmentScope::Course(_) => COURSE_ENROLLMENTS_PAGE_SIZE,
        }
    }
}

/// Raw pagination input, normalized against the scope's default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageRequest {
    /// Limits outside `(0, 100]` fall back to `default_limit`; negative offsets become 0.
    pub fn resolve(&self, default_limit: i64) -> (i64, i64) {
        let limit = match self.limit {
            Some(limit) if limit > 0 && limit <= MAX_PAGE_SIZE => limit,
            _ => default_limit,
        };
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Clone)]
pub struct EnrollmentEngine {
    store: Arc<dyn RecordStore>,
}

impl EnrollmentEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Enrolls the principal into a published course with remaining capacity.
    pub async fn enroll(
        &self,
        principal: &Principal,
        course_id: CourseId,
    ) -> CoreResult<Enrollment> {
        if !principal.can(Capability::Enroll) {
            return Err(CoreError::RoleNotPermitted(principal.role));
        }

        let course = self.store.get_course(course_id).await?;
        if !course.is_published {
            return Err(CoreError::NotEligible(
                "Course is not available for enrollment".to_string(),
            ));
        }

        if self
            .store
            .find_enrollment(principal.user_id, course_id)
            .await?
            .is_some()
        {
            return Err(already_enrolled());
        }

        if let Some(limit) = course.enrollment_limit {
            let count = self.store.count_enrollments(course_id).await?;
            if count >= limit {
                return Err(CoreError::CapacityExceeded);
            }
        }

        // The checks above are advisory; the store re-validates them atomically.
        match self
            .store
            .insert_enrollment(principal.user_id, course_id, Utc::now())
            .await?
        {
            EnrollmentInsert::Created(enrollment) => {
                info!(
                    "User {} enrolled in course {} (enrollment {})",
                    principal.user_id, course_id, enrollment.id
                );
                Ok(enrollment)
            }
            EnrollmentInsert::AlreadyEnrolled => Err(already_enrolled()),
            EnrollmentInsert::CourseFull => {
                warn!(
                    "Course {} filled up before user {} could enroll",
                    course_id, principal.user_id
                );
                Err(CoreError::CapacityExceeded)
            }
            EnrollmentInsert::CourseUnpublished => Err(CoreError::NotEligible(
                "Course is not available for enrollment".to_string(),
            )),
        }
    }

    pub async fn list_enrollments(
        &self,
        principal: &Principal,
        scope: EnrollmentScope,
        status: Option<EnrollmentStatus>,
        page: PageRequest,
    ) -> CoreResult<Vec<Enrollment>> {
        let (limit, offset) = page.resolve(scope.default_limit());
        let (user_id, course_id) = match scope {
            EnrollmentScope::Mine => (Some(principal.user_id), None),
            EnrollmentScope::Course(course_id) => {
                let course = self.store.get_course(course_id).await?;
                if !principal.can_view_course_roster(&course) {
                    return Err(CoreError::Forbidden(
                        "you can only view enrollments for your own courses".to_string(),
                    ));
                }
                (None, Some(course_id))
            }
        };

        let query = EnrollmentQuery {
            user_id,
            course_id,
            status,
            limit,
            offset,
        };
        Ok(self.store.list_enrollments(&query).await?)
    }

    pub async fn get_enrollment(
        &self,
        principal: &Principal,
        enrollment_id: EnrollmentId,
    ) -> CoreResult<Enrollment> {
        let enrollment = self.store.get_enrollment(enrollment_id).await?;
        if !principal.can_view_enrollment(&enrollment) {
            return Err(CoreError::Forbidden(
                "you can only view your own enrollments".to_string(),
            ));
        }
        Ok(enrollment)
    }
}

fn already_enrolled() -> CoreError {
    CoreError::AlreadyExists("Already enrolled in this course".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Course;
    use crate::memory::InMemoryStore;
    use crate::principal::Role;
    use futures::future::join_all;

    fn course(id: CourseId, is_published: bool, enrollment_limit: Option<i64>) -> Course {
        Course {
            id,
            title: format!("Course {id}"),
            is_published,
            enrollment_limit,
            instructor_id: Some(500),
        }
    }

    fn student(user_id: i64) -> Principal {
        Principal::new(user_id, Role::Student)
    }

    fn setup(courses: Vec<Course>) -> (Arc<InMemoryStore>, EnrollmentEngine) {
        let store = Arc::new(InMemoryStore::new());
        for c in courses {
            store.add_course(c);
        }
        let engine = EnrollmentEngine::new(store.clone());
        (store, engine)
    }

    #[tokio::test]
    async fn enroll_creates_active_enrollment() {
        let (_, engine) = setup(vec![course(1, true, None)]);

        let enrollment = engine.enroll(&student(10), 1).await.unwrap();
        assert_eq!(enrollment.user_id, 10);
        assert_eq!(enrollment.course_id, 1);
        assert_eq!(enrollment.status, EnrollmentStatus::Active);
        assert_eq!(enrollment.progress, 0.0);
        assert!(enrollment.completed_at.is_none());
    }

    #[tokio::test]
    async fn only_students_may_enroll() {
        let (_, engine) = setup(vec![course(1, true, None)]);

        for role in [Role::Instructor, Role::Admin] {
            let err = engine.enroll(&Principal::new(1, role), 1).await.unwrap_err();
            assert!(matches!(err, CoreError::RoleNotPermitted(r) if r == role));
        }
    }

    #[tokio::test]
    async fn role_is_checked_before_course_existence() {
        let (_, engine) = setup(vec![]);
        let err = engine
            .enroll(&Principal::new(1, Role::Instructor), 42)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::RoleNotPermitted(_)));
    }

    #[tokio::test]
    async fn unknown_course_is_not_found() {
        let (_, engine) = setup(vec![]);
        let err = engine.enroll(&student(1), 42).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn unpublished_course_is_not_eligible_even_with_room() {
        let (_, engine) = setup(vec![course(1, false, Some(100)), course(2, false, None)]);

        for course_id in [1, 2] {
            let err = engine.enroll(&student(1), course_id).await.unwrap_err();
            assert!(matches!(err, CoreError::NotEligible(_)));
        }
    }

    #[tokio::test]
    async fn second_enrollment_is_rejected_without_duplicate() {
        let (store, engine) = setup(vec![course(1, true, None)]);

        engine.enroll(&student(1), 1).await.unwrap();
        let err = engine.enroll(&student(1), 1).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists(_)));
        assert_eq!(store.count_enrollments(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn full_course_rejects_new_learners() {
        let (_, engine) = setup(vec![course(1, true, Some(1))]);

        engine.enroll(&student(1), 1).await.unwrap();
        let err = engine.enroll(&student(2), 1).await.unwrap_err();
        assert!(matches!(err, CoreError::CapacityExceeded));
    }

    #[tokio::test]
    async fn repeat_enrollment_in_full_course_is_a_duplicate() {
        let (store, engine) = setup(vec![course(1, true, Some(1))]);

        engine.enroll(&student(1), 1).await.unwrap();
        let err = engine.enroll(&student(1), 1).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists(_)));

        let outcome = store.insert_enrollment(1, 1, Utc::now()).await.unwrap();
        assert!(matches!(outcome, EnrollmentInsert::AlreadyEnrolled));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_enrollments_never_exceed_capacity() {
        let (store, engine) = setup(vec![course(1, true, Some(3))]);

        let attempts = (1..=20).map(|user_id| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.enroll(&student(user_id), 1).await })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 3);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, CoreError::CapacityExceeded)));
        assert_eq!(store.count_enrollments(1).await.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_enrollments_create_one_row() {
        let (store, engine) = setup(vec![course(1, true, None)]);

        let attempts = (0..10).map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.enroll(&student(7), 1).await })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(store.count_enrollments(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn course_roster_requires_owner_or_admin() {
        let (_, engine) = setup(vec![course(1, true, None)]);
        engine.enroll(&student(1), 1).await.unwrap();
        engine.enroll(&student(2), 1).await.unwrap();

        let owner = Principal::new(500, Role::Instructor);
        let roster = engine
            .list_enrollments(&owner, EnrollmentScope::Course(1), None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(roster.len(), 2);

        let admin = Principal::new(1000, Role::Admin);
        assert!(engine
            .list_enrollments(&admin, EnrollmentScope::Course(1), None, PageRequest::default())
            .await
            .is_ok());

        let other = Principal::new(501, Role::Instructor);
        let err = engine
            .list_enrollments(&other, EnrollmentScope::Course(1), None, PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));

        let err = engine
            .list_enrollments(&owner, EnrollmentScope::Course(9), None, PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn my_enrollments_are_scoped_filtered_and_newest_first() {
        let (store, engine) = setup(vec![
            course(1, true, None),
            course(2, true, None),
            course(3, true, None),
        ]);
        for course_id in [1, 2, 3] {
            engine.enroll(&student(1), course_id).await.unwrap();
        }
        engine.enroll(&student(2), 1).await.unwrap();
        store.set_enrollment_status(1, 2, EnrollmentStatus::Completed);

        let mine = engine
            .list_enrollments(&student(1), EnrollmentScope::Mine, None, PageRequest::default())
            .await
            .unwrap();
        let courses: Vec<_> = mine.iter().map(|e| e.course_id).collect();
        assert_eq!(courses, vec![3, 2, 1]);

        let completed = engine
            .list_enrollments(
                &student(1),
                EnrollmentScope::Mine,
                Some(EnrollmentStatus::Completed),
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].course_id, 2);

        let page = engine
            .list_enrollments(
                &student(1),
                EnrollmentScope::Mine,
                None,
                PageRequest {
                    limit: Some(1),
                    offset: Some(1),
                },
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].course_id, 2);
    }

    #[test]
    fn page_request_falls_back_to_scope_default() {
        assert_eq!(PageRequest::default().resolve(20), (20, 0));
        assert_eq!(
            PageRequest { limit: Some(0), offset: Some(-5) }.resolve(20),
            (20, 0)
        );
        assert_eq!(
            PageRequest { limit: Some(101), offset: None }.resolve(50),
            (50, 0)
        );
        assert_eq!(
            PageRequest { limit: Some(100), offset: Some(3) }.resolve(50),
            (100, 3)
        );
    }

    #[tokio::test]
    async fn students_only_read_their_own_enrollment() {
        let (_, engine) = setup(vec![course(1, true, None)]);
        let enrollment = engine.enroll(&student(1), 1).await.unwrap();

        assert!(engine.get_enrollment(&student(1), enrollment.id).await.is_ok());
        let err = engine.get_enrollment(&student(2), enrollment.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
        assert!(engine
            .get_enrollment(&Principal::new(3, Role::Instructor), enrollment.id)
            .await
            .is_ok());
        let err = engine.get_enrollment(&student(1), 999).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
