//! Persistence seam for the assessment engine.
//!
//! Every uniqueness rule the engine relies on lives behind these traits so
//! that it is enforced atomically by the backing store rather than by
//! callers: one active college assignment per (test, college) and one
//! attempt per (test, student).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::assignment::{CollegeAssignment, StudentAssignment};
use crate::models::attempt::Attempt;
use crate::models::catalog::AssignmentStatus;
use crate::models::directory::{College, Student};
use crate::models::notification::{DeliveryOutcome, NotificationLog};
use crate::models::test::TestDefinition;

#[derive(Debug, Clone, Copy, Default)]
pub struct CollegeAssignmentFilter {
    pub test_id: Option<Uuid>,
    pub college_id: Option<Uuid>,
}

/// Filters over active student assignments.
#[derive(Debug, Clone, Copy, Default)]
pub struct StudentAssignmentFilter {
    pub test_id: Option<Uuid>,
    pub college_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AttemptFilter {
    pub test_id: Option<Uuid>,
    pub college_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_test(&self, test: &TestDefinition) -> Result<()>;
    async fn get_test(&self, id: Uuid) -> Result<Option<TestDefinition>>;
    async fn list_tests(&self, is_active: Option<bool>) -> Result<Vec<TestDefinition>>;
    /// Returns false when the test does not exist.
    async fn set_test_active(&self, id: Uuid, is_active: bool) -> Result<bool>;
}

#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn upsert_college(&self, college: &College) -> Result<()>;
    async fn get_college(&self, id: Uuid) -> Result<Option<College>>;
    async fn upsert_student(&self, student: &Student) -> Result<()>;
    async fn get_student(&self, id: Uuid) -> Result<Option<Student>>;
    /// All students of a college, active or not.
    async fn list_students(&self, college_id: Uuid) -> Result<Vec<Student>>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn find_active_college_assignment(
        &self,
        test_id: Uuid,
        college_id: Uuid,
    ) -> Result<Option<CollegeAssignment>>;

    /// Inserts unless an active assignment for the same (test, college)
    /// exists; returns whether a row was written.
    async fn insert_college_assignment(&self, assignment: &CollegeAssignment) -> Result<bool>;

    async fn get_college_assignment(&self, id: Uuid) -> Result<Option<CollegeAssignment>>;

    /// Compare-and-set from `pending`; `None` when the assignment is missing
    /// or already decided.
    async fn decide_college_assignment(
        &self,
        id: Uuid,
        decision: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<CollegeAssignment>>;

    async fn list_college_assignments(
        &self,
        filter: CollegeAssignmentFilter,
    ) -> Result<Vec<CollegeAssignment>>;

    /// Deactivates the active set for (test, college) and writes `records`
    /// in one step.
    async fn replace_student_assignments(
        &self,
        test_id: Uuid,
        college_id: Uuid,
        records: &[StudentAssignment],
    ) -> Result<()>;

    async fn find_active_student_assignment(
        &self,
        test_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<StudentAssignment>>;

    async fn list_student_assignments(
        &self,
        filter: StudentAssignmentFilter,
    ) -> Result<Vec<StudentAssignment>>;
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Atomic unique insert on (test, student); returns false on conflict.
    async fn insert_attempt(&self, attempt: &Attempt) -> Result<bool>;
    async fn find_attempt(&self, test_id: Uuid, student_id: Uuid) -> Result<Option<Attempt>>;
    async fn list_attempts(&self, filter: AttemptFilter) -> Result<Vec<Attempt>>;
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn enqueue_notification(&self, log: &NotificationLog) -> Result<()>;
    /// Claims the oldest due entry and marks it as sending until
    /// `lease_until`. Due means pending with `next_retry_at` passed, or
    /// sending with an expired lease (the previous claimant never reported).
    async fn claim_pending_notification(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<NotificationLog>>;
    async fn record_delivery(&self, id: Uuid, outcome: DeliveryOutcome) -> Result<()>;
    async fn get_notification(&self, id: Uuid) -> Result<Option<NotificationLog>>;
}

pub trait Store: CatalogStore + DirectoryStore + AssignmentStore + AttemptStore + OutboxStore {}

impl<T> Store for T where
    T: CatalogStore + DirectoryStore + AssignmentStore + AttemptStore + OutboxStore
{
}

pub type SharedStore = Arc<dyn Store>;
