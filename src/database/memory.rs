use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::database::store::{
    AssignmentStore, AttemptFilter, AttemptStore, CatalogStore, CollegeAssignmentFilter,
    DirectoryStore, OutboxStore, StudentAssignmentFilter,
};
use crate::error::{Error, Result};
use crate::models::assignment::{CollegeAssignment, StudentAssignment};
use crate::models::attempt::Attempt;
use crate::models::catalog::AssignmentStatus;
use crate::models::directory::{College, Student};
use crate::models::notification::{DeliveryOutcome, DeliveryStatus, NotificationLog};
use crate::models::test::TestDefinition;

#[derive(Default)]
struct State {
    tests: Vec<TestDefinition>,
    colleges: HashMap<Uuid, College>,
    students: Vec<Student>,
    college_assignments: Vec<CollegeAssignment>,
    student_assignments: Vec<StudentAssignment>,
    attempts: Vec<Attempt>,
    outbox: Vec<NotificationLog>,
}

/// Process-local store. Each operation runs under one lock, which gives the
/// same check-and-insert atomicity the Postgres indexes give.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))
    }

    /// Number of notifications written so far, for inspection in tests.
    pub fn outbox_len(&self) -> usize {
        self.lock().map(|s| s.outbox.len()).unwrap_or(0)
    }

    pub fn outbox_snapshot(&self) -> Vec<NotificationLog> {
        self.lock().map(|s| s.outbox.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_test(&self, test: &TestDefinition) -> Result<()> {
        let mut state = self.lock()?;
        if state.tests.iter().any(|t| t.id == test.id) {
            return Err(Error::Internal(format!("duplicate test id {}", test.id)));
        }
        state.tests.push(test.clone());
        Ok(())
    }

    async fn get_test(&self, id: Uuid) -> Result<Option<TestDefinition>> {
        Ok(self.lock()?.tests.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tests(&self, is_active: Option<bool>) -> Result<Vec<TestDefinition>> {
        let state = self.lock()?;
        let mut tests: Vec<TestDefinition> = state
            .tests
            .iter()
            .filter(|t| is_active.map_or(true, |flag| t.is_active == flag))
            .cloned()
            .collect();
        tests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tests)
    }

    async fn set_test_active(&self, id: Uuid, is_active: bool) -> Result<bool> {
        let mut state = self.lock()?;
        match state.tests.iter_mut().find(|t| t.id == id) {
            Some(test) => {
                test.is_active = is_active;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn upsert_college(&self, college: &College) -> Result<()> {
        self.lock()?.colleges.insert(college.id, college.clone());
        Ok(())
    }

    async fn get_college(&self, id: Uuid) -> Result<Option<College>> {
        Ok(self.lock()?.colleges.get(&id).cloned())
    }

    async fn upsert_student(&self, student: &Student) -> Result<()> {
        let mut state = self.lock()?;
        match state.students.iter_mut().find(|s| s.id == student.id) {
            Some(existing) => *existing = student.clone(),
            None => state.students.push(student.clone()),
        }
        Ok(())
    }

    async fn get_student(&self, id: Uuid) -> Result<Option<Student>> {
        Ok(self.lock()?.students.iter().find(|s| s.id == id).cloned())
    }

    async fn list_students(&self, college_id: Uuid) -> Result<Vec<Student>> {
        Ok(self
            .lock()?
            .students
            .iter()
            .filter(|s| s.college_id == college_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn find_active_college_assignment(
        &self,
        test_id: Uuid,
        college_id: Uuid,
    ) -> Result<Option<CollegeAssignment>> {
        Ok(self
            .lock()?
            .college_assignments
            .iter()
            .find(|a| a.is_active && a.test_id == test_id && a.college_id == college_id)
            .cloned())
    }

    async fn insert_college_assignment(&self, assignment: &CollegeAssignment) -> Result<bool> {
        let mut state = self.lock()?;
        let taken = state.college_assignments.iter().any(|a| {
            a.is_active && a.test_id == assignment.test_id && a.college_id == assignment.college_id
        });
        if taken {
            return Ok(false);
        }
        state.college_assignments.push(assignment.clone());
        Ok(true)
    }

    async fn get_college_assignment(&self, id: Uuid) -> Result<Option<CollegeAssignment>> {
        Ok(self
            .lock()?
            .college_assignments
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn decide_college_assignment(
        &self,
        id: Uuid,
        decision: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<CollegeAssignment>> {
        let mut state = self.lock()?;
        let Some(slot) = state.college_assignments.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        match slot.decided(decision, at) {
            Some(next) => {
                *slot = next.clone();
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }

    async fn list_college_assignments(
        &self,
        filter: CollegeAssignmentFilter,
    ) -> Result<Vec<CollegeAssignment>> {
        let state = self.lock()?;
        let mut rows: Vec<CollegeAssignment> = state
            .college_assignments
            .iter()
            .filter(|a| a.is_active)
            .filter(|a| filter.test_id.map_or(true, |id| a.test_id == id))
            .filter(|a| filter.college_id.map_or(true, |id| a.college_id == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));
        Ok(rows)
    }

    async fn replace_student_assignments(
        &self,
        test_id: Uuid,
        college_id: Uuid,
        records: &[StudentAssignment],
    ) -> Result<()> {
        let mut state = self.lock()?;
        for existing in state
            .student_assignments
            .iter_mut()
            .filter(|a| a.is_active && a.test_id == test_id && a.college_id == college_id)
        {
            existing.is_active = false;
        }
        state.student_assignments.extend(records.iter().cloned());
        Ok(())
    }

    async fn find_active_student_assignment(
        &self,
        test_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<StudentAssignment>> {
        Ok(self
            .lock()?
            .student_assignments
            .iter()
            .find(|a| a.is_active && a.test_id == test_id && a.student_id == student_id)
            .cloned())
    }

    async fn list_student_assignments(
        &self,
        filter: StudentAssignmentFilter,
    ) -> Result<Vec<StudentAssignment>> {
        let state = self.lock()?;
        let mut rows: Vec<StudentAssignment> = state
            .student_assignments
            .iter()
            .filter(|a| a.is_active)
            .filter(|a| filter.test_id.map_or(true, |id| a.test_id == id))
            .filter(|a| filter.college_id.map_or(true, |id| a.college_id == id))
            .filter(|a| filter.student_id.map_or(true, |id| a.student_id == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));
        Ok(rows)
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn insert_attempt(&self, attempt: &Attempt) -> Result<bool> {
        let mut state = self.lock()?;
        let exists = state
            .attempts
            .iter()
            .any(|a| a.test_id == attempt.test_id && a.student_id == attempt.student_id);
        if exists {
            return Ok(false);
        }
        state.attempts.push(attempt.clone());
        Ok(true)
    }

    async fn find_attempt(&self, test_id: Uuid, student_id: Uuid) -> Result<Option<Attempt>> {
        Ok(self
            .lock()?
            .attempts
            .iter()
            .find(|a| a.test_id == test_id && a.student_id == student_id)
            .cloned())
    }

    async fn list_attempts(&self, filter: AttemptFilter) -> Result<Vec<Attempt>> {
        let state = self.lock()?;
        let mut rows: Vec<Attempt> = state
            .attempts
            .iter()
            .filter(|a| filter.test_id.map_or(true, |id| a.test_id == id))
            .filter(|a| filter.college_id.map_or(true, |id| a.college_id == id))
            .filter(|a| filter.student_id.map_or(true, |id| a.student_id == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.end_time.cmp(&a.end_time));
        Ok(rows)
    }
}

#[async_trait]
impl OutboxStore for MemoryStore {
    async fn enqueue_notification(&self, log: &NotificationLog) -> Result<()> {
        self.lock()?.outbox.push(log.clone());
        Ok(())
    }

    async fn claim_pending_notification(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<NotificationLog>> {
        let mut state = self.lock()?;
        let due = state
            .outbox
            .iter_mut()
            .filter(|n| match n.status {
                DeliveryStatus::Pending | DeliveryStatus::Sending => {
                    n.next_retry_at.map_or(true, |at| at <= now)
                }
                _ => false,
            })
            .min_by_key(|n| n.created_at);
        Ok(due.map(|n| {
            n.status = DeliveryStatus::Sending;
            n.next_retry_at = Some(lease_until);
            n.updated_at = now;
            n.clone()
        }))
    }

    async fn record_delivery(&self, id: Uuid, outcome: DeliveryOutcome) -> Result<()> {
        let mut state = self.lock()?;
        let Some(log) = state.outbox.iter_mut().find(|n| n.id == id) else {
            return Err(Error::NotFound(format!("notification {} not found", id)));
        };
        log.status = outcome.status;
        log.http_status = outcome.http_status;
        log.response_body = outcome.response_body;
        log.next_retry_at = outcome.next_retry_at;
        log.attempts += 1;
        log.updated_at = Utc::now();
        Ok(())
    }

    async fn get_notification(&self, id: Uuid) -> Result<Option<NotificationLog>> {
        Ok(self.lock()?.outbox.iter().find(|n| n.id == id).cloned())
    }
}
