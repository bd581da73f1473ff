use std::collections::{HashMap, HashSet};

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::database::store::{
    AttemptFilter, CollegeAssignmentFilter, SharedStore, StudentAssignmentFilter,
};
use crate::dto::assignment_dto::{
    AssignCollegesResponse, CollegeAssignmentView, ResolveStudentsResponse, StudentFilters,
    StudentTestView, StudentTestsQuery,
};
use crate::error::{Error, Result};
use crate::models::assignment::{CollegeAssignment, StudentAssignment};
use crate::models::attempt::Participation;
use crate::models::catalog::AssignmentStatus;
use crate::models::directory::Student;
use crate::models::notification::{NotificationIntent, NotificationKind};
use crate::models::test::TestDefinition;
use crate::models::user::Actor;
use crate::services::notification_service::{notify_quietly, SharedNotifier};
use crate::utils::time::SharedClock;
use crate::utils::validation;

#[derive(Clone)]
pub struct AssignmentService {
    store: SharedStore,
    clock: SharedClock,
    notifier: SharedNotifier,
}

impl AssignmentService {
    pub fn new(store: SharedStore, clock: SharedClock, notifier: SharedNotifier) -> Self {
        Self {
            store,
            clock,
            notifier,
        }
    }

    async fn load_test(&self, test_id: Uuid) -> Result<TestDefinition> {
        self.store
            .get_test(test_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))
    }

    async fn load_college_assignment(&self, id: Uuid) -> Result<CollegeAssignment> {
        match self.store.get_college_assignment(id).await? {
            Some(a) if a.is_active => Ok(a),
            _ => Err(Error::NotFound(format!("Assignment {} not found", id))),
        }
    }

    /// Creates a pending assignment per distinct college that does not
    /// already hold an active one. Unknown colleges fail the whole call
    /// before anything is written.
    pub async fn assign_to_colleges(
        &self,
        actor: &Actor,
        test_id: Uuid,
        college_ids: &[Uuid],
    ) -> Result<AssignCollegesResponse> {
        let test = self.load_test(test_id).await?;
        if !test.is_active {
            return Err(Error::InvalidTransition(format!(
                "Test {} is inactive and cannot be assigned",
                test_id
            )));
        }

        let mut seen = HashSet::new();
        let targets: Vec<Uuid> = college_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let mut colleges = Vec::with_capacity(targets.len());
        for id in &targets {
            match self.store.get_college(*id).await? {
                Some(college) if college.is_active => colleges.push(college),
                _ => return Err(Error::NotFound(format!("College {} not found", id))),
            }
        }

        let mut created = 0;
        for college in colleges {
            let assignment = CollegeAssignment::pending(test.id, college.id, actor.id, self.clock.now());
            if !self.store.insert_college_assignment(&assignment).await? {
                continue;
            }
            created += 1;
            info!(
                assignment_id = %assignment.id,
                test_id = %test.id,
                college_id = %college.id,
                "college assignment created"
            );
            notify_quietly(
                self.notifier.as_ref(),
                NotificationIntent {
                    kind: NotificationKind::CollegeAssigned,
                    recipient_id: college.id,
                    recipient_email: college.email.clone(),
                    payload: json!({
                        "assignmentId": assignment.id,
                        "testId": test.id,
                        "testName": test.name,
                        "startAt": test.start_at,
                        "endAt": test.end_at,
                    }),
                },
            )
            .await;
        }

        Ok(AssignCollegesResponse {
            created,
            skipped: targets.len() - created,
        })
    }

    /// One-way decision out of `pending`, only by the owning college.
    pub async fn set_college_status(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        decision: AssignmentStatus,
    ) -> Result<CollegeAssignment> {
        if decision == AssignmentStatus::Pending {
            return Err(validation::single(
                "decision",
                "decision",
                "decision must be accepted or rejected",
            )
            .into());
        }

        let current = self.load_college_assignment(assignment_id).await?;
        actor.ensure_college(current.college_id)?;

        let Some(updated) = self
            .store
            .decide_college_assignment(assignment_id, decision, self.clock.now())
            .await?
        else {
            return Err(Error::InvalidTransition(format!(
                "Assignment {} has already been {}",
                assignment_id, current.status
            )));
        };

        info!(
            assignment_id = %updated.id,
            college_id = %updated.college_id,
            status = %updated.status,
            "college assignment decided"
        );
        notify_quietly(
            self.notifier.as_ref(),
            NotificationIntent {
                kind: NotificationKind::CollegeDecision,
                recipient_id: updated.assigned_by,
                recipient_email: None,
                payload: json!({
                    "assignmentId": updated.id,
                    "testId": updated.test_id,
                    "collegeId": updated.college_id,
                    "decision": updated.status,
                }),
            },
        )
        .await;
        Ok(updated)
    }

    /// Replaces the targeted student set for an accepted assignment.
    pub async fn resolve_students(
        &self,
        actor: &Actor,
        college_assignment_id: Uuid,
        filters: &StudentFilters,
    ) -> Result<ResolveStudentsResponse> {
        if filters.is_empty() {
            return Err(validation::single(
                "filters",
                "required",
                "Provide at least one of branches, batches, sections or specificStudents",
            )
            .into());
        }

        let assignment = self.load_college_assignment(college_assignment_id).await?;
        actor.ensure_college(assignment.college_id)?;
        if assignment.status != AssignmentStatus::Accepted {
            return Err(Error::InvalidTransition(format!(
                "Assignment {} must be accepted before targeting students (is {})",
                assignment.id, assignment.status
            )));
        }
        let test = self.load_test(assignment.test_id).await?;

        let students = self.store.list_students(assignment.college_id).await?;
        let matched = match_students(&students, filters);
        if matched.is_empty() {
            return Err(Error::NoMatch(
                "No active students in this college match the given criteria".to_string(),
            ));
        }

        let now = self.clock.now();
        let records: Vec<StudentAssignment> = matched
            .iter()
            .map(|student| StudentAssignment {
                id: Uuid::new_v4(),
                test_id: assignment.test_id,
                college_id: assignment.college_id,
                college_assignment_id: assignment.id,
                student_id: student.id,
                assigned_by: actor.id,
                status: AssignmentStatus::Accepted,
                assigned_at: now,
                is_active: true,
            })
            .collect();
        self.store
            .replace_student_assignments(assignment.test_id, assignment.college_id, &records)
            .await?;
        info!(
            assignment_id = %assignment.id,
            test_id = %assignment.test_id,
            resolved = records.len(),
            "students resolved"
        );

        for student in &matched {
            notify_quietly(
                self.notifier.as_ref(),
                NotificationIntent {
                    kind: NotificationKind::StudentAssigned,
                    recipient_id: student.id,
                    recipient_email: student.email.clone(),
                    payload: json!({
                        "testId": test.id,
                        "testName": test.name,
                        "startAt": test.start_at,
                        "endAt": test.end_at,
                        "durationMinutes": test.duration_minutes,
                    }),
                },
            )
            .await;
        }

        Ok(ResolveStudentsResponse {
            resolved_count: records.len(),
        })
    }

    pub async fn list_for_college(&self, actor: &Actor) -> Result<Vec<CollegeAssignmentView>> {
        let college_id = actor.college_scope()?;
        let rows = self
            .store
            .list_college_assignments(CollegeAssignmentFilter {
                college_id: Some(college_id),
                ..Default::default()
            })
            .await?;
        self.join_tests(rows).await
    }

    pub async fn list_for_test(&self, test_id: Uuid) -> Result<Vec<CollegeAssignmentView>> {
        self.load_test(test_id).await?;
        let rows = self
            .store
            .list_college_assignments(CollegeAssignmentFilter {
                test_id: Some(test_id),
                ..Default::default()
            })
            .await?;
        self.join_tests(rows).await
    }

    async fn join_tests(&self, rows: Vec<CollegeAssignment>) -> Result<Vec<CollegeAssignmentView>> {
        let mut cache: HashMap<Uuid, TestDefinition> = HashMap::new();
        let mut views = Vec::with_capacity(rows.len());
        for assignment in rows {
            if !cache.contains_key(&assignment.test_id) {
                match self.store.get_test(assignment.test_id).await? {
                    Some(test) => {
                        cache.insert(test.id, test);
                    }
                    None => continue,
                }
            }
            if let Some(test) = cache.get(&assignment.test_id) {
                views.push(CollegeAssignmentView {
                    test: test.summary(),
                    assignment,
                });
            }
        }
        Ok(views)
    }

    /// Tests assigned to the calling student with derived participation.
    pub async fn list_for_student(
        &self,
        actor: &Actor,
        query: &StudentTestsQuery,
    ) -> Result<Vec<StudentTestView>> {
        let student_id = actor.id;
        let assignments = self
            .store
            .list_student_assignments(StudentAssignmentFilter {
                student_id: Some(student_id),
                ..Default::default()
            })
            .await?;
        let attempted: HashSet<Uuid> = self
            .store
            .list_attempts(AttemptFilter {
                student_id: Some(student_id),
                ..Default::default()
            })
            .await?
            .into_iter()
            .map(|a| a.test_id)
            .collect();

        let now = self.clock.now();
        let mut views = Vec::new();
        for assignment in assignments {
            let Some(test) = self.store.get_test(assignment.test_id).await? else {
                continue;
            };
            if query.test_type.is_some_and(|t| t != test.test_type)
                || query.subject.is_some_and(|s| s != test.subject)
            {
                continue;
            }
            let has_attempted = attempted.contains(&test.id);
            views.push(StudentTestView {
                assignment_id: assignment.id,
                assigned_at: assignment.assigned_at,
                participation: Participation::derive(true, has_attempted, test.end_at, now),
                has_attempted,
                test: test.summary(),
            });
        }
        Ok(views)
    }

    pub async fn ensure_assigned(&self, test_id: Uuid, student_id: Uuid) -> Result<StudentAssignment> {
        self.store
            .find_active_student_assignment(test_id, student_id)
            .await?
            .ok_or_else(|| Error::NotAssigned(format!("Test {} is not assigned to you", test_id)))
    }
}

/// Active students matching ANY of the provided criteria.
pub fn match_students<'a>(students: &'a [Student], filters: &StudentFilters) -> Vec<&'a Student> {
    students
        .iter()
        .filter(|s| s.is_active)
        .filter(|s| {
            filters.branches.iter().any(|b| b == &s.branch)
                || filters.batches.iter().any(|b| b == &s.batch)
                || filters.sections.iter().any(|x| x == &s.section)
                || filters.specific_students.contains(&s.id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(branch: &str, batch: &str, section: &str, active: bool) -> Student {
        Student {
            id: Uuid::new_v4(),
            college_id: Uuid::new_v4(),
            name: format!("{}-{}-{}", branch, batch, section),
            email: None,
            branch: branch.into(),
            batch: batch.into(),
            section: section.into(),
            is_active: active,
        }
    }

    #[test]
    fn criteria_are_or_combined() {
        let roster = vec![
            student("CSE", "2025", "A", true),
            student("ECE", "2024", "B", true),
            student("MECH", "2023", "C", true),
        ];
        let filters = StudentFilters {
            branches: vec!["CSE".into()],
            sections: vec!["C".into()],
            ..Default::default()
        };
        let names: Vec<&str> = match_students(&roster, &filters)
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["CSE-2025-A", "MECH-2023-C"]);
    }

    #[test]
    fn inactive_students_never_match() {
        let roster = vec![student("CSE", "2025", "A", false)];
        let filters = StudentFilters {
            specific_students: vec![roster[0].id],
            ..Default::default()
        };
        assert!(match_students(&roster, &filters).is_empty());
    }
}
