use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::assignment::CollegeAssignment;
use crate::models::attempt::Participation;
use crate::models::catalog::{AssignmentStatus, Subject, TestType};
use crate::models::test::TestSummary;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignCollegesPayload {
    #[validate(length(min = 1, message = "At least one college is required"))]
    pub college_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignCollegesResponse {
    pub created: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollegeDecisionPayload {
    pub decision: AssignmentStatus,
}

/// Targeting criteria: OR across the provided lists, AND with college scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StudentFilters {
    pub branches: Vec<String>,
    pub batches: Vec<String>,
    pub sections: Vec<String>,
    pub specific_students: Vec<Uuid>,
}

impl StudentFilters {
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
            && self.batches.is_empty()
            && self.sections.is_empty()
            && self.specific_students.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveStudentsResponse {
    pub resolved_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollegeAssignmentView {
    #[serde(flatten)]
    pub assignment: CollegeAssignment,
    pub test: TestSummary,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct StudentTestsQuery {
    #[serde(rename = "type")]
    pub test_type: Option<TestType>,
    pub subject: Option<Subject>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTestView {
    pub assignment_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub test: TestSummary,
    pub has_attempted: bool,
    pub participation: Participation,
}
