use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::catalog::AssignmentStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollegeAssignment {
    pub id: Uuid,
    pub test_id: Uuid,
    pub college_id: Uuid,
    pub assigned_by: Uuid,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl CollegeAssignment {
    pub fn pending(test_id: Uuid, college_id: Uuid, assigned_by: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            test_id,
            college_id,
            assigned_by,
            status: AssignmentStatus::Pending,
            assigned_at: now,
            accepted_at: None,
            rejected_at: None,
            is_active: true,
        }
    }

    /// Applies a decision to a pending assignment; `None` when not pending.
    pub fn decided(&self, decision: AssignmentStatus, at: DateTime<Utc>) -> Option<Self> {
        if self.status != AssignmentStatus::Pending || decision == AssignmentStatus::Pending {
            return None;
        }
        let mut next = self.clone();
        next.status = decision;
        match decision {
            AssignmentStatus::Accepted => next.accepted_at = Some(at),
            AssignmentStatus::Rejected => next.rejected_at = Some(at),
            AssignmentStatus::Pending => {}
        }
        Some(next)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAssignment {
    pub id: Uuid,
    pub test_id: Uuid,
    pub college_id: Uuid,
    pub college_assignment_id: Uuid,
    pub student_id: Uuid,
    pub assigned_by: Uuid,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub is_active: bool,
}
