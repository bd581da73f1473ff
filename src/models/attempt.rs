use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: i32,
    /// Raw label the student sent; unrecognized labels are kept for review.
    pub selected_answer: Option<String>,
    pub is_correct: bool,
    pub marks_obtained: i32,
    pub time_spent: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: Uuid,
    pub test_id: Uuid,
    pub student_id: Uuid,
    pub college_id: Uuid,
    /// Client-declared; stored for reporting only.
    pub start_time: DateTime<Utc>,
    /// Server clock at submission.
    pub end_time: DateTime<Utc>,
    /// Client-declared; stored for reporting only.
    pub time_spent_minutes: i32,
    pub answers: Vec<AnswerRecord>,
    pub total_marks: i32,
    pub marks_obtained: i32,
    pub percentage: f64,
    pub correct_answers: i32,
    pub incorrect_answers: i32,
    pub status: AttemptStatus,
}

/// Where a student stands on one test. Derived from records, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Participation {
    Unassigned,
    Assigned,
    Expired,
    Attempted,
}

impl Participation {
    pub fn derive(
        assigned: bool,
        attempted: bool,
        end_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        if attempted {
            Participation::Attempted
        } else if !assigned {
            Participation::Unassigned
        } else if now >= end_at {
            Participation::Expired
        } else {
            Participation::Assigned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn attempted_is_terminal_even_after_the_window() {
        let end = Utc::now();
        let after = end + Duration::minutes(5);
        assert_eq!(Participation::derive(true, true, end, after), Participation::Attempted);
    }

    #[test]
    fn expiry_starts_exactly_at_end() {
        let end = Utc::now();
        assert_eq!(Participation::derive(true, false, end, end), Participation::Expired);
        assert_eq!(
            Participation::derive(true, false, end, end - Duration::seconds(1)),
            Participation::Assigned
        );
        assert_eq!(Participation::derive(false, false, end, end), Participation::Unassigned);
    }
}
