use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::catalog::OptionLabel;
use crate::models::question::QuestionOptions;
use crate::models::test::PublicTest;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginAttemptResponse {
    pub test: PublicTest,
    /// Server-observed start; the client echoes it back as `startTime`.
    pub started_at: DateTime<Utc>,
    /// Earlier of start + duration and the window end.
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    pub question_id: i32,
    pub selected_answer: Option<String>,
    pub time_spent: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptPayload {
    pub answers: Vec<AnswerInput>,
    pub start_time: DateTime<Utc>,
    #[validate(range(min = 0, message = "Time spent cannot be negative"))]
    pub time_spent: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantFeedback {
    pub question_id: i32,
    pub selected_answer: Option<String>,
    pub correct_answer: OptionLabel,
    pub is_correct: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptResponse {
    pub attempt_id: Uuid,
    pub total_marks: i32,
    pub marks_obtained: i32,
    pub percentage: f64,
    pub correct_answers: i32,
    pub incorrect_answers: i32,
    pub time_spent_minutes: i32,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instant_feedback: Option<Vec<InstantFeedback>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: i32,
    pub section: String,
    pub text: String,
    pub options: QuestionOptions,
    pub correct_answer: OptionLabel,
    pub selected_answer: Option<String>,
    pub is_correct: bool,
    pub marks: i32,
    pub marks_obtained: i32,
    pub time_spent: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResultsResponse {
    pub attempt_id: Uuid,
    pub test_id: Uuid,
    pub test_name: String,
    pub total_marks: i32,
    pub marks_obtained: i32,
    pub percentage: f64,
    pub correct_answers: i32,
    pub incorrect_answers: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub time_spent_minutes: i32,
    pub questions: Vec<QuestionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptHistoryItem {
    pub attempt_id: Uuid,
    pub test_id: Uuid,
    pub test_name: String,
    pub marks_obtained: i32,
    pub total_marks: i32,
    pub percentage: f64,
    pub submitted_at: DateTime<Utc>,
}
