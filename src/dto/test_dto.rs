use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::catalog::{Difficulty, Subject, TestType};

/// Options as typed by the author; presence is checked field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsInput {
    #[serde(rename = "A", default)]
    pub a: Option<String>,
    #[serde(rename = "B", default)]
    pub b: Option<String>,
    #[serde(rename = "C", default)]
    pub c: Option<String>,
    #[serde(rename = "D", default)]
    pub d: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    pub text: String,
    #[serde(default)]
    pub options: OptionsInput,
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionInput {
    pub name: String,
    pub duration_minutes: i32,
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestPayload {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub subject: Subject,
    pub test_type: TestType,
    pub company_name: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub difficulty: Difficulty,
    #[validate(range(min = 1, max = 100, message = "Number of questions must be between 1 and 100"))]
    pub number_of_questions: i32,
    #[validate(range(min = 1, max = 10, message = "Marks per question must be between 1 and 10"))]
    pub marks_per_question: i32,
    #[validate(range(min = 5, max = 300, message = "Duration must be between 5 and 300 minutes"))]
    pub duration_minutes: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    /// Flat question list; mutually exclusive with `sections`.
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
    #[serde(default)]
    pub sections: Vec<SectionInput>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ListTestsQuery {
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSamplePayload {
    pub subject: Subject,
    #[validate(range(min = 1, max = 100, message = "Count must be between 1 and 100"))]
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraftsResponse {
    pub count: usize,
    pub questions: Vec<QuestionInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTestResponse {
    pub id: uuid::Uuid,
    pub name: String,
    pub total_marks: i32,
    pub question_count: i32,
    pub created_at: DateTime<Utc>,
}
