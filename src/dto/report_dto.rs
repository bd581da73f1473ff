use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    Branch,
    Batch,
    Section,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct PerformanceQuery {
    pub group_by: GroupBy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPerformance {
    pub student_id: Uuid,
    pub name: String,
    pub attempts: usize,
    pub average_percentage: f64,
    pub marks_obtained: i64,
    pub total_marks: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceGroup {
    pub group: String,
    pub student_count: usize,
    pub attempts: usize,
    pub average_percentage: f64,
    pub students: Vec<StudentPerformance>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStatistics {
    pub test_id: Uuid,
    pub college_id: Option<Uuid>,
    pub assigned_count: usize,
    pub completed_count: usize,
    pub completion_rate: f64,
    pub average_score: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
    pub pass_rate: f64,
}

/// One row of the per-test report export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReportRow {
    pub student_id: Uuid,
    pub student_name: String,
    pub college_name: String,
    pub branch: String,
    pub batch: String,
    pub section: String,
    pub marks_obtained: Option<i32>,
    pub total_marks: i32,
    pub percentage: Option<f64>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct StatisticsQuery {
    pub college_id: Option<Uuid>,
}
