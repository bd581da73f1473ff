use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::database::store::{AttemptFilter, SharedStore, StudentAssignmentFilter};
use crate::dto::report_dto::{
    GroupBy, PerformanceGroup, StudentPerformance, TestReportRow, TestStatistics,
};
use crate::error::{Error, Result};
use crate::models::attempt::Attempt;
use crate::models::directory::Student;
use crate::models::test::TestDefinition;
use crate::models::user::Actor;
use crate::services::grading_service::round2;

/// Percentage at or above which an attempt counts as a pass.
pub const PASS_MARK: f64 = 40.0;

#[derive(Clone)]
pub struct ReportService {
    store: SharedStore,
}

impl ReportService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    async fn load_test(&self, test_id: Uuid) -> Result<TestDefinition> {
        self.store
            .get_test(test_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))
    }

    pub async fn college_performance(
        &self,
        actor: &Actor,
        group_by: GroupBy,
    ) -> Result<Vec<PerformanceGroup>> {
        let college_id = actor.college_scope()?;
        let students = self.store.list_students(college_id).await?;
        let attempts = self
            .store
            .list_attempts(AttemptFilter {
                college_id: Some(college_id),
                ..Default::default()
            })
            .await?;
        Ok(group_performance(&students, &attempts, group_by))
    }

    pub async fn test_statistics(
        &self,
        test_id: Uuid,
        college_id: Option<Uuid>,
    ) -> Result<TestStatistics> {
        self.load_test(test_id).await?;
        let assigned = self
            .store
            .list_student_assignments(StudentAssignmentFilter {
                test_id: Some(test_id),
                college_id,
                ..Default::default()
            })
            .await?;
        let attempts = self
            .store
            .list_attempts(AttemptFilter {
                test_id: Some(test_id),
                college_id,
                ..Default::default()
            })
            .await?;
        Ok(compute_statistics(test_id, college_id, assigned.len(), &attempts))
    }

    /// One row per student who was targeted or has submitted.
    pub async fn test_report(&self, test_id: Uuid) -> Result<(TestDefinition, Vec<TestReportRow>)> {
        let test = self.load_test(test_id).await?;
        let assigned = self
            .store
            .list_student_assignments(StudentAssignmentFilter {
                test_id: Some(test_id),
                ..Default::default()
            })
            .await?;
        let attempts: HashMap<Uuid, Attempt> = self
            .store
            .list_attempts(AttemptFilter {
                test_id: Some(test_id),
                ..Default::default()
            })
            .await?
            .into_iter()
            .map(|a| (a.student_id, a))
            .collect();

        let mut student_ids: Vec<Uuid> = assigned.iter().map(|a| a.student_id).collect();
        for id in attempts.keys() {
            if !student_ids.contains(id) {
                student_ids.push(*id);
            }
        }

        let mut college_names: HashMap<Uuid, String> = HashMap::new();
        let mut rows = Vec::with_capacity(student_ids.len());
        for student_id in student_ids {
            let Some(student) = self.store.get_student(student_id).await? else {
                continue;
            };
            if !college_names.contains_key(&student.college_id) {
                let name = self
                    .store
                    .get_college(student.college_id)
                    .await?
                    .map(|c| c.name)
                    .unwrap_or_default();
                college_names.insert(student.college_id, name);
            }
            let attempt = attempts.get(&student_id);
            rows.push(TestReportRow {
                student_id,
                student_name: student.name,
                college_name: college_names
                    .get(&student.college_id)
                    .cloned()
                    .unwrap_or_default(),
                branch: student.branch,
                batch: student.batch,
                section: student.section,
                marks_obtained: attempt.map(|a| a.marks_obtained),
                total_marks: test.total_marks,
                percentage: attempt.map(|a| a.percentage),
                submitted_at: attempt.map(|a| a.end_time),
            });
        }
        rows.sort_by(|a, b| {
            a.college_name
                .cmp(&b.college_name)
                .then_with(|| a.student_name.cmp(&b.student_name))
        });
        Ok((test, rows))
    }
}

fn group_key(student: &Student, group_by: GroupBy) -> &str {
    match group_by {
        GroupBy::Branch => &student.branch,
        GroupBy::Batch => &student.batch,
        GroupBy::Section => &student.section,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    round2(values.iter().sum::<f64>() / values.len() as f64)
}

/// Per-student totals grouped by branch, batch or section. Students with no
/// attempts are listed with zeros. Groups and students are sorted by name.
pub fn group_performance(
    students: &[Student],
    attempts: &[Attempt],
    group_by: GroupBy,
) -> Vec<PerformanceGroup> {
    let mut by_student: HashMap<Uuid, Vec<&Attempt>> = HashMap::new();
    for attempt in attempts {
        by_student.entry(attempt.student_id).or_default().push(attempt);
    }

    let mut groups: BTreeMap<String, Vec<StudentPerformance>> = BTreeMap::new();
    let mut group_scores: HashMap<String, Vec<f64>> = HashMap::new();
    for student in students.iter().filter(|s| s.is_active) {
        let own = by_student.get(&student.id).map(Vec::as_slice).unwrap_or(&[]);
        let scores: Vec<f64> = own.iter().map(|a| a.percentage).collect();
        let key = group_key(student, group_by).to_string();
        group_scores.entry(key.clone()).or_default().extend(&scores);
        groups.entry(key).or_default().push(StudentPerformance {
            student_id: student.id,
            name: student.name.clone(),
            attempts: own.len(),
            average_percentage: mean(&scores),
            marks_obtained: own.iter().map(|a| a.marks_obtained as i64).sum(),
            total_marks: own.iter().map(|a| a.total_marks as i64).sum(),
        });
    }

    groups
        .into_iter()
        .map(|(group, mut students)| {
            students.sort_by(|a, b| a.name.cmp(&b.name));
            let scores = group_scores.remove(&group).unwrap_or_default();
            PerformanceGroup {
                student_count: students.len(),
                attempts: scores.len(),
                average_percentage: mean(&scores),
                group,
                students,
            }
        })
        .collect()
}

pub fn compute_statistics(
    test_id: Uuid,
    college_id: Option<Uuid>,
    assigned_count: usize,
    attempts: &[Attempt],
) -> TestStatistics {
    let completed_count = attempts.len();
    let scores: Vec<f64> = attempts.iter().map(|a| a.percentage).collect();
    let passed = scores.iter().filter(|p| **p >= PASS_MARK).count();

    let ratio = |part: usize, whole: usize| {
        if whole == 0 {
            0.0
        } else {
            round2((part as f64 / whole as f64 * 100.0).min(100.0))
        }
    };

    TestStatistics {
        test_id,
        college_id,
        assigned_count,
        completed_count,
        completion_rate: ratio(completed_count, assigned_count),
        average_score: mean(&scores),
        highest_score: scores.iter().copied().fold(None, |acc: Option<f64>, s| {
            Some(acc.map_or(s, |m| m.max(s)))
        })
        .unwrap_or(0.0),
        lowest_score: scores.iter().copied().fold(None, |acc: Option<f64>, s| {
            Some(acc.map_or(s, |m| m.min(s)))
        })
        .unwrap_or(0.0),
        pass_rate: ratio(passed, completed_count),
    }
}
