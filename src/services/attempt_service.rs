use chrono::Duration;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::database::store::{AttemptFilter, SharedStore};
use crate::dto::attempt_dto::{
    AttemptHistoryItem, AttemptResultsResponse, BeginAttemptResponse, QuestionResult,
    SubmitAttemptPayload, SubmitAttemptResponse,
};
use crate::error::{Error, Result};
use crate::models::attempt::{Attempt, AttemptStatus};
use crate::models::notification::{NotificationIntent, NotificationKind};
use crate::models::test::TestDefinition;
use crate::services::grading_service::GradingService;
use crate::services::notification_service::{notify_quietly, SharedNotifier};
use crate::utils::time::SharedClock;
use crate::utils::validation;

#[derive(Clone)]
pub struct AttemptService {
    store: SharedStore,
    clock: SharedClock,
    notifier: SharedNotifier,
    /// Extra time after `end_at` during which a submission is still taken.
    grace: Duration,
}

impl AttemptService {
    pub fn new(
        store: SharedStore,
        clock: SharedClock,
        notifier: SharedNotifier,
        grace_seconds: i64,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            grace: Duration::seconds(grace_seconds.max(0)),
        }
    }

    async fn load_test(&self, test_id: Uuid) -> Result<TestDefinition> {
        self.store
            .get_test(test_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))
    }

    /// Assignment, then idempotency. Returns the college the student was
    /// assigned through.
    async fn guard(&self, test_id: Uuid, student_id: Uuid) -> Result<Uuid> {
        let assignment = self
            .store
            .find_active_student_assignment(test_id, student_id)
            .await?
            .ok_or_else(|| Error::NotAssigned(format!("Test {} is not assigned to you", test_id)))?;
        if self.store.find_attempt(test_id, student_id).await?.is_some() {
            return Err(Error::AlreadyAttempted(format!(
                "Test {} has already been submitted",
                test_id
            )));
        }
        Ok(assignment.college_id)
    }

    pub async fn begin_attempt(&self, test_id: Uuid, student_id: Uuid) -> Result<BeginAttemptResponse> {
        let test = self.load_test(test_id).await?;
        self.guard(test_id, student_id).await?;

        let now = self.clock.now();
        test.check_window(now, Duration::zero()).map_err(Error::Window)?;

        let deadline = (now + Duration::minutes(test.duration_minutes as i64)).min(test.end_at);
        info!(test_id = %test_id, student_id = %student_id, %deadline, "attempt started");
        Ok(BeginAttemptResponse {
            test: test.redacted(),
            started_at: now,
            deadline,
        })
    }

    /// Grades and stores the single attempt for (test, student). Nothing is
    /// written unless every check passes.
    pub async fn submit_attempt(
        &self,
        test_id: Uuid,
        student_id: Uuid,
        payload: SubmitAttemptPayload,
    ) -> Result<SubmitAttemptResponse> {
        validation::validate(&payload)?;
        let test = self.load_test(test_id).await?;
        let college_id = self.guard(test_id, student_id).await?;

        let now = self.clock.now();
        test.check_window(now, self.grace).map_err(Error::Window)?;

        GradingService::check_answers(&test, &payload.answers)?;
        let graded = GradingService::grade(&test, &payload.answers);

        let attempt = Attempt {
            id: Uuid::new_v4(),
            test_id,
            student_id,
            college_id,
            start_time: payload.start_time,
            end_time: now,
            time_spent_minutes: payload.time_spent,
            answers: graded.answers.clone(),
            total_marks: graded.total_marks,
            marks_obtained: graded.marks_obtained,
            percentage: graded.percentage,
            correct_answers: graded.correct_answers,
            incorrect_answers: graded.incorrect_answers,
            status: AttemptStatus::Completed,
        };
        if !self.store.insert_attempt(&attempt).await? {
            return Err(Error::AlreadyAttempted(format!(
                "Test {} has already been submitted",
                test_id
            )));
        }
        info!(
            attempt_id = %attempt.id,
            test_id = %test_id,
            student_id = %student_id,
            marks = attempt.marks_obtained,
            percentage = attempt.percentage,
            "attempt submitted"
        );

        notify_quietly(
            self.notifier.as_ref(),
            NotificationIntent {
                kind: NotificationKind::AttemptSubmitted,
                recipient_id: student_id,
                recipient_email: None,
                payload: json!({
                    "attemptId": attempt.id,
                    "testId": test.id,
                    "testName": test.name,
                    "submittedAt": attempt.end_time,
                }),
            },
        )
        .await;

        let instant_feedback = test
            .is_practice()
            .then(|| GradingService::instant_feedback(&test, &graded));

        Ok(SubmitAttemptResponse {
            attempt_id: attempt.id,
            total_marks: attempt.total_marks,
            marks_obtained: attempt.marks_obtained,
            percentage: attempt.percentage,
            correct_answers: attempt.correct_answers,
            incorrect_answers: attempt.incorrect_answers,
            time_spent_minutes: attempt.time_spent_minutes,
            submitted_at: attempt.end_time,
            instant_feedback,
        })
    }

    pub async fn get_results(&self, test_id: Uuid, student_id: Uuid) -> Result<AttemptResultsResponse> {
        let attempt = self
            .store
            .find_attempt(test_id, student_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No submission found for test {}", test_id)))?;
        let test = self.load_test(test_id).await?;

        let mut questions = Vec::with_capacity(attempt.answers.len());
        for section in &test.sections {
            for question in &section.questions {
                let record = attempt.answers.iter().find(|a| a.question_id == question.id);
                questions.push(QuestionResult {
                    question_id: question.id,
                    section: section.name.clone(),
                    text: question.text.clone(),
                    options: question.options.clone(),
                    correct_answer: question.correct_answer,
                    selected_answer: record.and_then(|r| r.selected_answer.clone()),
                    is_correct: record.is_some_and(|r| r.is_correct),
                    marks: question.marks,
                    marks_obtained: record.map_or(0, |r| r.marks_obtained),
                    time_spent: record.and_then(|r| r.time_spent),
                });
            }
        }

        Ok(AttemptResultsResponse {
            attempt_id: attempt.id,
            test_id,
            test_name: test.name,
            total_marks: attempt.total_marks,
            marks_obtained: attempt.marks_obtained,
            percentage: attempt.percentage,
            correct_answers: attempt.correct_answers,
            incorrect_answers: attempt.incorrect_answers,
            start_time: attempt.start_time,
            end_time: attempt.end_time,
            time_spent_minutes: attempt.time_spent_minutes,
            questions,
        })
    }

    pub async fn history(&self, student_id: Uuid) -> Result<Vec<AttemptHistoryItem>> {
        let attempts = self
            .store
            .list_attempts(AttemptFilter {
                student_id: Some(student_id),
                ..Default::default()
            })
            .await?;

        let mut items = Vec::with_capacity(attempts.len());
        for attempt in attempts {
            let test_name = self
                .store
                .get_test(attempt.test_id)
                .await?
                .map(|t| t.name)
                .unwrap_or_default();
            items.push(AttemptHistoryItem {
                attempt_id: attempt.id,
                test_id: attempt.test_id,
                test_name,
                marks_obtained: attempt.marks_obtained,
                total_marks: attempt.total_marks,
                percentage: attempt.percentage,
                submitted_at: attempt.end_time,
            });
        }
        Ok(items)
    }
}
