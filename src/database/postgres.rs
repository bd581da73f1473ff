use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use uuid::Uuid;

use crate::database::store::{
    AssignmentStore, AttemptFilter, AttemptStore, CatalogStore, CollegeAssignmentFilter,
    DirectoryStore, OutboxStore, StudentAssignmentFilter,
};
use crate::error::{Error, Result};
use crate::models::assignment::{CollegeAssignment, StudentAssignment};
use crate::models::attempt::{AnswerRecord, Attempt, AttemptStatus};
use crate::models::catalog::AssignmentStatus;
use crate::models::directory::{College, Student};
use crate::models::notification::{DeliveryOutcome, DeliveryStatus, NotificationLog};
use crate::models::test::{Section, TestDefinition};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_column<T>(raw: &str, column: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse()
        .map_err(|e| Error::Internal(format!("corrupt {} column: {}", column, e)))
}

#[derive(FromRow)]
struct TestRow {
    id: Uuid,
    name: String,
    description: String,
    subject: String,
    test_type: String,
    company_name: Option<String>,
    topics: Json<Vec<String>>,
    difficulty: String,
    question_count: i32,
    marks_per_question: i32,
    total_marks: i32,
    duration_minutes: i32,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    sections: Json<Vec<Section>>,
    created_by: Uuid,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<TestRow> for TestDefinition {
    type Error = Error;

    fn try_from(row: TestRow) -> Result<Self> {
        Ok(TestDefinition {
            id: row.id,
            name: row.name,
            description: row.description,
            subject: parse_column(&row.subject, "subject")?,
            test_type: parse_column(&row.test_type, "test_type")?,
            company_name: row.company_name,
            topics: row.topics.0,
            difficulty: parse_column(&row.difficulty, "difficulty")?,
            question_count: row.question_count,
            marks_per_question: row.marks_per_question,
            total_marks: row.total_marks,
            duration_minutes: row.duration_minutes,
            start_at: row.start_at,
            end_at: row.end_at,
            sections: row.sections.0,
            created_by: row.created_by,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct CollegeAssignmentRow {
    id: Uuid,
    test_id: Uuid,
    college_id: Uuid,
    assigned_by: Uuid,
    status: String,
    assigned_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
    rejected_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl TryFrom<CollegeAssignmentRow> for CollegeAssignment {
    type Error = Error;

    fn try_from(row: CollegeAssignmentRow) -> Result<Self> {
        Ok(CollegeAssignment {
            id: row.id,
            test_id: row.test_id,
            college_id: row.college_id,
            assigned_by: row.assigned_by,
            status: parse_column(&row.status, "status")?,
            assigned_at: row.assigned_at,
            accepted_at: row.accepted_at,
            rejected_at: row.rejected_at,
            is_active: row.is_active,
        })
    }
}

#[derive(FromRow)]
struct StudentAssignmentRow {
    id: Uuid,
    test_id: Uuid,
    college_id: Uuid,
    college_assignment_id: Uuid,
    student_id: Uuid,
    assigned_by: Uuid,
    status: String,
    assigned_at: DateTime<Utc>,
    is_active: bool,
}

impl TryFrom<StudentAssignmentRow> for StudentAssignment {
    type Error = Error;

    fn try_from(row: StudentAssignmentRow) -> Result<Self> {
        Ok(StudentAssignment {
            id: row.id,
            test_id: row.test_id,
            college_id: row.college_id,
            college_assignment_id: row.college_assignment_id,
            student_id: row.student_id,
            assigned_by: row.assigned_by,
            status: parse_column(&row.status, "status")?,
            assigned_at: row.assigned_at,
            is_active: row.is_active,
        })
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: Uuid,
    test_id: Uuid,
    student_id: Uuid,
    college_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    time_spent_minutes: i32,
    answers: Json<Vec<AnswerRecord>>,
    total_marks: i32,
    marks_obtained: i32,
    percentage: f64,
    correct_answers: i32,
    incorrect_answers: i32,
}

impl From<AttemptRow> for Attempt {
    fn from(row: AttemptRow) -> Self {
        Attempt {
            id: row.id,
            test_id: row.test_id,
            student_id: row.student_id,
            college_id: row.college_id,
            start_time: row.start_time,
            end_time: row.end_time,
            time_spent_minutes: row.time_spent_minutes,
            answers: row.answers.0,
            total_marks: row.total_marks,
            marks_obtained: row.marks_obtained,
            percentage: row.percentage,
            correct_answers: row.correct_answers,
            incorrect_answers: row.incorrect_answers,
            status: AttemptStatus::Completed,
        }
    }
}

#[derive(FromRow)]
struct NotificationRow {
    id: Uuid,
    event_type: String,
    recipient_id: Uuid,
    recipient_email: Option<String>,
    payload: serde_json::Value,
    status: String,
    attempts: i32,
    max_attempts: i32,
    http_status: Option<i32>,
    response_body: Option<String>,
    next_retry_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for NotificationLog {
    type Error = Error;

    fn try_from(row: NotificationRow) -> Result<Self> {
        let status = DeliveryStatus::parse(&row.status)
            .ok_or_else(|| Error::Internal(format!("corrupt status column: {}", row.status)))?;
        Ok(NotificationLog {
            id: row.id,
            event_type: row.event_type,
            recipient_id: row.recipient_id,
            recipient_email: row.recipient_email,
            payload: row.payload,
            status,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            http_status: row.http_status,
            response_body: row.response_body,
            next_retry_at: row.next_retry_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = Error>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn insert_test(&self, test: &TestDefinition) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tests (
                id, name, description, subject, test_type, company_name, topics,
                difficulty, question_count, marks_per_question, total_marks,
                duration_minutes, start_at, end_at, sections, created_by, is_active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(test.id)
        .bind(&test.name)
        .bind(&test.description)
        .bind(test.subject.as_str())
        .bind(test.test_type.as_str())
        .bind(&test.company_name)
        .bind(Json(&test.topics))
        .bind(test.difficulty.as_str())
        .bind(test.question_count)
        .bind(test.marks_per_question)
        .bind(test.total_marks)
        .bind(test.duration_minutes)
        .bind(test.start_at)
        .bind(test.end_at)
        .bind(Json(&test.sections))
        .bind(test.created_by)
        .bind(test.is_active)
        .bind(test.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_test(&self, id: Uuid) -> Result<Option<TestDefinition>> {
        let row = sqlx::query_as::<_, TestRow>(r#"SELECT * FROM tests WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TestDefinition::try_from).transpose()
    }

    async fn list_tests(&self, is_active: Option<bool>) -> Result<Vec<TestDefinition>> {
        let rows = sqlx::query_as::<_, TestRow>(
            r#"
            SELECT * FROM tests
            WHERE ($1::bool IS NULL OR is_active = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(is_active)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn set_test_active(&self, id: Uuid, is_active: bool) -> Result<bool> {
        let result = sqlx::query(r#"UPDATE tests SET is_active = $1 WHERE id = $2"#)
            .bind(is_active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DirectoryStore for PgStore {
    async fn upsert_college(&self, college: &College) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO colleges (id, name, email, is_active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, email = EXCLUDED.email, is_active = EXCLUDED.is_active
            "#,
        )
        .bind(college.id)
        .bind(&college.name)
        .bind(&college.email)
        .bind(college.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_college(&self, id: Uuid) -> Result<Option<College>> {
        let row = sqlx::query_as::<_, (Uuid, String, Option<String>, bool)>(
            r#"SELECT id, name, email, is_active FROM colleges WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name, email, is_active)| College {
            id,
            name,
            email,
            is_active,
        }))
    }

    async fn upsert_student(&self, student: &Student) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO students (id, college_id, name, email, branch, batch, section, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE
            SET college_id = EXCLUDED.college_id, name = EXCLUDED.name, email = EXCLUDED.email,
                branch = EXCLUDED.branch, batch = EXCLUDED.batch, section = EXCLUDED.section,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(student.id)
        .bind(student.college_id)
        .bind(&student.name)
        .bind(&student.email)
        .bind(&student.branch)
        .bind(&student.batch)
        .bind(&student.section)
        .bind(student.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_student(&self, id: Uuid) -> Result<Option<Student>> {
        let row = sqlx::query_as::<_, StudentRow>(r#"SELECT * FROM students WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Student::from))
    }

    async fn list_students(&self, college_id: Uuid) -> Result<Vec<Student>> {
        let rows = sqlx::query_as::<_, StudentRow>(
            r#"SELECT * FROM students WHERE college_id = $1 ORDER BY name ASC"#,
        )
        .bind(college_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Student::from).collect())
    }
}

#[derive(FromRow)]
struct StudentRow {
    id: Uuid,
    college_id: Uuid,
    name: String,
    email: Option<String>,
    branch: String,
    batch: String,
    section: String,
    is_active: bool,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Student {
            id: row.id,
            college_id: row.college_id,
            name: row.name,
            email: row.email,
            branch: row.branch,
            batch: row.batch,
            section: row.section,
            is_active: row.is_active,
        }
    }
}

#[async_trait]
impl AssignmentStore for PgStore {
    async fn find_active_college_assignment(
        &self,
        test_id: Uuid,
        college_id: Uuid,
    ) -> Result<Option<CollegeAssignment>> {
        let row = sqlx::query_as::<_, CollegeAssignmentRow>(
            r#"
            SELECT * FROM college_assignments
            WHERE test_id = $1 AND college_id = $2 AND is_active
            "#,
        )
        .bind(test_id)
        .bind(college_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CollegeAssignment::try_from).transpose()
    }

    async fn insert_college_assignment(&self, assignment: &CollegeAssignment) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO college_assignments (
                id, test_id, college_id, assigned_by, status, assigned_at,
                accepted_at, rejected_at, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (test_id, college_id) WHERE is_active DO NOTHING
            "#,
        )
        .bind(assignment.id)
        .bind(assignment.test_id)
        .bind(assignment.college_id)
        .bind(assignment.assigned_by)
        .bind(assignment.status.as_str())
        .bind(assignment.assigned_at)
        .bind(assignment.accepted_at)
        .bind(assignment.rejected_at)
        .bind(assignment.is_active)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_college_assignment(&self, id: Uuid) -> Result<Option<CollegeAssignment>> {
        let row = sqlx::query_as::<_, CollegeAssignmentRow>(
            r#"SELECT * FROM college_assignments WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CollegeAssignment::try_from).transpose()
    }

    async fn decide_college_assignment(
        &self,
        id: Uuid,
        decision: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<CollegeAssignment>> {
        if decision == AssignmentStatus::Pending {
            return Ok(None);
        }
        let row = sqlx::query_as::<_, CollegeAssignmentRow>(
            r#"
            UPDATE college_assignments
            SET status = $2,
                accepted_at = CASE WHEN $2 = 'accepted' THEN $3 ELSE accepted_at END,
                rejected_at = CASE WHEN $2 = 'rejected' THEN $3 ELSE rejected_at END
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(decision.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CollegeAssignment::try_from).transpose()
    }

    async fn list_college_assignments(
        &self,
        filter: CollegeAssignmentFilter,
    ) -> Result<Vec<CollegeAssignment>> {
        let rows = sqlx::query_as::<_, CollegeAssignmentRow>(
            r#"
            SELECT * FROM college_assignments
            WHERE is_active
              AND ($1::uuid IS NULL OR test_id = $1)
              AND ($2::uuid IS NULL OR college_id = $2)
            ORDER BY assigned_at DESC
            "#,
        )
        .bind(filter.test_id)
        .bind(filter.college_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn replace_student_assignments(
        &self,
        test_id: Uuid,
        college_id: Uuid,
        records: &[StudentAssignment],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE student_assignments SET is_active = FALSE
            WHERE test_id = $1 AND college_id = $2 AND is_active
            "#,
        )
        .bind(test_id)
        .bind(college_id)
        .execute(&mut *tx)
        .await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO student_assignments (
                    id, test_id, college_id, college_assignment_id, student_id,
                    assigned_by, status, assigned_at, is_active
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(record.id)
            .bind(record.test_id)
            .bind(record.college_id)
            .bind(record.college_assignment_id)
            .bind(record.student_id)
            .bind(record.assigned_by)
            .bind(record.status.as_str())
            .bind(record.assigned_at)
            .bind(record.is_active)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_active_student_assignment(
        &self,
        test_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<StudentAssignment>> {
        let row = sqlx::query_as::<_, StudentAssignmentRow>(
            r#"
            SELECT * FROM student_assignments
            WHERE test_id = $1 AND student_id = $2 AND is_active
            LIMIT 1
            "#,
        )
        .bind(test_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(StudentAssignment::try_from).transpose()
    }

    async fn list_student_assignments(
        &self,
        filter: StudentAssignmentFilter,
    ) -> Result<Vec<StudentAssignment>> {
        let rows = sqlx::query_as::<_, StudentAssignmentRow>(
            r#"
            SELECT * FROM student_assignments
            WHERE is_active
              AND ($1::uuid IS NULL OR test_id = $1)
              AND ($2::uuid IS NULL OR college_id = $2)
              AND ($3::uuid IS NULL OR student_id = $3)
            ORDER BY assigned_at DESC
            "#,
        )
        .bind(filter.test_id)
        .bind(filter.college_id)
        .bind(filter.student_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn insert_attempt(&self, attempt: &Attempt) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO attempts (
                id, test_id, student_id, college_id, start_time, end_time,
                time_spent_minutes, answers, total_marks, marks_obtained, percentage,
                correct_answers, incorrect_answers, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 'completed')
            ON CONFLICT (test_id, student_id) DO NOTHING
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.test_id)
        .bind(attempt.student_id)
        .bind(attempt.college_id)
        .bind(attempt.start_time)
        .bind(attempt.end_time)
        .bind(attempt.time_spent_minutes)
        .bind(Json(&attempt.answers))
        .bind(attempt.total_marks)
        .bind(attempt.marks_obtained)
        .bind(attempt.percentage)
        .bind(attempt.correct_answers)
        .bind(attempt.incorrect_answers)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_attempt(&self, test_id: Uuid, student_id: Uuid) -> Result<Option<Attempt>> {
        let row = sqlx::query_as::<_, AttemptRow>(
            r#"SELECT * FROM attempts WHERE test_id = $1 AND student_id = $2"#,
        )
        .bind(test_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Attempt::from))
    }

    async fn list_attempts(&self, filter: AttemptFilter) -> Result<Vec<Attempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            r#"
            SELECT * FROM attempts
            WHERE ($1::uuid IS NULL OR test_id = $1)
              AND ($2::uuid IS NULL OR college_id = $2)
              AND ($3::uuid IS NULL OR student_id = $3)
            ORDER BY end_time DESC
            "#,
        )
        .bind(filter.test_id)
        .bind(filter.college_id)
        .bind(filter.student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Attempt::from).collect())
    }
}

#[async_trait]
impl OutboxStore for PgStore {
    async fn enqueue_notification(&self, log: &NotificationLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_logs (
                id, event_type, recipient_id, recipient_email, payload, status,
                attempts, max_attempts, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(log.id)
        .bind(&log.event_type)
        .bind(log.recipient_id)
        .bind(&log.recipient_email)
        .bind(&log.payload)
        .bind(log.status.as_str())
        .bind(log.attempts)
        .bind(log.max_attempts)
        .bind(log.created_at)
        .bind(log.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_pending_notification(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<NotificationLog>> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            UPDATE notification_logs
            SET status = 'sending', next_retry_at = $2, updated_at = $1
            WHERE id = (
                SELECT id FROM notification_logs
                WHERE status IN ('pending', 'sending')
                  AND (next_retry_at IS NULL OR next_retry_at <= $1)
                ORDER BY created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(lease_until)
        .fetch_optional(&self.pool)
        .await?;
        row.map(NotificationLog::try_from).transpose()
    }

    async fn record_delivery(&self, id: Uuid, outcome: DeliveryOutcome) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE notification_logs
            SET status = $2, http_status = $3, response_body = $4, next_retry_at = $5,
                attempts = attempts + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(outcome.status.as_str())
        .bind(outcome.http_status)
        .bind(outcome.response_body)
        .bind(outcome.next_retry_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_notification(&self, id: Uuid) -> Result<Option<NotificationLog>> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"SELECT * FROM notification_logs WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(NotificationLog::try_from).transpose()
    }
}
