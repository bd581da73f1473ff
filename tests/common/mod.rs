#![allow(dead_code)]

use std::sync::Arc;

use campus_assessment::{
    config::{Config, LogFormat},
    database::{memory::MemoryStore, store::SharedStore},
    dto::{
        attempt_dto::{AnswerInput, SubmitAttemptPayload},
        test_dto::{CreateTestPayload, OptionsInput, QuestionInput},
    },
    middleware::auth::Claims,
    models::{
        catalog::{AssignmentStatus, Difficulty, Subject, TestType},
        directory::{College, Student},
        test::TestDefinition,
        user::{Actor, Role},
    },
    services::notification_service::SharedNotifier,
    utils::time::{ManualClock, SharedClock},
    AppState,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_key";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub fn config() -> Config {
    Config {
        server_address: "127.0.0.1:0".into(),
        database_url: None,
        jwt_secret: JWT_SECRET.into(),
        webhook_secret: "whsec_test".into(),
        notification_webhook_url: None,
        api_rps: 1000,
        submission_grace_seconds: 0,
        openai_api_key: None,
        ai_model: "gpt-4o".into(),
        max_generated_questions: 50,
        cors_origins: vec![],
        trusted_proxies: vec![],
        log_format: LogFormat::Text,
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub state: AppState,
    pub master: Actor,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let shared_store: SharedStore = store.clone();
        let shared_clock: SharedClock = clock.clone();
        let state = AppState::new(shared_store, shared_clock, &config).unwrap();
        Self {
            store,
            clock,
            state,
            master: master(),
        }
    }

    pub fn with_notifier(notifier: SharedNotifier) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let shared_store: SharedStore = store.clone();
        let shared_clock: SharedClock = clock.clone();
        let state =
            AppState::with_notifier(shared_store, shared_clock, notifier, &config()).unwrap();
        Self {
            store,
            clock,
            state,
            master: master(),
        }
    }

    pub async fn college(&self, name: &str) -> College {
        let college = College {
            id: Uuid::new_v4(),
            name: name.into(),
            email: Some(format!("{}@example.edu", name.to_lowercase().replace(' ', "."))),
            is_active: true,
        };
        use campus_assessment::database::store::DirectoryStore;
        self.store.upsert_college(&college).await.unwrap();
        college
    }

    pub async fn student(
        &self,
        college: &College,
        name: &str,
        branch: &str,
        batch: &str,
        section: &str,
    ) -> Student {
        let student = Student {
            id: Uuid::new_v4(),
            college_id: college.id,
            name: name.into(),
            email: None,
            branch: branch.into(),
            batch: batch.into(),
            section: section.into(),
            is_active: true,
        };
        use campus_assessment::database::store::DirectoryStore;
        self.store.upsert_student(&student).await.unwrap();
        student
    }

    pub async fn create_test(&self, test_type: TestType, correct: &[&str]) -> TestDefinition {
        self.state
            .catalog_service
            .create_test(test_payload(test_type, correct, 5), &self.master)
            .await
            .unwrap()
    }

    /// Test assigned to `college`, accepted, and targeted at `students`.
    pub async fn deliver(&self, test: &TestDefinition, college: &College, students: &[&Student]) {
        let svc = &self.state.assignment_service;
        svc.assign_to_colleges(&self.master, test.id, &[college.id])
            .await
            .unwrap();
        let assignment = svc.list_for_test(test.id).await.unwrap()[0].assignment.clone();
        svc.set_college_status(&admin(college), assignment.id, AssignmentStatus::Accepted)
            .await
            .unwrap();
        svc.resolve_students(
            &admin(college),
            assignment.id,
            &campus_assessment::dto::assignment_dto::StudentFilters {
                specific_students: students.iter().map(|s| s.id).collect(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }
}

pub fn master() -> Actor {
    Actor {
        id: Uuid::new_v4(),
        role: Role::Master,
        college_id: None,
    }
}

pub fn admin(college: &College) -> Actor {
    Actor {
        id: Uuid::from_u128(college.id.as_u128() ^ 1),
        role: Role::CollegeAdmin,
        college_id: Some(college.id),
    }
}

pub fn faculty(college: &College) -> Actor {
    Actor {
        id: Uuid::from_u128(college.id.as_u128() ^ 2),
        role: Role::Faculty,
        college_id: Some(college.id),
    }
}

pub fn as_actor(student: &Student) -> Actor {
    Actor {
        id: student.id,
        role: Role::Student,
        college_id: Some(student.college_id),
    }
}

pub fn question(text: &str, correct: &str) -> QuestionInput {
    QuestionInput {
        text: text.into(),
        options: OptionsInput {
            a: Some("alpha".into()),
            b: Some("beta".into()),
            c: Some("gamma".into()),
            d: Some("delta".into()),
        },
        correct_answer: Some(correct.into()),
        explanation: None,
    }
}

/// Window opens one hour after `t0()` and closes two hours later.
pub fn test_payload(test_type: TestType, correct: &[&str], marks: i32) -> CreateTestPayload {
    CreateTestPayload {
        name: format!("{} round", test_type),
        description: "Placement screening".into(),
        subject: Subject::Reasoning,
        test_type,
        company_name: (test_type == TestType::CompanyTest).then(|| "Acme".to_string()),
        topics: vec!["series".into()],
        difficulty: Difficulty::Medium,
        number_of_questions: correct.len() as i32,
        marks_per_question: marks,
        duration_minutes: 60,
        start_at: window_start(),
        end_at: window_end(),
        questions: correct
            .iter()
            .enumerate()
            .map(|(i, c)| question(&format!("Question {}", i + 1), c))
            .collect(),
        sections: vec![],
    }
}

pub fn window_start() -> DateTime<Utc> {
    t0() + Duration::hours(1)
}

pub fn window_end() -> DateTime<Utc> {
    t0() + Duration::hours(3)
}

pub fn submission(answers: &[(i32, Option<&str>)]) -> SubmitAttemptPayload {
    SubmitAttemptPayload {
        answers: answers
            .iter()
            .map(|(id, label)| AnswerInput {
                question_id: *id,
                selected_answer: label.map(str::to_string),
                time_spent: Some(20),
            })
            .collect(),
        start_time: window_start(),
        time_spent: 12,
    }
}

pub fn token(actor: &Actor) -> String {
    let exp = (Utc::now() + Duration::hours(1)).timestamp() as usize;
    encode(
        &Header::default(),
        &Claims {
            sub: actor.id.to_string(),
            exp,
            role: Some(actor.role.as_str().to_string()),
            college_id: actor.college_id.map(|c| c.to_string()),
        },
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("sign token")
}
