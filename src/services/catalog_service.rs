use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::database::store::SharedStore;
use crate::dto::test_dto::{CreateTestPayload, QuestionInput, SectionInput};
use crate::error::{Error, Result};
use crate::models::catalog::{OptionLabel, TestType};
use crate::models::question::{Question, QuestionOptions};
use crate::models::test::{PublicTest, Section, TestDefinition};
use crate::models::user::Actor;
use crate::utils::time::SharedClock;
use crate::utils::validation;

/// Name given to the single section of a test authored as a flat list.
pub const DEFAULT_SECTION: &str = "General";

#[derive(Clone)]
pub struct CatalogService {
    store: SharedStore,
    clock: SharedClock,
}

impl CatalogService {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub async fn create_test(
        &self,
        payload: CreateTestPayload,
        actor: &Actor,
    ) -> Result<TestDefinition> {
        let test = build_definition(payload, actor.id, self.clock.now())?;
        self.store.insert_test(&test).await?;
        info!(
            test_id = %test.id,
            test_type = %test.test_type,
            questions = test.question_count,
            "test created"
        );
        Ok(test)
    }

    pub async fn get_test(&self, id: Uuid) -> Result<TestDefinition> {
        self.store
            .get_test(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", id)))
    }

    /// Student-facing projection without the answer key.
    pub async fn get_public_test(&self, id: Uuid) -> Result<PublicTest> {
        Ok(self.get_test(id).await?.redacted())
    }

    /// Active tests unless `is_active` asks otherwise.
    pub async fn list_tests(&self, is_active: Option<bool>) -> Result<Vec<TestDefinition>> {
        self.store.list_tests(Some(is_active.unwrap_or(true))).await
    }

    pub async fn deactivate_test(&self, id: Uuid) -> Result<TestDefinition> {
        if !self.store.set_test_active(id, false).await? {
            return Err(Error::NotFound(format!("Test {} not found", id)));
        }
        info!(test_id = %id, "test deactivated");
        self.get_test(id).await
    }
}

/// Turns authoring input into a definition, or reports every problem found.
pub fn build_definition(
    payload: CreateTestPayload,
    created_by: Uuid,
    now: DateTime<Utc>,
) -> std::result::Result<TestDefinition, ValidationErrors> {
    let mut errors = validation::collect(&payload);

    if payload.start_at >= payload.end_at {
        validation::push(&mut errors, "endAt", "window", "endAt must be after startAt");
    }

    let company_name = payload
        .company_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    match (payload.test_type, &company_name) {
        (TestType::CompanyTest, None) => validation::push(
            &mut errors,
            "companyName",
            "required",
            "companyName is required for CompanyTest",
        ),
        (TestType::CompanyTest, Some(_)) | (_, None) => {}
        (_, Some(_)) => validation::push(
            &mut errors,
            "companyName",
            "not_allowed",
            "companyName is only allowed for CompanyTest",
        ),
    }

    let section_inputs: Vec<SectionInput> =
        match (payload.questions.is_empty(), payload.sections.is_empty()) {
            (false, false) => {
                validation::push(
                    &mut errors,
                    "sections",
                    "exclusive",
                    "Provide either questions or sections, not both",
                );
                Vec::new()
            }
            (true, true) => {
                validation::push(
                    &mut errors,
                    "questions",
                    "required",
                    "At least one question is required",
                );
                Vec::new()
            }
            (false, true) => vec![SectionInput {
                name: DEFAULT_SECTION.to_string(),
                duration_minutes: payload.duration_minutes,
                questions: payload.questions,
            }],
            (true, false) => {
                check_sections(&payload.sections, payload.duration_minutes, &mut errors);
                payload.sections
            }
        };

    let provided: usize = section_inputs.iter().map(|s| s.questions.len()).sum();
    if !section_inputs.is_empty() && provided != payload.number_of_questions.max(0) as usize {
        validation::push(
            &mut errors,
            "questions",
            "count",
            format!(
                "Expected {} questions, got {}",
                payload.number_of_questions, provided
            ),
        );
    }

    let mut next_id = 1;
    let mut sections = Vec::with_capacity(section_inputs.len());
    for input in section_inputs {
        let mut questions = Vec::with_capacity(input.questions.len());
        for draft in &input.questions {
            if let Some(q) = check_question(next_id, draft, payload.marks_per_question, &mut errors) {
                questions.push(q);
            }
            next_id += 1;
        }
        sections.push(Section {
            name: input.name.trim().to_string(),
            duration_minutes: input.duration_minutes,
            questions,
        });
    }

    validation::finish(errors)?;

    Ok(TestDefinition {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        description: payload.description,
        subject: payload.subject,
        test_type: payload.test_type,
        company_name,
        topics: payload
            .topics
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        difficulty: payload.difficulty,
        question_count: payload.number_of_questions,
        marks_per_question: payload.marks_per_question,
        total_marks: payload.number_of_questions * payload.marks_per_question,
        duration_minutes: payload.duration_minutes,
        start_at: payload.start_at,
        end_at: payload.end_at,
        sections,
        created_by,
        is_active: true,
        created_at: now,
    })
}

fn check_sections(sections: &[SectionInput], duration_minutes: i32, errors: &mut ValidationErrors) {
    for (idx, section) in sections.iter().enumerate() {
        if section.name.trim().is_empty() {
            validation::push(
                errors,
                "sections",
                "name",
                format!("Section {}: name is required", idx + 1),
            );
        }
        if section.duration_minutes < 1 {
            validation::push(
                errors,
                "sections",
                "duration",
                format!("Section {}: duration must be positive", idx + 1),
            );
        }
        if section.questions.is_empty() {
            validation::push(
                errors,
                "sections",
                "empty",
                format!("Section {}: at least one question is required", idx + 1),
            );
        }
    }
    let total: i32 = sections.iter().map(|s| s.duration_minutes).sum();
    if total != duration_minutes {
        validation::push(
            errors,
            "sections",
            "duration_total",
            format!(
                "Section durations add up to {} minutes, expected {}",
                total, duration_minutes
            ),
        );
    }
}

/// Validates one draft and turns it into a question with the given id.
/// Problems are recorded under `questions` with a 1-based position.
pub fn check_question(
    id: i32,
    draft: &QuestionInput,
    marks: i32,
    errors: &mut ValidationErrors,
) -> Option<Question> {
    let mut ok = true;

    if draft.text.trim().is_empty() {
        validation::push(
            errors,
            "questions",
            "text",
            format!("Question {}: text is required", id),
        );
        ok = false;
    }

    let options = [
        (OptionLabel::A, draft.options.a.as_deref()),
        (OptionLabel::B, draft.options.b.as_deref()),
        (OptionLabel::C, draft.options.c.as_deref()),
        (OptionLabel::D, draft.options.d.as_deref()),
    ];
    for (label, value) in options {
        if validation::is_blank(value) {
            validation::push(
                errors,
                "questions",
                "options",
                format!("Question {}: option {} is required", id, label),
            );
            ok = false;
        }
    }

    let correct = draft
        .correct_answer
        .as_deref()
        .and_then(OptionLabel::parse_selected);
    if correct.is_none() {
        validation::push(
            errors,
            "questions",
            "correct_answer",
            format!("Question {}: correctAnswer must be one of A, B, C, D", id),
        );
        ok = false;
    }

    let (true, Some(correct_answer)) = (ok, correct) else {
        return None;
    };
    let text_of = |value: Option<&str>| value.unwrap_or_default().trim().to_string();
    Some(Question {
        id,
        text: draft.text.trim().to_string(),
        options: QuestionOptions {
            a: text_of(draft.options.a.as_deref()),
            b: text_of(draft.options.b.as_deref()),
            c: text_of(draft.options.c.as_deref()),
            d: text_of(draft.options.d.as_deref()),
        },
        correct_answer,
        marks,
        explanation: draft
            .explanation
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string),
    })
}
