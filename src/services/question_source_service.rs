use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::dto::test_dto::{OptionsInput, QuestionInput};
use crate::error::{Error, Result};
use crate::models::catalog::Subject;
use crate::services::catalog_service::check_question;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Produces question drafts in the shape test authoring accepts.
#[derive(Clone)]
pub struct QuestionSourceService {
    client: Client,
    api_key: Option<String>,
    model: String,
    max_questions: usize,
}

impl QuestionSourceService {
    pub fn new(api_key: Option<String>, model: String, max_questions: usize, client: Client) -> Self {
        Self {
            client,
            api_key,
            model,
            max_questions,
        }
    }

    pub async fn generate_sample(&self, subject: Subject, count: usize) -> Result<Vec<QuestionInput>> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(Error::Extraction(
                "Question generation is not configured".to_string(),
            ));
        };
        let count = count.clamp(1, self.max_questions.max(1));

        let system_prompt = r#"You write multiple-choice questions for campus placement aptitude tests.
Return a JSON object with a "questions" array. Every question has exactly four options.

Rules:
1. Generate exactly the requested number of questions.
2. Each item: {"text": "...", "options": {"A": "...", "B": "...", "C": "...", "D": "..."}, "correctAnswer": "A"|"B"|"C"|"D", "explanation": "..."}.
3. Spread the correct answers across A, B, C and D.
4. Avoid "All of the above" and "None of the above".
"#;
        let user_message = serde_json::json!({
            "subject": subject,
            "required_count": count,
        });

        let payload = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_message.to_string()}
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.7
        });

        tracing::info!(%subject, count, model = %self.model, "requesting generated questions");
        let response_json = self.chat_openai(api_key, payload).await?;
        let drafts = sanitize_drafts(&response_json, count);
        if drafts.is_empty() {
            return Err(Error::Extraction(
                "The generator returned no usable questions".to_string(),
            ));
        }
        tracing::info!(requested = count, usable = drafts.len(), "generated questions accepted");
        Ok(drafts)
    }

    async fn chat_openai(&self, api_key: &str, payload: JsonValue) -> Result<JsonValue> {
        let res = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(api_key)
            .json(&payload)
            .timeout(Duration::from_secs(120))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %text, "question generator rejected the request");
            return Err(Error::Extraction(format!(
                "Question generator returned {}",
                status
            )));
        }

        let body: JsonValue = res.json().await?;
        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .and_then(|s| serde_json::from_str(s).ok())
            .ok_or_else(|| Error::Extraction("Malformed question generator response".to_string()))
    }

    /// Parses a plain-text question paper; see [`parse_document`].
    pub fn extract_from_document(&self, bytes: &[u8]) -> Result<Vec<QuestionInput>> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| Error::Extraction("Document is not valid UTF-8 text".to_string()))?;
        let drafts = parse_document(text)?;
        if drafts.len() > self.max_questions.max(100) {
            return Err(Error::Extraction(format!(
                "Document holds {} questions, at most {} are supported",
                drafts.len(),
                self.max_questions.max(100)
            )));
        }
        Ok(drafts)
    }
}

/// Keeps the drafts that would pass authoring validation, up to `limit`.
pub fn sanitize_drafts(raw: &JsonValue, limit: usize) -> Vec<QuestionInput> {
    let items = raw
        .get("questions")
        .and_then(|q| q.as_array())
        .or_else(|| raw.as_array())
        .cloned()
        .unwrap_or_default();

    let mut drafts = Vec::new();
    for item in items {
        let Ok(draft) = serde_json::from_value::<QuestionInput>(item) else {
            continue;
        };
        let mut scratch = validator::ValidationErrors::new();
        if check_question(1, &draft, 1, &mut scratch).is_none() {
            tracing::debug!(text = %draft.text, "dropping invalid generated question");
            continue;
        }
        drafts.push(draft);
        if drafts.len() == limit {
            break;
        }
    }
    drafts
}

fn numbered_prefix(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    Some(rest.trim())
}

fn option_prefix(line: &str) -> Option<(char, &str)> {
    let body = line.strip_prefix('(').unwrap_or(line);
    let mut chars = body.chars();
    let label = chars.next()?.to_ascii_uppercase();
    if !matches!(label, 'A'..='D') {
        return None;
    }
    let rest = chars.as_str();
    let rest = rest.strip_prefix(')').or_else(|| rest.strip_prefix('.'))?;
    Some((label, rest.trim()))
}

fn labelled<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    let (head, tail) = line.split_once(':')?;
    let head = head.trim();
    labels
        .iter()
        .any(|l| head.eq_ignore_ascii_case(l))
        .then(|| tail.trim())
}

/// Parses questions of the form:
///
/// ```text
/// 1. What is 2 + 2?
/// A) 3
/// B) 4
/// C) 5
/// D) 6
/// Answer: B
/// Explanation: optional
/// ```
///
/// Question text may wrap onto following lines until the first option.
pub fn parse_document(text: &str) -> Result<Vec<QuestionInput>> {
    let mut drafts: Vec<QuestionInput> = Vec::new();
    let mut current: Option<QuestionInput> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(answer) = labelled(line, &["answer", "ans", "correct answer"]) {
            let draft = current.as_mut().ok_or_else(|| {
                Error::Extraction(format!("Line {}: answer without a question", line_no))
            })?;
            draft.correct_answer = Some(answer.trim_matches(|c| c == '(' || c == ')').to_string());
            continue;
        }
        if let Some(explanation) = labelled(line, &["explanation"]) {
            let draft = current.as_mut().ok_or_else(|| {
                Error::Extraction(format!("Line {}: explanation without a question", line_no))
            })?;
            draft.explanation = Some(explanation.to_string());
            continue;
        }
        if let Some(question_text) = numbered_prefix(line) {
            if let Some(done) = current.take() {
                drafts.push(done);
            }
            current = Some(QuestionInput {
                text: question_text.to_string(),
                options: OptionsInput::default(),
                correct_answer: None,
                explanation: None,
            });
            continue;
        }
        if let Some((label, option_text)) = option_prefix(line) {
            let draft = current.as_mut().ok_or_else(|| {
                Error::Extraction(format!("Line {}: option without a question", line_no))
            })?;
            let slot = match label {
                'A' => &mut draft.options.a,
                'B' => &mut draft.options.b,
                'C' => &mut draft.options.c,
                _ => &mut draft.options.d,
            };
            *slot = Some(option_text.to_string());
            continue;
        }

        match current.as_mut() {
            Some(draft) if draft.options == OptionsInput::default() => {
                draft.text.push(' ');
                draft.text.push_str(line);
            }
            Some(_) => {
                return Err(Error::Extraction(format!(
                    "Line {}: unexpected text after the options",
                    line_no
                )))
            }
            None => {
                return Err(Error::Extraction(format!(
                    "Line {}: expected a numbered question",
                    line_no
                )))
            }
        }
    }
    if let Some(done) = current.take() {
        drafts.push(done);
    }

    if drafts.is_empty() {
        return Err(Error::Extraction("No questions found in document".to_string()));
    }

    let mut errors = validator::ValidationErrors::new();
    for (idx, draft) in drafts.iter().enumerate() {
        check_question(idx as i32 + 1, draft, 1, &mut errors);
    }
    if !errors.is_empty() {
        let problems: Vec<String> = errors
            .field_errors()
            .values()
            .flat_map(|list| list.iter())
            .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .collect();
        return Err(Error::Extraction(problems.join("; ")));
    }
    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAPER: &str = "\
1. A train covers 60 km in 1.5 hours.
What is its speed?
A) 30 km/h
B) 40 km/h
C) 45 km/h
D) 90 km/h
Answer: B
Explanation: 60 / 1.5 = 40

2) Pick the odd one out.
(a) Apple
(b) Mango
(c) Carrot
(d) Banana
Ans: c
";

    #[test]
    fn parses_numbered_questions() {
        let drafts = parse_document(PAPER).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(
            drafts[0].text,
            "A train covers 60 km in 1.5 hours. What is its speed?"
        );
        assert_eq!(drafts[0].options.b.as_deref(), Some("40 km/h"));
        assert_eq!(drafts[0].correct_answer.as_deref(), Some("B"));
        assert_eq!(drafts[0].explanation.as_deref(), Some("60 / 1.5 = 40"));
        assert_eq!(drafts[1].options.c.as_deref(), Some("Carrot"));
        assert_eq!(drafts[1].correct_answer.as_deref(), Some("c"));
    }

    #[test]
    fn missing_option_is_an_extraction_error() {
        let err = parse_document("1. Q?\nA) x\nB) y\nC) z\nAnswer: A\n").unwrap_err();
        assert_eq!(err.kind(), "extraction_error");
        assert!(err.to_string().contains("option D is required"));
    }

    #[test]
    fn stray_text_is_rejected() {
        assert!(parse_document("hello there").is_err());
        assert!(parse_document("").is_err());
        assert!(parse_document("A) orphan option").is_err());
    }

    #[test]
    fn generated_drafts_are_filtered() {
        let raw = serde_json::json!({
            "questions": [
                {"text": "2+2?", "options": {"A": "3", "B": "4", "C": "5", "D": "6"}, "correctAnswer": "B"},
                {"text": "broken", "options": {"A": "x"}, "correctAnswer": "A"},
                {"text": "3+3?", "options": {"A": "6", "B": "7", "C": "8", "D": "9"}, "correctAnswer": "A"},
                {"text": "4+4?", "options": {"A": "8", "B": "7", "C": "6", "D": "5"}, "correctAnswer": "A"}
            ]
        });
        let drafts = sanitize_drafts(&raw, 2);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[1].text, "3+3?");
    }

    #[tokio::test]
    async fn unconfigured_generator_fails_cleanly() {
        let svc = QuestionSourceService::new(None, "gpt-4o".into(), 50, Client::new());
        let err = svc.generate_sample(Subject::Verbal, 5).await.unwrap_err();
        assert_eq!(err.kind(), "extraction_error");
    }
}
