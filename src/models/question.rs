use serde::{Deserialize, Serialize};

use crate::models::catalog::OptionLabel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOptions {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
}

impl QuestionOptions {
    pub fn get(&self, label: OptionLabel) -> &str {
        match label {
            OptionLabel::A => &self.a,
            OptionLabel::B => &self.b,
            OptionLabel::C => &self.c,
            OptionLabel::D => &self.d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i32,
    pub text: String,
    pub options: QuestionOptions,
    pub correct_answer: OptionLabel,
    pub marks: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    pub fn is_correct(&self, selected: Option<OptionLabel>) -> bool {
        selected == Some(self.correct_answer)
    }

    /// Authored explanation when present, otherwise a templated one.
    pub fn explanation_text(&self) -> String {
        match &self.explanation {
            Some(text) if !text.trim().is_empty() => text.clone(),
            _ => format!(
                "The correct answer is {}: {}",
                self.correct_answer,
                self.options.get(self.correct_answer)
            ),
        }
    }

    pub fn redacted(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id,
            text: self.text.clone(),
            options: self.options.clone(),
            marks: self.marks,
        }
    }
}

/// Student-facing question: never carries the answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i32,
    pub text: String,
    pub options: QuestionOptions,
    pub marks: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Question {
        Question {
            id: 1,
            text: "2 + 2 = ?".into(),
            options: QuestionOptions {
                a: "3".into(),
                b: "4".into(),
                c: "5".into(),
                d: "22".into(),
            },
            correct_answer: OptionLabel::B,
            marks: 2,
            explanation: None,
        }
    }

    #[test]
    fn templated_explanation_names_the_option() {
        assert_eq!(sample().explanation_text(), "The correct answer is B: 4");
    }

    #[test]
    fn authored_explanation_wins() {
        let mut q = sample();
        q.explanation = Some("Basic addition.".into());
        assert_eq!(q.explanation_text(), "Basic addition.");
    }

    #[test]
    fn redacted_json_has_no_answer_key() {
        let json = serde_json::to_value(sample().redacted()).unwrap();
        assert!(json.get("correctAnswer").is_none());
        assert!(json.get("explanation").is_none());
        assert_eq!(json["options"]["B"], "4");
    }
}
