use std::collections::HashSet;

use crate::dto::attempt_dto::{AnswerInput, InstantFeedback};
use crate::error::{Error, Result};
use crate::models::attempt::AnswerRecord;
use crate::models::catalog::OptionLabel;
use crate::models::test::TestDefinition;
use crate::utils::validation;

#[derive(Debug, Clone, PartialEq)]
pub struct GradedAttempt {
    pub answers: Vec<AnswerRecord>,
    pub total_marks: i32,
    pub marks_obtained: i32,
    pub percentage: f64,
    pub correct_answers: i32,
    pub incorrect_answers: i32,
}

pub struct GradingService;

impl GradingService {
    /// Shape checks that must pass before anything is graded or stored.
    pub fn check_answers(test: &TestDefinition, answers: &[AnswerInput]) -> Result<()> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for answer in answers {
            if test.question(answer.question_id).is_none() {
                return Err(Error::UnknownQuestion(format!(
                    "Question {} is not part of this test",
                    answer.question_id
                )));
            }
            if !seen.insert(answer.question_id) {
                duplicates.push(answer.question_id);
            }
        }

        let mut errors = validator::ValidationErrors::new();
        for id in duplicates {
            validation::push(
                &mut errors,
                "answers",
                "duplicate",
                format!("Question {} is answered more than once", id),
            );
        }
        if answers.len() != test.question_count as usize {
            validation::push(
                &mut errors,
                "answers",
                "length",
                format!(
                    "Expected {} answers, got {}",
                    test.question_count,
                    answers.len()
                ),
            );
        }
        validation::finish(errors)?;
        Ok(())
    }

    /// Grades in question order. Never fails: a missing or unrecognized
    /// label is simply incorrect.
    pub fn grade(test: &TestDefinition, answers: &[AnswerInput]) -> GradedAttempt {
        let mut records = Vec::with_capacity(test.question_count as usize);
        let mut marks_obtained = 0;
        let mut correct_answers = 0;

        for question in test.questions() {
            let given = answers.iter().find(|a| a.question_id == question.id);
            let selected_raw = given.and_then(|a| a.selected_answer.clone());
            let selected = selected_raw.as_deref().and_then(OptionLabel::parse_selected);
            let is_correct = question.is_correct(selected);
            let earned = if is_correct { question.marks } else { 0 };

            marks_obtained += earned;
            if is_correct {
                correct_answers += 1;
            }
            records.push(AnswerRecord {
                question_id: question.id,
                selected_answer: selected_raw,
                is_correct,
                marks_obtained: earned,
                time_spent: given.and_then(|a| a.time_spent),
            });
        }

        let answered = records.len() as i32;
        GradedAttempt {
            answers: records,
            total_marks: test.total_marks,
            marks_obtained,
            percentage: percentage(marks_obtained, test.total_marks),
            correct_answers,
            incorrect_answers: answered - correct_answers,
        }
    }

    pub fn instant_feedback(test: &TestDefinition, graded: &GradedAttempt) -> Vec<InstantFeedback> {
        graded
            .answers
            .iter()
            .filter_map(|record| {
                let question = test.question(record.question_id)?;
                Some(InstantFeedback {
                    question_id: record.question_id,
                    selected_answer: record.selected_answer.clone(),
                    correct_answer: question.correct_answer,
                    is_correct: record.is_correct,
                    explanation: question.explanation_text(),
                })
            })
            .collect()
    }
}

/// Share of `total` as a percentage rounded to two decimals; zero when
/// there is nothing to score against.
pub fn percentage(obtained: i32, total: i32) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    round2(obtained as f64 / total as f64 * 100.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::{Difficulty, Subject, TestType};
    use crate::models::question::{Question, QuestionOptions};
    use crate::models::test::Section;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn question(id: i32, correct: OptionLabel) -> Question {
        Question {
            id,
            text: format!("Question {}", id),
            options: QuestionOptions {
                a: "alpha".into(),
                b: "beta".into(),
                c: "gamma".into(),
                d: "delta".into(),
            },
            correct_answer: correct,
            marks: 5,
            explanation: None,
        }
    }

    fn two_question_test() -> TestDefinition {
        let now = Utc::now();
        TestDefinition {
            id: Uuid::new_v4(),
            name: "Aptitude".into(),
            description: "Warm-up".into(),
            subject: Subject::Arithmetic,
            test_type: TestType::Assessment,
            company_name: None,
            topics: vec![],
            difficulty: Difficulty::Easy,
            question_count: 2,
            marks_per_question: 5,
            total_marks: 10,
            duration_minutes: 30,
            start_at: now,
            end_at: now + Duration::hours(1),
            sections: vec![Section {
                name: "General".into(),
                duration_minutes: 30,
                questions: vec![question(1, OptionLabel::B), question(2, OptionLabel::C)],
            }],
            created_by: Uuid::new_v4(),
            is_active: true,
            created_at: now,
        }
    }

    fn answer(id: i32, label: Option<&str>) -> AnswerInput {
        AnswerInput {
            question_id: id,
            selected_answer: label.map(str::to_string),
            time_spent: Some(30),
        }
    }

    #[test]
    fn one_of_two_right_is_half_marks() {
        let test = two_question_test();
        let graded = GradingService::grade(&test, &[answer(1, Some("B")), answer(2, Some("A"))]);

        assert_eq!(graded.marks_obtained, 5);
        assert_eq!(graded.percentage, 50.0);
        assert_eq!(graded.correct_answers, 1);
        assert_eq!(graded.incorrect_answers, 1);
        assert!(graded.answers[0].is_correct);
        assert_eq!(graded.answers[1].marks_obtained, 0);
    }

    #[test]
    fn garbage_and_missing_labels_are_incorrect() {
        let test = two_question_test();
        let graded = GradingService::grade(&test, &[answer(1, Some("Z")), answer(2, None)]);

        assert_eq!(graded.marks_obtained, 0);
        assert_eq!(graded.incorrect_answers, 2);
        assert_eq!(graded.answers[0].selected_answer.as_deref(), Some("Z"));
    }

    #[test]
    fn records_follow_question_order() {
        let test = two_question_test();
        let graded = GradingService::grade(&test, &[answer(2, Some("c")), answer(1, Some("b"))]);
        let ids: Vec<i32> = graded.answers.iter().map(|a| a.question_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(graded.percentage, 100.0);
    }

    #[test]
    fn unknown_question_is_rejected_before_length() {
        let test = two_question_test();
        let err = GradingService::check_answers(&test, &[answer(9, Some("A"))]).unwrap_err();
        assert_eq!(err.kind(), "unknown_question");
    }

    #[test]
    fn duplicates_and_wrong_length_are_validation_errors() {
        let test = two_question_test();
        let err = GradingService::check_answers(&test, &[answer(1, Some("A")), answer(1, Some("B"))])
            .unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        let err = GradingService::check_answers(&test, &[answer(1, Some("A"))]).unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        assert!(
            GradingService::check_answers(&test, &[answer(1, Some("A")), answer(2, None)]).is_ok()
        );
    }

    #[test]
    fn feedback_covers_every_question() {
        let test = two_question_test();
        let graded = GradingService::grade(&test, &[answer(1, Some("B")), answer(2, Some("A"))]);
        let feedback = GradingService::instant_feedback(&test, &graded);

        assert_eq!(feedback.len(), 2);
        assert!(feedback[0].is_correct);
        assert_eq!(feedback[1].correct_answer, OptionLabel::C);
        assert_eq!(feedback[1].explanation, "The correct answer is C: gamma");
    }

    #[test]
    fn percentage_rounds_and_handles_zero_total() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(0, 0), 0.0);
    }
}
