use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::answer::{Answer, AnswerPayload, QuestionResult, Verdict};
use crate::models::difficulty::Difficulty;
use crate::models::question::{AnswerOption, Question, QuestionType};
use crate::models::test_attempt::{AttemptState, TestAttempt};

const MAX_ANSWER_TEXT: usize = 10_000;
const MAX_SELECTED_OPTIONS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(range(min = 1))]
    pub question_id: i64,
    #[validate(custom(function = "validate_payload"))]
    pub answer: AnswerPayload,
}

fn validate_payload(payload: &AnswerPayload) -> Result<(), ValidationError> {
    match payload {
        AnswerPayload::Text { text } => {
            if text.trim().is_empty() {
                return Err(ValidationError::new("empty_answer_text"));
            }
            if text.chars().count() > MAX_ANSWER_TEXT {
                return Err(ValidationError::new("answer_text_too_long"));
            }
        }
        AnswerPayload::Options { option_ids } => {
            if option_ids.is_empty() {
                return Err(ValidationError::new("no_options_selected"));
            }
            if option_ids.len() > MAX_SELECTED_OPTIONS {
                return Err(ValidationError::new("too_many_options"));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GradeAnswerRequest {
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResponse {
    pub state: AttemptState,
    #[serde(flatten)]
    pub attempt: TestAttempt,
}

impl From<TestAttempt> for AttemptResponse {
    fn from(attempt: TestAttempt) -> Self {
        Self {
            state: attempt.state(),
            attempt,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    pub saved: bool,
    pub attempt_id: Uuid,
    pub question_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishAttemptResponse {
    pub attempt: AttemptResponse,
    pub results: Vec<QuestionResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptCountResponse {
    pub test_id: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerView {
    pub question_id: i64,
    pub answer: AnswerPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    pub submitted_at: DateTime<Utc>,
}

impl AnswerView {
    pub fn new(answer: &Answer, reveal: bool) -> Self {
        Self {
            question_id: answer.question_id,
            answer: answer.payload(),
            verdict: reveal.then(|| answer.verdict()),
            submitted_at: answer.submitted_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptDetailResponse {
    pub attempt: AttemptResponse,
    pub answers: Vec<AnswerView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeAnswerResponse {
    pub attempt: AttemptResponse,
    pub answer: AnswerView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionView {
    pub id: i64,
    pub option_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

/// A question as shown to a client. Correct answers are only included when
/// `reveal` is set, i.e. for teachers and admins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: i64,
    pub test_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub multiple_choice: bool,
    pub difficulty: Option<Difficulty>,
    pub options: Vec<OptionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer_text: Option<String>,
}

impl QuestionView {
    pub fn new(question: Question, reveal: bool) -> Self {
        let options = question
            .options
            .into_iter()
            .map(|o: AnswerOption| OptionView {
                id: o.id,
                option_text: o.option_text,
                is_correct: reveal.then_some(o.is_correct),
            })
            .collect();
        Self {
            id: question.id,
            test_id: question.test_id,
            question_text: question.question_text,
            question_type: question.question_type,
            multiple_choice: question.multiple_choice,
            difficulty: question.difficulty,
            options,
            correct_answer_text: question.correct_answer_text.filter(|_| reveal),
        }
    }
}
