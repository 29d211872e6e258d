use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// What a student submits for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerPayload {
    Text { text: String },
    Options { option_ids: Vec<i64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
    /// Open question without a stored correct answer; waits for a teacher.
    Ungraded,
}

impl Verdict {
    pub fn is_correct(&self) -> bool {
        matches!(self, Verdict::Correct)
    }

    pub fn is_ungraded(&self) -> bool {
        matches!(self, Verdict::Ungraded)
    }
}

/// A payload in its stored form together with the scoring decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedAnswer {
    pub payload: AnswerPayload,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Answer {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: i64,
    pub answer_text: Option<String>,
    pub option_ids: Vec<i64>,
    pub is_correct: bool,
    pub ungraded: bool,
    /// Set by a teacher's decision; re-grading leaves the verdict alone.
    pub graded_manually: bool,
    pub submitted_at: DateTime<Utc>,
}

impl Answer {
    pub fn new(attempt_id: Uuid, question_id: i64, graded: &GradedAnswer, at: DateTime<Utc>) -> Self {
        let (answer_text, option_ids) = match &graded.payload {
            AnswerPayload::Text { text } => (Some(text.clone()), Vec::new()),
            AnswerPayload::Options { option_ids } => (None, option_ids.clone()),
        };
        Self {
            id: Uuid::new_v4(),
            attempt_id,
            question_id,
            answer_text,
            option_ids,
            is_correct: graded.verdict.is_correct(),
            ungraded: graded.verdict.is_ungraded(),
            graded_manually: false,
            submitted_at: at,
        }
    }

    pub fn payload(&self) -> AnswerPayload {
        match &self.answer_text {
            Some(text) => AnswerPayload::Text { text: text.clone() },
            None => AnswerPayload::Options {
                option_ids: self.option_ids.clone(),
            },
        }
    }

    pub fn verdict(&self) -> Verdict {
        if self.ungraded {
            Verdict::Ungraded
        } else if self.is_correct {
            Verdict::Correct
        } else {
            Verdict::Incorrect
        }
    }

    pub fn apply_verdict(&mut self, verdict: Verdict) {
        self.is_correct = verdict.is_correct();
        self.ungraded = verdict.is_ungraded();
    }

    pub fn grade_manually(&mut self, is_correct: bool) {
        self.is_correct = is_correct;
        self.ungraded = false;
        self.graded_manually = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Correct,
    Incorrect,
    Ungraded,
    Unanswered,
}

impl From<Verdict> for ResultStatus {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Correct => ResultStatus::Correct,
            Verdict::Incorrect => ResultStatus::Incorrect,
            Verdict::Ungraded => ResultStatus::Ungraded,
        }
    }
}

/// Per-question line of a finished attempt's breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: i64,
    pub answered: bool,
    pub status: ResultStatus,
}

/// Open-question answer waiting for a teacher's decision.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UngradedAnswer {
    pub attempt_id: Uuid,
    pub student_id: i64,
    pub question_id: i64,
    pub question_text: String,
    pub answer_text: Option<String>,
    pub submitted_at: DateTime<Utc>,
}
