use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::Error;
use crate::models::difficulty::Difficulty;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Open,
    Closed,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Open => "open",
            QuestionType::Closed => "closed",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(QuestionType::Open),
            "closed" => Ok(QuestionType::Closed),
            other => Err(Error::InvalidAnswer(format!(
                "unknown question type '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnswerOption {
    pub id: i64,
    pub question_id: i64,
    pub option_text: String,
    pub is_correct: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub test_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    /// Only meaningful for closed questions.
    pub multiple_choice: bool,
    /// Only meaningful for open questions.
    pub correct_answer_text: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
}

impl Question {
    pub fn is_open(&self) -> bool {
        self.question_type == QuestionType::Open
    }

    pub fn is_multiple_choice(&self) -> bool {
        self.question_type == QuestionType::Closed && self.multiple_choice
    }

    pub fn correct_option_ids(&self) -> BTreeSet<i64> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id)
            .collect()
    }

    pub fn has_option(&self, option_id: i64) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }

    /// Open question whose correct text has not been filled in yet.
    pub fn awaits_manual_grading(&self) -> bool {
        self.is_open()
            && self
                .correct_answer_text
                .as_deref()
                .map(|t| t.trim().is_empty())
                .unwrap_or(true)
    }
}
