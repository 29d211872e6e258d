use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    InProgress,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestAttempt {
    pub id: Uuid,
    pub student_id: i64,
    pub test_id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Fraction of the test's questions answered correctly, in `[0, 1]`.
    pub score: Option<f64>,
    pub percentage: Option<Decimal>,
    pub correct_count: Option<i32>,
    pub total_questions: Option<i32>,
}

impl TestAttempt {
    pub fn state(&self) -> AttemptState {
        if self.finished_at.is_some() {
            AttemptState::Finished
        } else {
            AttemptState::InProgress
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state() == AttemptState::Finished
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttemptScore {
    pub correct_count: i32,
    pub total_questions: i32,
    pub score: f64,
    pub percentage: Decimal,
}

impl AttemptScore {
    /// An empty test scores zero. Percentage always carries two decimals.
    pub fn from_counts(correct_count: i32, total_questions: i32) -> Self {
        if total_questions <= 0 {
            return Self {
                correct_count,
                total_questions: total_questions.max(0),
                score: 0.0,
                percentage: Decimal::new(0, 2),
            };
        }
        let mut percentage = (Decimal::from(correct_count) * Decimal::ONE_HUNDRED
            / Decimal::from(total_questions))
        .round_dp(2);
        percentage.rescale(2);
        Self {
            correct_count,
            total_questions,
            score: correct_count as f64 / total_questions as f64,
            percentage,
        }
    }
}
