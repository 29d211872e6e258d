//! Storage capabilities the services are built on.
//!
//! Every method is one short transaction. Methods that guard an invariant
//! (one open attempt per student and test, no writes to a finished attempt)
//! check it under the same lock that performs the write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::answer::{Answer, GradedAnswer, UngradedAnswer, Verdict};
use crate::models::difficulty::{Difficulty, QuestionStats};
use crate::models::question::Question;
use crate::models::test::Test;
use crate::models::test_attempt::TestAttempt;

/// Read access to test structure owned by the course/test CRUD side.
#[async_trait]
pub trait TestCatalog: Send + Sync {
    async fn get_test(&self, test_id: i64) -> Result<Option<Test>>;

    /// Questions of a test ordered by id, options included.
    async fn list_questions(&self, test_id: i64) -> Result<Vec<Question>>;
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Fails with `AttemptConflict` when the student already has an open
    /// attempt on this test.
    async fn insert_attempt(
        &self,
        student_id: i64,
        test_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<TestAttempt>;

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<Option<TestAttempt>>;

    async fn latest_attempt(&self, student_id: i64, test_id: i64) -> Result<Option<TestAttempt>>;

    async fn count_attempts(&self, student_id: i64, test_id: i64) -> Result<i64>;

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>>;

    /// Insert or replace the answer for `(attempt, question)`. Fails with
    /// `AttemptNotFound` or `AttemptAlreadyFinished` checked under the
    /// attempt lock.
    async fn upsert_answer(
        &self,
        attempt_id: Uuid,
        question_id: i64,
        graded: &GradedAnswer,
        submitted_at: DateTime<Utc>,
    ) -> Result<Answer>;

    /// Seal an open attempt: re-grade every stored answer with `regrade`,
    /// score against `total_questions` and set `finished_at`, all or nothing.
    async fn finish_attempt(
        &self,
        attempt_id: Uuid,
        finished_at: DateTime<Utc>,
        total_questions: i32,
        regrade: &(dyn for<'r> Fn(&'r Answer) -> Verdict + Send + Sync),
    ) -> Result<(TestAttempt, Vec<Answer>)>;

    /// Manual decision on one answer. A finished attempt gets its score
    /// recomputed in the same transaction.
    async fn grade_answer(
        &self,
        attempt_id: Uuid,
        question_id: i64,
        is_correct: bool,
    ) -> Result<(TestAttempt, Answer)>;

    async fn list_ungraded_answers(&self, test_id: i64) -> Result<Vec<UngradedAnswer>>;
}

#[async_trait]
pub trait DifficultyStore: Send + Sync {
    /// Correctness totals for questions with at least `min_answers` graded
    /// answers.
    async fn question_stats(&self, min_answers: i64) -> Result<Vec<QuestionStats>>;

    /// Apply all label changes in one transaction and return rows changed.
    async fn apply_difficulty(&self, updates: &[(i64, Difficulty)]) -> Result<u64>;

    /// `(question id, text, current label)` for every question.
    async fn list_question_texts(&self) -> Result<Vec<(i64, String, Option<Difficulty>)>>;

    async fn set_difficulty(&self, question_id: i64, difficulty: Difficulty) -> Result<()>;
}
