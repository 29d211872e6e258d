use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::{Config, OpenAnswerPolicy};
use crate::database::store::{AttemptStore, TestCatalog};
use crate::error::{Error, Result};
use crate::models::answer::{
    Answer, AnswerPayload, QuestionResult, ResultStatus, UngradedAnswer, Verdict,
};
use crate::models::question::Question;
use crate::models::test_attempt::TestAttempt;
use crate::services::grading_service::GradingService;

#[derive(Debug, Clone, Copy)]
pub struct AttemptSettings {
    /// Whether a submission tells the student if the answer was right.
    pub reveal_correctness: bool,
    pub open_answer_policy: OpenAnswerPolicy,
}

impl Default for AttemptSettings {
    fn default() -> Self {
        Self {
            reveal_correctness: true,
            open_answer_policy: OpenAnswerPolicy::Exact,
        }
    }
}

impl From<&Config> for AttemptSettings {
    fn from(config: &Config) -> Self {
        Self {
            reveal_correctness: config.reveal_answer_correctness,
            open_answer_policy: config.open_answer_policy,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmittedAnswer {
    pub answer: Answer,
    /// `None` when correctness is hidden until the attempt is finished.
    pub verdict: Option<Verdict>,
}

#[derive(Debug, Clone)]
pub struct FinishedAttempt {
    pub attempt: TestAttempt,
    pub results: Vec<QuestionResult>,
}

#[derive(Debug, Clone)]
pub struct AttemptDetail {
    pub attempt: TestAttempt,
    pub answers: Vec<Answer>,
}

#[derive(Clone)]
pub struct AttemptService {
    catalog: Arc<dyn TestCatalog>,
    store: Arc<dyn AttemptStore>,
    settings: AttemptSettings,
}

impl AttemptService {
    pub fn new(
        catalog: Arc<dyn TestCatalog>,
        store: Arc<dyn AttemptStore>,
        settings: AttemptSettings,
    ) -> Self {
        Self {
            catalog,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> AttemptSettings {
        self.settings
    }

    pub async fn start_attempt(&self, student_id: i64, test_id: i64) -> Result<TestAttempt> {
        self.require_test(test_id).await?;

        match self.store.insert_attempt(student_id, test_id, Utc::now()).await {
            Ok(attempt) => {
                tracing::info!(
                    attempt_id = %attempt.id,
                    student_id,
                    test_id,
                    "Attempt started"
                );
                Ok(attempt)
            }
            Err(Error::AttemptConflict { attempt_id }) => {
                tracing::warn!(
                    %attempt_id,
                    student_id,
                    test_id,
                    "Start rejected, attempt already in progress"
                );
                Err(Error::AttemptConflict { attempt_id })
            }
            Err(e) => {
                if e.is_storage() {
                    tracing::error!(error = %e, student_id, test_id, "Starting attempt failed");
                }
                Err(e)
            }
        }
    }

    /// Grade and store one answer; resubmitting replaces the previous one.
    pub async fn submit_answer(
        &self,
        attempt_id: Uuid,
        question_id: i64,
        payload: AnswerPayload,
    ) -> Result<SubmittedAnswer> {
        let attempt = self.get_attempt(attempt_id).await?;
        if attempt.is_finished() {
            return Err(Error::AttemptAlreadyFinished(attempt_id));
        }

        let questions = self.catalog.list_questions(attempt.test_id).await?;
        let question = questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or(Error::QuestionNotFound(question_id))?;

        let graded = GradingService::grade(question, &payload, self.settings.open_answer_policy)?;
        let answer = self
            .store
            .upsert_answer(attempt_id, question_id, &graded, Utc::now())
            .await
            .inspect_err(|e| {
                if e.is_storage() {
                    tracing::error!(error = %e, %attempt_id, question_id, "Storing answer failed");
                }
            })?;

        tracing::debug!(
            %attempt_id,
            question_id,
            verdict = ?graded.verdict,
            "Answer recorded"
        );

        Ok(SubmittedAnswer {
            answer,
            verdict: self.settings.reveal_correctness.then_some(graded.verdict),
        })
    }

    /// Seal the attempt. Every stored answer is graded again against the
    /// current questions so the score never depends on stale flags.
    pub async fn finish_attempt(&self, attempt_id: Uuid) -> Result<FinishedAttempt> {
        let attempt = self.get_attempt(attempt_id).await?;
        if attempt.is_finished() {
            return Err(Error::AttemptAlreadyFinished(attempt_id));
        }

        let questions = self.catalog.list_questions(attempt.test_id).await?;
        let by_id: HashMap<i64, Question> =
            questions.iter().map(|q| (q.id, q.clone())).collect();
        let policy = self.settings.open_answer_policy;
        let regrade = move |answer: &Answer| {
            GradingService::regrade(by_id.get(&answer.question_id), answer, policy)
        };

        let (attempt, answers) = self
            .store
            .finish_attempt(attempt_id, Utc::now(), questions.len() as i32, &regrade)
            .await
            .inspect_err(|e| {
                if e.is_storage() {
                    tracing::error!(error = %e, %attempt_id, "Finishing attempt failed");
                }
            })?;

        tracing::info!(
            %attempt_id,
            student_id = attempt.student_id,
            test_id = attempt.test_id,
            correct = attempt.correct_count.unwrap_or_default(),
            total = attempt.total_questions.unwrap_or_default(),
            "Attempt finished"
        );

        Ok(FinishedAttempt {
            results: question_results(&questions, &answers),
            attempt,
        })
    }

    pub async fn attempt_count(&self, student_id: i64, test_id: i64) -> Result<i64> {
        self.store.count_attempts(student_id, test_id).await
    }

    pub async fn latest_attempt(&self, student_id: i64, test_id: i64) -> Result<TestAttempt> {
        self.store
            .latest_attempt(student_id, test_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No attempts found for test {}", test_id)))
    }

    pub async fn attempt_detail(&self, attempt_id: Uuid) -> Result<AttemptDetail> {
        let attempt = self.get_attempt(attempt_id).await?;
        let answers = self.store.list_answers(attempt_id).await?;
        Ok(AttemptDetail { attempt, answers })
    }

    pub async fn test_questions(&self, test_id: i64) -> Result<Vec<Question>> {
        self.require_test(test_id).await?;
        self.catalog.list_questions(test_id).await
    }

    pub async fn ungraded_answers(&self, test_id: i64) -> Result<Vec<UngradedAnswer>> {
        self.require_test(test_id).await?;
        self.store.list_ungraded_answers(test_id).await
    }

    /// Teacher's decision on an open-question answer.
    pub async fn grade_answer(
        &self,
        attempt_id: Uuid,
        question_id: i64,
        is_correct: bool,
    ) -> Result<(TestAttempt, Answer)> {
        let attempt = self.get_attempt(attempt_id).await?;
        let questions = self.catalog.list_questions(attempt.test_id).await?;
        let question = questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or(Error::QuestionNotFound(question_id))?;
        if !question.is_open() {
            return Err(Error::InvalidAnswer(format!(
                "question {} is graded automatically",
                question_id
            )));
        }

        let (attempt, answer) = self
            .store
            .grade_answer(attempt_id, question_id, is_correct)
            .await
            .inspect_err(|e| {
                if e.is_storage() {
                    tracing::error!(error = %e, %attempt_id, question_id, "Storing manual grade failed");
                }
            })?;

        tracing::info!(%attempt_id, question_id, is_correct, "Answer graded manually");
        Ok((attempt, answer))
    }

    async fn require_test(&self, test_id: i64) -> Result<()> {
        match self.catalog.get_test(test_id).await? {
            Some(_) => Ok(()),
            None => Err(Error::TestNotFound(test_id)),
        }
    }

    pub async fn get_attempt(&self, attempt_id: Uuid) -> Result<TestAttempt> {
        self.store
            .get_attempt(attempt_id)
            .await?
            .ok_or(Error::AttemptNotFound(attempt_id))
    }
}

/// One line per question in test order; answers to questions no longer in
/// the test are ignored.
fn question_results(questions: &[Question], answers: &[Answer]) -> Vec<QuestionResult> {
    questions
        .iter()
        .map(|q| match answers.iter().find(|a| a.question_id == q.id) {
            Some(answer) => QuestionResult {
                question_id: q.id,
                answered: true,
                status: answer.verdict().into(),
            },
            None => QuestionResult {
                question_id: q.id,
                answered: false,
                status: ResultStatus::Unanswered,
            },
        })
        .collect()
}
