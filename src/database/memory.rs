//! Process-local store keeping everything behind one mutex.
//!
//! Holding the lock for a whole operation gives the same guarantees the
//! Postgres store gets from row locks and unique indexes.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::store::{AttemptStore, DifficultyStore, TestCatalog};
use crate::error::{Error, Result};
use crate::models::answer::{Answer, GradedAnswer, UngradedAnswer, Verdict};
use crate::models::difficulty::{Difficulty, QuestionStats};
use crate::models::question::{AnswerOption, Question, QuestionType};
use crate::models::test::Test;
use crate::models::test_attempt::{AttemptScore, TestAttempt};

#[derive(Default)]
struct Inner {
    next_id: i64,
    tests: BTreeMap<i64, Test>,
    questions: BTreeMap<i64, Question>,
    /// Insertion order doubles as start order.
    attempts: Vec<TestAttempt>,
    answers: BTreeMap<(Uuid, i64), Answer>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn attempt_mut(&mut self, attempt_id: Uuid) -> Result<&mut TestAttempt> {
        self.attempts
            .iter_mut()
            .find(|a| a.id == attempt_id)
            .ok_or(Error::AttemptNotFound(attempt_id))
    }

    fn correct_count(&self, attempt_id: Uuid) -> i32 {
        self.answers
            .values()
            .filter(|a| a.attempt_id == attempt_id && a.is_correct)
            .count() as i32
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))
    }

    pub fn add_test(&self, title: &str, course_id: i64) -> Result<Test> {
        let mut inner = self.lock()?;
        let test = Test {
            id: inner.next_id(),
            title: title.to_string(),
            description: None,
            course_id,
            created_at: Utc::now(),
        };
        inner.tests.insert(test.id, test.clone());
        Ok(test)
    }

    pub fn add_open_question(
        &self,
        test_id: i64,
        text: &str,
        correct_answer_text: Option<&str>,
    ) -> Result<Question> {
        self.add_question(test_id, text, QuestionType::Open, false, correct_answer_text)
    }

    pub fn add_closed_question(
        &self,
        test_id: i64,
        text: &str,
        multiple_choice: bool,
    ) -> Result<Question> {
        self.add_question(test_id, text, QuestionType::Closed, multiple_choice, None)
    }

    fn add_question(
        &self,
        test_id: i64,
        text: &str,
        question_type: QuestionType,
        multiple_choice: bool,
        correct_answer_text: Option<&str>,
    ) -> Result<Question> {
        let mut inner = self.lock()?;
        if !inner.tests.contains_key(&test_id) {
            return Err(Error::TestNotFound(test_id));
        }
        let question = Question {
            id: inner.next_id(),
            test_id,
            question_text: text.to_string(),
            question_type,
            multiple_choice,
            correct_answer_text: correct_answer_text.map(str::to_string),
            difficulty: None,
            created_at: Utc::now(),
            options: Vec::new(),
        };
        inner.questions.insert(question.id, question.clone());
        Ok(question)
    }

    pub fn add_option(&self, question_id: i64, text: &str, is_correct: bool) -> Result<AnswerOption> {
        let mut inner = self.lock()?;
        let id = inner.next_id();
        let question = inner
            .questions
            .get_mut(&question_id)
            .ok_or(Error::QuestionNotFound(question_id))?;
        let option = AnswerOption {
            id,
            question_id,
            option_text: text.to_string(),
            is_correct,
            created_at: Utc::now(),
        };
        question.options.push(option.clone());
        Ok(option)
    }

    pub fn set_correct_answer_text(&self, question_id: i64, text: Option<&str>) -> Result<()> {
        let mut inner = self.lock()?;
        let question = inner
            .questions
            .get_mut(&question_id)
            .ok_or(Error::QuestionNotFound(question_id))?;
        question.correct_answer_text = text.map(str::to_string);
        Ok(())
    }

    pub fn difficulty_of(&self, question_id: i64) -> Result<Option<Difficulty>> {
        let inner = self.lock()?;
        inner
            .questions
            .get(&question_id)
            .map(|q| q.difficulty)
            .ok_or(Error::QuestionNotFound(question_id))
    }

    pub fn answer_count(&self, attempt_id: Uuid) -> Result<usize> {
        let inner = self.lock()?;
        Ok(inner
            .answers
            .keys()
            .filter(|(attempt, _)| *attempt == attempt_id)
            .count())
    }
}

#[async_trait]
impl TestCatalog for MemoryStore {
    async fn get_test(&self, test_id: i64) -> Result<Option<Test>> {
        Ok(self.lock()?.tests.get(&test_id).cloned())
    }

    async fn list_questions(&self, test_id: i64) -> Result<Vec<Question>> {
        Ok(self
            .lock()?
            .questions
            .values()
            .filter(|q| q.test_id == test_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn insert_attempt(
        &self,
        student_id: i64,
        test_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<TestAttempt> {
        let mut inner = self.lock()?;
        if let Some(open) = inner
            .attempts
            .iter()
            .find(|a| a.student_id == student_id && a.test_id == test_id && !a.is_finished())
        {
            return Err(Error::AttemptConflict { attempt_id: open.id });
        }
        let attempt = TestAttempt {
            id: Uuid::new_v4(),
            student_id,
            test_id,
            started_at,
            finished_at: None,
            score: None,
            percentage: None,
            correct_count: None,
            total_questions: None,
        };
        inner.attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<Option<TestAttempt>> {
        Ok(self
            .lock()?
            .attempts
            .iter()
            .find(|a| a.id == attempt_id)
            .cloned())
    }

    async fn latest_attempt(&self, student_id: i64, test_id: i64) -> Result<Option<TestAttempt>> {
        Ok(self
            .lock()?
            .attempts
            .iter()
            .rev()
            .find(|a| a.student_id == student_id && a.test_id == test_id)
            .cloned())
    }

    async fn count_attempts(&self, student_id: i64, test_id: i64) -> Result<i64> {
        Ok(self
            .lock()?
            .attempts
            .iter()
            .filter(|a| a.student_id == student_id && a.test_id == test_id)
            .count() as i64)
    }

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>> {
        Ok(self
            .lock()?
            .answers
            .values()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn upsert_answer(
        &self,
        attempt_id: Uuid,
        question_id: i64,
        graded: &GradedAnswer,
        submitted_at: DateTime<Utc>,
    ) -> Result<Answer> {
        let mut inner = self.lock()?;
        if inner.attempt_mut(attempt_id)?.is_finished() {
            return Err(Error::AttemptAlreadyFinished(attempt_id));
        }
        let mut answer = Answer::new(attempt_id, question_id, graded, submitted_at);
        if let Some(previous) = inner.answers.get(&(attempt_id, question_id)) {
            answer.id = previous.id;
        }
        inner
            .answers
            .insert((attempt_id, question_id), answer.clone());
        Ok(answer)
    }

    async fn finish_attempt(
        &self,
        attempt_id: Uuid,
        finished_at: DateTime<Utc>,
        total_questions: i32,
        regrade: &(dyn for<'r> Fn(&'r Answer) -> Verdict + Send + Sync),
    ) -> Result<(TestAttempt, Vec<Answer>)> {
        let mut inner = self.lock()?;
        if inner.attempt_mut(attempt_id)?.is_finished() {
            return Err(Error::AttemptAlreadyFinished(attempt_id));
        }

        let mut answers = Vec::new();
        for answer in inner.answers.values_mut() {
            if answer.attempt_id == attempt_id {
                let verdict = regrade(answer);
                answer.apply_verdict(verdict);
                answers.push(answer.clone());
            }
        }

        let correct = answers.iter().filter(|a| a.is_correct).count() as i32;
        let score = AttemptScore::from_counts(correct, total_questions);
        let attempt = inner.attempt_mut(attempt_id)?;
        attempt.finished_at = Some(finished_at);
        attempt.score = Some(score.score);
        attempt.percentage = Some(score.percentage);
        attempt.correct_count = Some(score.correct_count);
        attempt.total_questions = Some(score.total_questions);
        Ok((attempt.clone(), answers))
    }

    async fn grade_answer(
        &self,
        attempt_id: Uuid,
        question_id: i64,
        is_correct: bool,
    ) -> Result<(TestAttempt, Answer)> {
        let mut inner = self.lock()?;
        inner.attempt_mut(attempt_id)?;

        let answer = inner
            .answers
            .get_mut(&(attempt_id, question_id))
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "No answer to question {} in attempt {}",
                    question_id, attempt_id
                ))
            })?;
        answer.grade_manually(is_correct);
        let answer = answer.clone();

        let correct = inner.correct_count(attempt_id);
        let attempt = inner.attempt_mut(attempt_id)?;
        if attempt.is_finished() {
            let score = AttemptScore::from_counts(correct, attempt.total_questions.unwrap_or(0));
            attempt.score = Some(score.score);
            attempt.percentage = Some(score.percentage);
            attempt.correct_count = Some(score.correct_count);
        }
        Ok((attempt.clone(), answer))
    }

    async fn list_ungraded_answers(&self, test_id: i64) -> Result<Vec<UngradedAnswer>> {
        let inner = self.lock()?;
        let mut rows: Vec<UngradedAnswer> = inner
            .answers
            .values()
            .filter(|a| a.ungraded)
            .filter_map(|a| {
                let attempt = inner
                    .attempts
                    .iter()
                    .find(|t| t.id == a.attempt_id && t.test_id == test_id)?;
                let question = inner.questions.get(&a.question_id)?;
                Some(UngradedAnswer {
                    attempt_id: a.attempt_id,
                    student_id: attempt.student_id,
                    question_id: a.question_id,
                    question_text: question.question_text.clone(),
                    answer_text: a.answer_text.clone(),
                    submitted_at: a.submitted_at,
                })
            })
            .collect();
        rows.sort_by_key(|r| r.submitted_at);
        Ok(rows)
    }
}

#[async_trait]
impl DifficultyStore for MemoryStore {
    async fn question_stats(&self, min_answers: i64) -> Result<Vec<QuestionStats>> {
        let inner = self.lock()?;
        let mut totals: HashMap<i64, (i64, i64)> = HashMap::new();
        for answer in inner.answers.values().filter(|a| !a.ungraded) {
            let entry = totals.entry(answer.question_id).or_default();
            entry.0 += 1;
            if answer.is_correct {
                entry.1 += 1;
            }
        }
        let mut stats: Vec<QuestionStats> = totals
            .into_iter()
            .filter(|(_, (total, _))| *total >= min_answers)
            .filter_map(|(question_id, (total_count, correct_count))| {
                let question = inner.questions.get(&question_id)?;
                Some(QuestionStats {
                    question_id,
                    total_count,
                    correct_count,
                    current: question.difficulty,
                })
            })
            .collect();
        stats.sort_by_key(|s| s.question_id);
        Ok(stats)
    }

    async fn apply_difficulty(&self, updates: &[(i64, Difficulty)]) -> Result<u64> {
        let mut inner = self.lock()?;
        if let Some((missing, _)) = updates
            .iter()
            .find(|(id, _)| !inner.questions.contains_key(id))
        {
            return Err(Error::QuestionNotFound(*missing));
        }
        let mut changed = 0;
        for (question_id, difficulty) in updates {
            if let Some(question) = inner.questions.get_mut(question_id) {
                if question.difficulty != Some(*difficulty) {
                    question.difficulty = Some(*difficulty);
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn list_question_texts(&self) -> Result<Vec<(i64, String, Option<Difficulty>)>> {
        Ok(self
            .lock()?
            .questions
            .values()
            .map(|q| (q.id, q.question_text.clone(), q.difficulty))
            .collect())
    }

    async fn set_difficulty(&self, question_id: i64, difficulty: Difficulty) -> Result<()> {
        let mut inner = self.lock()?;
        let question = inner
            .questions
            .get_mut(&question_id)
            .ok_or(Error::QuestionNotFound(question_id))?;
        question.difficulty = Some(difficulty);
        Ok(())
    }
}
