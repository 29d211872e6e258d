use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::database::store::{AttemptStore, DifficultyStore, TestCatalog};
use crate::error::{Error, Result};
use crate::models::answer::{Answer, GradedAnswer, UngradedAnswer, Verdict};
use crate::models::difficulty::{Difficulty, QuestionStats};
use crate::models::question::{AnswerOption, Question};
use crate::models::test::Test;
use crate::models::test_attempt::{AttemptScore, TestAttempt};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn question_from_row(row: &PgRow) -> Result<Question> {
    let question_type: String = row.try_get("question_type")?;
    let difficulty: Option<String> = row.try_get("difficulty")?;
    Ok(Question {
        id: row.try_get("id")?,
        test_id: row.try_get("test_id")?,
        question_text: row.try_get("question_text")?,
        question_type: question_type.parse()?,
        multiple_choice: row.try_get("multiple_choice")?,
        correct_answer_text: row.try_get("correct_answer_text")?,
        difficulty: difficulty.and_then(|d| d.parse().ok()),
        created_at: row.try_get("created_at")?,
        options: Vec::new(),
    })
}

#[async_trait]
impl TestCatalog for PgStore {
    async fn get_test(&self, test_id: i64) -> Result<Option<Test>> {
        let test = sqlx::query_as::<_, Test>(
            r#"SELECT id, title, description, course_id, created_at FROM tests WHERE id = $1"#,
        )
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(test)
    }

    async fn list_questions(&self, test_id: i64) -> Result<Vec<Question>> {
        let rows = sqlx::query(
            r#"
            SELECT id, test_id, question_text, question_type, multiple_choice,
                   correct_answer_text, difficulty, created_at
            FROM questions
            WHERE test_id = $1
            ORDER BY id
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        let mut questions = rows
            .iter()
            .map(question_from_row)
            .collect::<Result<Vec<_>>>()?;
        if questions.is_empty() {
            return Ok(questions);
        }

        let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let options = sqlx::query_as::<_, AnswerOption>(
            r#"
            SELECT id, question_id, option_text, is_correct, created_at
            FROM options
            WHERE question_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_question: HashMap<i64, Vec<AnswerOption>> = HashMap::new();
        for option in options {
            by_question.entry(option.question_id).or_default().push(option);
        }
        for q in questions.iter_mut() {
            q.options = by_question.remove(&q.id).unwrap_or_default();
        }
        Ok(questions)
    }
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn insert_attempt(
        &self,
        student_id: i64,
        test_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<TestAttempt> {
        // The partial unique index on open attempts makes this the single
        // point where two concurrent starts are serialized.
        let inserted = sqlx::query_as::<_, TestAttempt>(
            r#"
            INSERT INTO test_attempts (id, student_id, test_id, started_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (student_id, test_id) WHERE finished_at IS NULL DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(test_id)
        .bind(started_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(attempt) = inserted {
            return Ok(attempt);
        }

        let open: Option<Uuid> = sqlx::query_scalar(
            r#"SELECT id FROM test_attempts
               WHERE student_id = $1 AND test_id = $2 AND finished_at IS NULL"#,
        )
        .bind(student_id)
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;

        match open {
            Some(attempt_id) => Err(Error::AttemptConflict { attempt_id }),
            None => Err(Error::Internal(
                "open attempt changed state during start, retry".to_string(),
            )),
        }
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<Option<TestAttempt>> {
        let attempt =
            sqlx::query_as::<_, TestAttempt>(r#"SELECT * FROM test_attempts WHERE id = $1"#)
                .bind(attempt_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(attempt)
    }

    async fn latest_attempt(&self, student_id: i64, test_id: i64) -> Result<Option<TestAttempt>> {
        let attempt = sqlx::query_as::<_, TestAttempt>(
            r#"
            SELECT * FROM test_attempts
            WHERE student_id = $1 AND test_id = $2
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attempt)
    }

    async fn count_attempts(&self, student_id: i64, test_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM test_attempts WHERE student_id = $1 AND test_id = $2"#,
        )
        .bind(student_id)
        .bind(test_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>> {
        let answers = sqlx::query_as::<_, Answer>(
            r#"SELECT * FROM attempt_answers WHERE attempt_id = $1 ORDER BY question_id"#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(answers)
    }

    async fn upsert_answer(
        &self,
        attempt_id: Uuid,
        question_id: i64,
        graded: &GradedAnswer,
        submitted_at: DateTime<Utc>,
    ) -> Result<Answer> {
        let mut tx = self.pool.begin().await?;

        let finished_at: Option<Option<DateTime<Utc>>> = sqlx::query_scalar(
            r#"SELECT finished_at FROM test_attempts WHERE id = $1 FOR UPDATE"#,
        )
        .bind(attempt_id)
        .fetch_optional(&mut *tx)
        .await?;
        match finished_at {
            None => return Err(Error::AttemptNotFound(attempt_id)),
            Some(Some(_)) => return Err(Error::AttemptAlreadyFinished(attempt_id)),
            Some(None) => {}
        }

        let answer = Answer::new(attempt_id, question_id, graded, submitted_at);
        let saved = sqlx::query_as::<_, Answer>(
            r#"
            INSERT INTO attempt_answers (
                id, attempt_id, question_id, answer_text, option_ids,
                is_correct, ungraded, graded_manually, submitted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (attempt_id, question_id) DO UPDATE
            SET answer_text = EXCLUDED.answer_text,
                option_ids = EXCLUDED.option_ids,
                is_correct = EXCLUDED.is_correct,
                ungraded = EXCLUDED.ungraded,
                graded_manually = EXCLUDED.graded_manually,
                submitted_at = EXCLUDED.submitted_at
            RETURNING *
            "#,
        )
        .bind(answer.id)
        .bind(answer.attempt_id)
        .bind(answer.question_id)
        .bind(&answer.answer_text)
        .bind(&answer.option_ids)
        .bind(answer.is_correct)
        .bind(answer.ungraded)
        .bind(answer.graded_manually)
        .bind(answer.submitted_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn finish_attempt(
        &self,
        attempt_id: Uuid,
        finished_at: DateTime<Utc>,
        total_questions: i32,
        regrade: &(dyn for<'r> Fn(&'r Answer) -> Verdict + Send + Sync),
    ) -> Result<(TestAttempt, Vec<Answer>)> {
        let mut tx = self.pool.begin().await?;

        let attempt = sqlx::query_as::<_, TestAttempt>(
            r#"SELECT * FROM test_attempts WHERE id = $1 FOR UPDATE"#,
        )
        .bind(attempt_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::AttemptNotFound(attempt_id))?;
        if attempt.is_finished() {
            return Err(Error::AttemptAlreadyFinished(attempt_id));
        }

        let mut answers = sqlx::query_as::<_, Answer>(
            r#"SELECT * FROM attempt_answers WHERE attempt_id = $1 ORDER BY question_id"#,
        )
        .bind(attempt_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut correct = 0;
        for answer in answers.iter_mut() {
            let verdict = regrade(answer);
            if verdict != answer.verdict() {
                answer.apply_verdict(verdict);
                sqlx::query(
                    r#"UPDATE attempt_answers SET is_correct = $2, ungraded = $3 WHERE id = $1"#,
                )
                .bind(answer.id)
                .bind(answer.is_correct)
                .bind(answer.ungraded)
                .execute(&mut *tx)
                .await?;
            }
            if answer.is_correct {
                correct += 1;
            }
        }

        let score = AttemptScore::from_counts(correct, total_questions);
        let finished = sqlx::query_as::<_, TestAttempt>(
            r#"
            UPDATE test_attempts
            SET finished_at = $2, score = $3, percentage = $4,
                correct_count = $5, total_questions = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(attempt_id)
        .bind(finished_at)
        .bind(score.score)
        .bind(score.percentage)
        .bind(score.correct_count)
        .bind(score.total_questions)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((finished, answers))
    }

    async fn grade_answer(
        &self,
        attempt_id: Uuid,
        question_id: i64,
        is_correct: bool,
    ) -> Result<(TestAttempt, Answer)> {
        let mut tx = self.pool.begin().await?;

        let mut attempt = sqlx::query_as::<_, TestAttempt>(
            r#"SELECT * FROM test_attempts WHERE id = $1 FOR UPDATE"#,
        )
        .bind(attempt_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::AttemptNotFound(attempt_id))?;

        let answer = sqlx::query_as::<_, Answer>(
            r#"
            UPDATE attempt_answers
            SET is_correct = $3, ungraded = FALSE, graded_manually = TRUE
            WHERE attempt_id = $1 AND question_id = $2
            RETURNING *
            "#,
        )
        .bind(attempt_id)
        .bind(question_id)
        .bind(is_correct)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "No answer to question {} in attempt {}",
                question_id, attempt_id
            ))
        })?;

        if attempt.is_finished() {
            let correct: i64 = sqlx::query_scalar(
                r#"SELECT COUNT(*) FROM attempt_answers WHERE attempt_id = $1 AND is_correct"#,
            )
            .bind(attempt_id)
            .fetch_one(&mut *tx)
            .await?;
            let score =
                AttemptScore::from_counts(correct as i32, attempt.total_questions.unwrap_or(0));
            attempt = sqlx::query_as::<_, TestAttempt>(
                r#"
                UPDATE test_attempts
                SET score = $2, percentage = $3, correct_count = $4
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(attempt_id)
            .bind(score.score)
            .bind(score.percentage)
            .bind(score.correct_count)
            .fetch_one(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok((attempt, answer))
    }

    async fn list_ungraded_answers(&self, test_id: i64) -> Result<Vec<UngradedAnswer>> {
        let rows = sqlx::query_as::<_, UngradedAnswer>(
            r#"
            SELECT a.attempt_id, t.student_id, a.question_id, q.question_text,
                   a.answer_text, a.submitted_at
            FROM attempt_answers a
            JOIN test_attempts t ON t.id = a.attempt_id
            JOIN questions q ON q.id = a.question_id
            WHERE t.test_id = $1 AND a.ungraded
            ORDER BY a.submitted_at
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl DifficultyStore for PgStore {
    async fn question_stats(&self, min_answers: i64) -> Result<Vec<QuestionStats>> {
        let rows = sqlx::query(
            r#"
            SELECT a.question_id,
                   COUNT(*) AS total_count,
                   COUNT(*) FILTER (WHERE a.is_correct) AS correct_count,
                   q.difficulty
            FROM attempt_answers a
            JOIN questions q ON q.id = a.question_id
            WHERE NOT a.ungraded
            GROUP BY a.question_id, q.difficulty
            HAVING COUNT(*) >= $1
            "#,
        )
        .bind(min_answers)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<QuestionStats> {
                let current: Option<String> = row.try_get("difficulty")?;
                Ok(QuestionStats {
                    question_id: row.try_get("question_id")?,
                    total_count: row.try_get("total_count")?,
                    correct_count: row.try_get("correct_count")?,
                    current: current.and_then(|d| d.parse().ok()),
                })
            })
            .collect()
    }

    async fn apply_difficulty(&self, updates: &[(i64, Difficulty)]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut changed = 0;
        for (question_id, difficulty) in updates {
            let res = sqlx::query(
                r#"UPDATE questions SET difficulty = $2
                   WHERE id = $1 AND difficulty IS DISTINCT FROM $2"#,
            )
            .bind(question_id)
            .bind(difficulty.as_str())
            .execute(&mut *tx)
            .await?;
            changed += res.rows_affected();
        }
        tx.commit().await?;
        Ok(changed)
    }

    async fn list_question_texts(&self) -> Result<Vec<(i64, String, Option<Difficulty>)>> {
        let rows = sqlx::query(r#"SELECT id, question_text, difficulty FROM questions ORDER BY id"#)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<(i64, String, Option<Difficulty>)> {
                let current: Option<String> = row.try_get("difficulty")?;
                Ok((
                    row.try_get("id")?,
                    row.try_get("question_text")?,
                    current.and_then(|d| d.parse().ok()),
                ))
            })
            .collect()
    }

    async fn set_difficulty(&self, question_id: i64, difficulty: Difficulty) -> Result<()> {
        sqlx::query(r#"UPDATE questions SET difficulty = $2 WHERE id = $1"#)
            .bind(question_id)
            .bind(difficulty.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
