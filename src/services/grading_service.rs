use std::collections::BTreeSet;

use crate::config::OpenAnswerPolicy;
use crate::error::{Error, Result};
use crate::models::answer::{Answer, AnswerPayload, GradedAnswer, Verdict};
use crate::models::question::{Question, QuestionType};

/// Decides correctness of a single answer. No partial credit: a
/// multiple-choice answer is correct only when the selected set equals the
/// set of correct options.
pub struct GradingService;

impl GradingService {
    /// Validate a fresh submission against the question and grade it.
    pub fn grade(
        question: &Question,
        payload: &AnswerPayload,
        policy: OpenAnswerPolicy,
    ) -> Result<GradedAnswer> {
        match (question.question_type, payload) {
            (QuestionType::Open, AnswerPayload::Text { text }) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(Error::InvalidAnswer("answer text is empty".to_string()));
                }
                Ok(GradedAnswer {
                    payload: AnswerPayload::Text {
                        text: text.to_string(),
                    },
                    verdict: Self::open_verdict(question, text, policy),
                })
            }
            (QuestionType::Closed, AnswerPayload::Options { option_ids }) => {
                let selected: BTreeSet<i64> = option_ids.iter().copied().collect();
                if selected.is_empty() {
                    return Err(Error::InvalidAnswer(
                        "select at least one option".to_string(),
                    ));
                }
                if let Some(unknown) = selected.iter().find(|id| !question.has_option(**id)) {
                    return Err(Error::InvalidAnswer(format!(
                        "option {} does not belong to question {}",
                        unknown, question.id
                    )));
                }
                if !question.is_multiple_choice() && selected.len() > 1 {
                    return Err(Error::InvalidAnswer(format!(
                        "question {} accepts a single option",
                        question.id
                    )));
                }
                let verdict = Self::closed_verdict(question, &selected);
                Ok(GradedAnswer {
                    payload: AnswerPayload::Options {
                        option_ids: selected.into_iter().collect(),
                    },
                    verdict,
                })
            }
            (QuestionType::Open, AnswerPayload::Options { .. }) => Err(Error::InvalidAnswer(
                format!("question {} expects a text answer", question.id),
            )),
            (QuestionType::Closed, AnswerPayload::Text { .. }) => Err(Error::InvalidAnswer(
                format!("question {} expects selected options", question.id),
            )),
        }
    }

    /// Grade a stored answer again against the current question. Anything
    /// that no longer fits the question counts as incorrect. A teacher's
    /// decision is kept as is.
    pub fn regrade(question: Option<&Question>, answer: &Answer, policy: OpenAnswerPolicy) -> Verdict {
        let Some(question) = question else {
            return Verdict::Incorrect;
        };
        if answer.graded_manually {
            return answer.verdict();
        }
        match (question.question_type, answer.payload()) {
            (QuestionType::Open, AnswerPayload::Text { text }) => {
                Self::open_verdict(question, &text, policy)
            }
            (QuestionType::Closed, AnswerPayload::Options { option_ids }) => {
                let selected: BTreeSet<i64> = option_ids.into_iter().collect();
                if !question.is_multiple_choice() && selected.len() > 1 {
                    return Verdict::Incorrect;
                }
                Self::closed_verdict(question, &selected)
            }
            _ => Verdict::Incorrect,
        }
    }

    pub fn normalize_text(text: &str, policy: OpenAnswerPolicy) -> String {
        match policy {
            OpenAnswerPolicy::Exact => text.trim().to_lowercase(),
            OpenAnswerPolicy::Normalized => text
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
        }
    }

    fn open_verdict(question: &Question, text: &str, policy: OpenAnswerPolicy) -> Verdict {
        if question.awaits_manual_grading() {
            return Verdict::Ungraded;
        }
        let expected = question.correct_answer_text.as_deref().unwrap_or_default();
        if Self::normalize_text(text, policy) == Self::normalize_text(expected, policy) {
            Verdict::Correct
        } else {
            Verdict::Incorrect
        }
    }

    fn closed_verdict(question: &Question, selected: &BTreeSet<i64>) -> Verdict {
        let correct = question.correct_option_ids();
        if !correct.is_empty() && *selected == correct {
            Verdict::Correct
        } else {
            Verdict::Incorrect
        }
    }
}
