use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use learning_backend::config::OpenAnswerPolicy;
use learning_backend::error::Error;
use learning_backend::models::answer::{Answer, AnswerPayload, GradedAnswer, Verdict};
use learning_backend::models::question::{AnswerOption, Question, QuestionType};
use learning_backend::models::test_attempt::AttemptScore;
use learning_backend::services::grading_service::GradingService;

fn option(id: i64, question_id: i64, is_correct: bool) -> AnswerOption {
    AnswerOption {
        id,
        question_id,
        option_text: format!("option {}", id),
        is_correct,
        created_at: Utc::now(),
    }
}

fn closed(id: i64, multiple_choice: bool, options: Vec<AnswerOption>) -> Question {
    Question {
        id,
        test_id: 1,
        question_text: format!("question {}", id),
        question_type: QuestionType::Closed,
        multiple_choice,
        correct_answer_text: None,
        difficulty: None,
        created_at: Utc::now(),
        options,
    }
}

fn open(id: i64, correct: Option<&str>) -> Question {
    Question {
        id,
        test_id: 1,
        question_text: format!("question {}", id),
        question_type: QuestionType::Open,
        multiple_choice: false,
        correct_answer_text: correct.map(str::to_string),
        difficulty: None,
        created_at: Utc::now(),
        options: Vec::new(),
    }
}

fn options(ids: &[i64]) -> AnswerPayload {
    AnswerPayload::Options {
        option_ids: ids.to_vec(),
    }
}

fn text(s: &str) -> AnswerPayload {
    AnswerPayload::Text {
        text: s.to_string(),
    }
}

fn verdict(question: &Question, payload: AnswerPayload) -> Verdict {
    GradingService::grade(question, &payload, OpenAnswerPolicy::Exact)
        .expect("graded")
        .verdict
}

#[test]
fn multiple_choice_requires_exact_set() {
    // A and B are correct, C is not.
    let q = closed(
        10,
        true,
        vec![option(1, 10, true), option(2, 10, true), option(3, 10, false)],
    );

    assert_eq!(verdict(&q, options(&[1, 2])), Verdict::Correct);
    assert_eq!(verdict(&q, options(&[2, 1])), Verdict::Correct);
    assert_eq!(verdict(&q, options(&[1])), Verdict::Incorrect);
    assert_eq!(verdict(&q, options(&[1, 2, 3])), Verdict::Incorrect);
    assert_eq!(verdict(&q, options(&[3])), Verdict::Incorrect);
}

#[test]
fn duplicate_option_ids_are_collapsed() {
    let q = closed(10, true, vec![option(1, 10, true), option(2, 10, true)]);
    let graded = GradingService::grade(&q, &options(&[2, 1, 2]), OpenAnswerPolicy::Exact)
        .expect("graded");
    assert_eq!(
        graded,
        GradedAnswer {
            payload: options(&[1, 2]),
            verdict: Verdict::Correct,
        }
    );
}

#[test]
fn single_choice_accepts_exactly_one_option() {
    let q = closed(20, false, vec![option(4, 20, true), option(5, 20, false)]);

    assert_eq!(verdict(&q, options(&[4])), Verdict::Correct);
    assert_eq!(verdict(&q, options(&[5])), Verdict::Incorrect);

    let err = GradingService::grade(&q, &options(&[4, 5]), OpenAnswerPolicy::Exact)
        .expect_err("two options");
    assert!(matches!(err, Error::InvalidAnswer(_)));
}

#[test]
fn closed_question_without_correct_option_never_matches() {
    let q = closed(21, false, vec![option(6, 21, false)]);
    assert_eq!(verdict(&q, options(&[6])), Verdict::Incorrect);
}

#[test]
fn foreign_option_and_kind_mismatch_are_rejected() {
    let q = closed(30, true, vec![option(7, 30, true)]);
    assert!(matches!(
        GradingService::grade(&q, &options(&[99]), OpenAnswerPolicy::Exact),
        Err(Error::InvalidAnswer(_))
    ));
    assert!(matches!(
        GradingService::grade(&q, &text("seven"), OpenAnswerPolicy::Exact),
        Err(Error::InvalidAnswer(_))
    ));

    let o = open(31, Some("Paris"));
    assert!(matches!(
        GradingService::grade(&o, &options(&[7]), OpenAnswerPolicy::Exact),
        Err(Error::InvalidAnswer(_))
    ));
    assert!(matches!(
        GradingService::grade(&o, &text("   "), OpenAnswerPolicy::Exact),
        Err(Error::InvalidAnswer(_))
    ));
}

#[test]
fn open_answers_compare_trimmed_and_case_insensitive() {
    let q = open(40, Some("Paris"));
    assert_eq!(verdict(&q, text("paris ")), Verdict::Correct);
    assert_eq!(verdict(&q, text("  PARIS")), Verdict::Correct);
    assert_eq!(verdict(&q, text("Lyon")), Verdict::Incorrect);

    let graded = GradingService::grade(&q, &text("  Paris \n"), OpenAnswerPolicy::Exact)
        .expect("graded");
    assert_eq!(graded.payload, text("Paris"));
}

#[test]
fn inner_whitespace_depends_on_policy() {
    let q = open(41, Some("New York"));
    let answer = text("new   york");

    let exact = GradingService::grade(&q, &answer, OpenAnswerPolicy::Exact).expect("graded");
    assert_eq!(exact.verdict, Verdict::Incorrect);

    let normalized =
        GradingService::grade(&q, &answer, OpenAnswerPolicy::Normalized).expect("graded");
    assert_eq!(normalized.verdict, Verdict::Correct);
}

#[test]
fn open_question_without_reference_text_is_ungraded() {
    assert_eq!(verdict(&open(42, None), text("anything")), Verdict::Ungraded);
    assert_eq!(verdict(&open(43, Some("  ")), text("anything")), Verdict::Ungraded);
}

#[test]
fn regrade_follows_current_question() {
    let attempt_id = Uuid::new_v4();
    let q = closed(50, false, vec![option(8, 50, true), option(9, 50, false)]);
    let stored = Answer::new(
        attempt_id,
        50,
        &GradedAnswer {
            payload: options(&[9]),
            verdict: Verdict::Incorrect,
        },
        Utc::now(),
    );

    assert_eq!(
        GradingService::regrade(Some(&q), &stored, OpenAnswerPolicy::Exact),
        Verdict::Incorrect
    );

    // The answer key changed after the answer was stored.
    let fixed = closed(50, false, vec![option(8, 50, false), option(9, 50, true)]);
    assert_eq!(
        GradingService::regrade(Some(&fixed), &stored, OpenAnswerPolicy::Exact),
        Verdict::Correct
    );

    assert_eq!(
        GradingService::regrade(None, &stored, OpenAnswerPolicy::Exact),
        Verdict::Incorrect
    );
}

#[test]
fn regrade_keeps_manual_decision() {
    let q = open(60, None);
    let mut stored = Answer::new(
        Uuid::new_v4(),
        60,
        &GradedAnswer {
            payload: text("an essay"),
            verdict: Verdict::Ungraded,
        },
        Utc::now(),
    );
    assert_eq!(
        GradingService::regrade(Some(&q), &stored, OpenAnswerPolicy::Exact),
        Verdict::Ungraded
    );

    stored.grade_manually(true);
    assert_eq!(
        GradingService::regrade(Some(&q), &stored, OpenAnswerPolicy::Exact),
        Verdict::Correct
    );

    // Reference text added later does not override the teacher.
    let keyed = open(60, Some("something else"));
    assert_eq!(
        GradingService::regrade(Some(&keyed), &stored, OpenAnswerPolicy::Exact),
        Verdict::Correct
    );
}

#[test]
fn automatic_verdict_is_not_mistaken_for_manual() {
    let keyed = open(61, Some("Paris"));
    let stored = Answer::new(
        Uuid::new_v4(),
        61,
        &GradedAnswer {
            payload: text("paris"),
            verdict: Verdict::Correct,
        },
        Utc::now(),
    );
    assert!(!stored.graded_manually);

    // Reference text removed after auto-grading: the answer goes back to
    // the teacher instead of keeping its old verdict.
    let cleared = open(61, None);
    assert_eq!(
        GradingService::regrade(Some(&cleared), &stored, OpenAnswerPolicy::Exact),
        Verdict::Ungraded
    );
}

#[test]
fn score_from_counts() {
    let score = AttemptScore::from_counts(2, 3);
    assert_eq!(score.percentage, Decimal::new(6667, 2));
    assert!((score.score - 2.0 / 3.0).abs() < 1e-9);

    let empty = AttemptScore::from_counts(0, 0);
    assert_eq!(empty.score, 0.0);
    assert_eq!(empty.percentage, Decimal::ZERO);
}
