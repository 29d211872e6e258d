mod common;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use learning_backend::database::memory::MemoryStore;
use learning_backend::middleware::auth::Role;

use common::{build_app, seed_capitals, send, send_raw, test_config, token};

#[tokio::test]
async fn attempt_flow_end_to_end() {
    let store = Arc::new(MemoryStore::new());
    let seed = seed_capitals(&store);
    let app = build_app(store.clone(), test_config());
    let student = token(7, Role::Student);

    let (status, started) = send(
        &app,
        Method::POST,
        &format!("/api/tests/{}/attempts", seed.test_id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(started["state"], "in_progress");
    assert_eq!(started["student_id"], 7);
    let attempt_id = started["id"].as_str().expect("attempt id").to_string();
    let answers_uri = format!("/api/attempts/{}/answers", attempt_id);

    let (status, body) = send(
        &app,
        Method::POST,
        &answers_uri,
        Some(&student),
        Some(json!({
            "question_id": seed.single,
            "answer": { "kind": "options", "option_ids": [seed.single_correct] }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["saved"], true);
    assert_eq!(body["is_correct"], true);

    let (status, body) = send(
        &app,
        Method::POST,
        &answers_uri,
        Some(&student),
        Some(json!({
            "question_id": seed.multiple,
            "answer": { "kind": "options", "option_ids": [seed.multi_a] }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_correct"], false);

    let (status, body) = send(
        &app,
        Method::POST,
        &answers_uri,
        Some(&student),
        Some(json!({
            "question_id": seed.open,
            "answer": { "kind": "text", "text": "paris " }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verdict"], "correct");

    let (status, finished) = send(
        &app,
        Method::PATCH,
        &format!("/api/attempts/{}/finish", attempt_id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let attempt = &finished["attempt"];
    assert_eq!(attempt["state"], "finished");
    assert_eq!(attempt["correct_count"], 2);
    assert_eq!(attempt["total_questions"], 3);
    assert_eq!(attempt["percentage"], "66.67");
    let score = attempt["score"].as_f64().expect("score");
    assert!((score - 2.0 / 3.0).abs() < 1e-9);

    let results = finished["results"].as_array().expect("results");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["status"], "correct");
    assert_eq!(results[1]["status"], "incorrect");
    assert_eq!(results[2]["status"], "correct");
}

#[tokio::test]
async fn second_start_while_in_progress_conflicts() {
    let store = Arc::new(MemoryStore::new());
    let seed = seed_capitals(&store);
    let app = build_app(store, test_config());
    let student = token(11, Role::Student);
    let uri = format!("/api/tests/{}/attempts", seed.test_id);

    let (status, first) = send(&app, Method::POST, &uri, Some(&student), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::POST, &uri, Some(&student), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "attempt_conflict");
    assert_eq!(body["attempt_id"], first["id"]);

    let (_, count) = send(
        &app,
        Method::GET,
        &format!("/api/tests/{}/attempts/count", seed.test_id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(count["count"], 1);
}

#[tokio::test]
async fn answers_after_finish_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let seed = seed_capitals(&store);
    let app = build_app(store.clone(), test_config());
    let student = token(12, Role::Student);

    let (_, started) = send(
        &app,
        Method::POST,
        &format!("/api/tests/{}/attempts", seed.test_id),
        Some(&student),
        None,
    )
    .await;
    let attempt_id: Uuid = started["id"].as_str().expect("id").parse().expect("uuid");

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/attempts/{}/finish", attempt_id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/attempts/{}/answers", attempt_id),
        Some(&student),
        Some(json!({
            "question_id": seed.open,
            "answer": { "kind": "text", "text": "Paris" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "attempt_already_finished");
    assert_eq!(store.answer_count(attempt_id).expect("count"), 0);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/attempts/{}/finish", attempt_id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "attempt_already_finished");
}

#[tokio::test]
async fn resubmitting_replaces_previous_answer() {
    let store = Arc::new(MemoryStore::new());
    let seed = seed_capitals(&store);
    let app = build_app(store.clone(), test_config());
    let student = token(13, Role::Student);

    let (_, started) = send(
        &app,
        Method::POST,
        &format!("/api/tests/{}/attempts", seed.test_id),
        Some(&student),
        None,
    )
    .await;
    let attempt_id: Uuid = started["id"].as_str().expect("id").parse().expect("uuid");
    let uri = format!("/api/attempts/{}/answers", attempt_id);

    let (_, first) = send(
        &app,
        Method::POST,
        &uri,
        Some(&student),
        Some(json!({
            "question_id": seed.single,
            "answer": { "kind": "options", "option_ids": [seed.single_wrong] }
        })),
    )
    .await;
    assert_eq!(first["is_correct"], false);

    let (_, second) = send(
        &app,
        Method::POST,
        &uri,
        Some(&student),
        Some(json!({
            "question_id": seed.single,
            "answer": { "kind": "options", "option_ids": [seed.single_correct] }
        })),
    )
    .await;
    assert_eq!(second["is_correct"], true);
    assert_eq!(store.answer_count(attempt_id).expect("count"), 1);

    let (status, detail) = send(
        &app,
        Method::GET,
        &format!("/api/attempts/{}", attempt_id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let answers = detail["answers"].as_array().expect("answers");
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0]["answer"]["option_ids"], json!([seed.single_correct]));
}

#[tokio::test]
async fn latest_attempt_and_count_follow_history() {
    let store = Arc::new(MemoryStore::new());
    let seed = seed_capitals(&store);
    let app = build_app(store, test_config());
    let student = token(14, Role::Student);
    let latest_uri = format!("/api/tests/{}/attempts/latest", seed.test_id);
    let count_uri = format!("/api/tests/{}/attempts/count", seed.test_id);
    let start_uri = format!("/api/tests/{}/attempts", seed.test_id);

    let (status, body) = send(&app, Method::GET, &latest_uri, Some(&student), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (_, count) = send(&app, Method::GET, &count_uri, Some(&student), None).await;
    assert_eq!(count["count"], 0);

    let (_, first) = send(&app, Method::POST, &start_uri, Some(&student), None).await;
    let first_id = first["id"].as_str().expect("id").to_string();
    send(
        &app,
        Method::PATCH,
        &format!("/api/attempts/{}/finish", first_id),
        Some(&student),
        None,
    )
    .await;

    let (status, latest) = send(&app, Method::GET, &latest_uri, Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["id"], first_id.as_str());
    assert_eq!(latest["state"], "finished");

    let (status, second) = send(&app, Method::POST, &start_uri, Some(&student), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, latest) = send(&app, Method::GET, &latest_uri, Some(&student), None).await;
    assert_eq!(latest["id"], second["id"]);
    assert_eq!(latest["state"], "in_progress");

    let (_, count) = send(&app, Method::GET, &count_uri, Some(&student), None).await;
    assert_eq!(count["count"], 2);

    let other = token(15, Role::Student);
    let (_, count) = send(&app, Method::GET, &count_uri, Some(&other), None).await;
    assert_eq!(count["count"], 0);
}

#[tokio::test]
async fn correctness_can_be_hidden_until_finish() {
    let store = Arc::new(MemoryStore::new());
    let seed = seed_capitals(&store);
    let mut config = test_config();
    config.reveal_answer_correctness = false;
    let app = build_app(store, config);
    let student = token(16, Role::Student);

    let (_, started) = send(
        &app,
        Method::POST,
        &format!("/api/tests/{}/attempts", seed.test_id),
        Some(&student),
        None,
    )
    .await;
    let attempt_id = started["id"].as_str().expect("id").to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/attempts/{}/answers", attempt_id),
        Some(&student),
        Some(json!({
            "question_id": seed.single,
            "answer": { "kind": "options", "option_ids": [seed.single_correct] }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["saved"], true);
    assert!(body.get("is_correct").is_none());
    assert!(body.get("verdict").is_none());

    let (_, detail) = send(
        &app,
        Method::GET,
        &format!("/api/attempts/{}", attempt_id),
        Some(&student),
        None,
    )
    .await;
    assert!(detail["answers"][0].get("verdict").is_none());

    send(
        &app,
        Method::PATCH,
        &format!("/api/attempts/{}/finish", attempt_id),
        Some(&student),
        None,
    )
    .await;
    let (_, detail) = send(
        &app,
        Method::GET,
        &format!("/api/attempts/{}", attempt_id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(detail["answers"][0]["verdict"], "correct");
}

#[tokio::test]
async fn students_do_not_see_correct_answers() {
    let store = Arc::new(MemoryStore::new());
    let seed = seed_capitals(&store);
    let app = build_app(store, test_config());
    let uri = format!("/api/tests/{}/questions", seed.test_id);

    let (status, questions) = send(&app, Method::GET, &uri, Some(&token(17, Role::Student)), None).await;
    assert_eq!(status, StatusCode::OK);
    let questions = questions.as_array().expect("questions");
    assert_eq!(questions.len(), 3);
    assert!(questions[0]["options"][0].get("is_correct").is_none());
    assert!(questions[2].get("correct_answer_text").is_none());

    let (_, questions) = send(&app, Method::GET, &uri, Some(&token(2, Role::Teacher)), None).await;
    assert_eq!(questions[0]["options"][0]["is_correct"], true);
    assert_eq!(questions[2]["correct_answer_text"], "Paris");
}

#[tokio::test]
async fn invalid_submissions_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let seed = seed_capitals(&store);
    let app = build_app(store.clone(), test_config());
    let student = token(18, Role::Student);

    let (_, started) = send(
        &app,
        Method::POST,
        &format!("/api/tests/{}/attempts", seed.test_id),
        Some(&student),
        None,
    )
    .await;
    let attempt_id: Uuid = started["id"].as_str().expect("id").parse().expect("uuid");
    let uri = format!("/api/attempts/{}/answers", attempt_id);

    let cases = [
        (
            json!({ "question_id": seed.single, "answer": { "kind": "options", "option_ids": [] } }),
            StatusCode::BAD_REQUEST,
        ),
        (
            json!({ "question_id": seed.open, "answer": { "kind": "options", "option_ids": [seed.multi_a] } }),
            StatusCode::BAD_REQUEST,
        ),
        (
            json!({ "question_id": seed.single, "answer": { "kind": "options", "option_ids": [seed.single_correct, seed.single_wrong] } }),
            StatusCode::BAD_REQUEST,
        ),
        (
            json!({ "question_id": seed.single, "answer": { "kind": "options", "option_ids": [seed.multi_c] } }),
            StatusCode::BAD_REQUEST,
        ),
        (
            json!({ "question_id": 9999, "answer": { "kind": "text", "text": "x" } }),
            StatusCode::NOT_FOUND,
        ),
    ];
    for (body, expected) in cases {
        let (status, _) = send(&app, Method::POST, &uri, Some(&student), Some(body)).await;
        assert_eq!(status, expected);
    }

    let malformed = [
        json!({ "question_id": seed.open, "answer": { "kind": "number", "value": 3 } }),
        json!({ "question_id": "first", "answer": { "kind": "text", "text": "Paris" } }),
        json!({ "answer": { "kind": "text", "text": "Paris" } }),
    ];
    for body in malformed {
        let (status, body) = send(&app, Method::POST, &uri, Some(&student), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert!(body["message"].is_string());
    }

    let (status, body) = send_raw(
        &app,
        Method::POST,
        &uri,
        Some(&student),
        Some("{\"question_id\": 1, \"answer\":".to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert_eq!(store.answer_count(attempt_id).expect("count"), 0);
}

#[tokio::test]
async fn attempts_belong_to_their_student() {
    let store = Arc::new(MemoryStore::new());
    let seed = seed_capitals(&store);
    let app = build_app(store, test_config());
    let owner = token(19, Role::Student);
    let intruder = token(20, Role::Student);

    let (_, started) = send(
        &app,
        Method::POST,
        &format!("/api/tests/{}/attempts", seed.test_id),
        Some(&owner),
        None,
    )
    .await;
    let attempt_id = started["id"].as_str().expect("id").to_string();

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/attempts/{}/finish", attempt_id),
        Some(&intruder),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/attempts/{}", attempt_id),
        Some(&intruder),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/attempts/{}", attempt_id),
        Some(&token(3, Role::Teacher)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_test_and_attempt_are_not_found() {
    let store = Arc::new(MemoryStore::new());
    let app = build_app(store, test_config());
    let student = token(21, Role::Student);

    let (status, body) = send(&app, Method::POST, "/api/tests/424242/attempts", Some(&student), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "test_not_found");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/attempts/{}/finish", Uuid::new_v4()),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "attempt_not_found");
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let store = Arc::new(MemoryStore::new());
    let seed = seed_capitals(&store);
    let app = build_app(store, test_config());

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/tests/{}/attempts", seed.test_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/tests/{}/questions", seed.test_id),
        Some("not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
