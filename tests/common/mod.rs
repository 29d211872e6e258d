#![allow(dead_code)]

use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::Value as JsonValue;
use tower::ServiceExt;

use learning_backend::config::Config;
use learning_backend::database::memory::MemoryStore;
use learning_backend::error::Result;
use learning_backend::middleware::auth::{Claims, Role};
use learning_backend::models::difficulty::Difficulty;
use learning_backend::routes;
use learning_backend::services::classifier_service::DifficultyClassifier;
use learning_backend::AppState;

pub const JWT_SECRET: &str = "test_secret_key";

pub fn test_config() -> Config {
    dotenvy::dotenv().ok();
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("DATABASE_URL", "postgres://localhost/learning_test");
    env::set_var("JWT_SECRET", JWT_SECRET);
    Config::from_env().expect("config")
}

/// Classifier that labels everything `medium`.
pub struct FixedClassifier;

#[async_trait]
impl DifficultyClassifier for FixedClassifier {
    async fn classify(&self, _question_text: &str) -> Result<Difficulty> {
        Ok(Difficulty::Medium)
    }
}

pub fn build_state(store: Arc<MemoryStore>, config: Config) -> AppState {
    AppState::new(config, store, Arc::new(FixedClassifier))
}

pub fn build_app(store: Arc<MemoryStore>, config: Config) -> Router {
    routes::router(build_state(store, config))
}

pub fn token(user_id: i64, role: Role) -> String {
    let claims = Claims {
        user_id,
        email: format!("user{}@example.com", user_id),
        role,
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("token")
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    send_raw(app, method, uri, token, body.map(|b| b.to_string())).await
}

/// Like `send`, but the body goes out exactly as given.
pub async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<String>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, json)
}

/// Ids of a capital-cities test with one single-choice, one multiple-choice
/// and one open question.
pub struct CapitalsTest {
    pub test_id: i64,
    pub single: i64,
    pub multiple: i64,
    pub open: i64,
    pub single_correct: i64,
    pub single_wrong: i64,
    pub multi_a: i64,
    pub multi_b: i64,
    pub multi_c: i64,
}

pub fn seed_capitals(store: &MemoryStore) -> CapitalsTest {
    let test = store.add_test("Capitals", 1).expect("test");

    let single = store
        .add_closed_question(test.id, "Capital of Italy?", false)
        .expect("q1");
    let single_correct = store.add_option(single.id, "Rome", true).expect("opt").id;
    let single_wrong = store.add_option(single.id, "Milan", false).expect("opt").id;

    let multiple = store
        .add_closed_question(test.id, "Which are capitals?", true)
        .expect("q2");
    let multi_a = store.add_option(multiple.id, "Berlin", true).expect("opt").id;
    let multi_b = store.add_option(multiple.id, "Madrid", true).expect("opt").id;
    let multi_c = store.add_option(multiple.id, "Munich", false).expect("opt").id;

    let open = store
        .add_open_question(test.id, "Capital of France?", Some("Paris"))
        .expect("q3");

    CapitalsTest {
        test_id: test.id,
        single: single.id,
        multiple: multiple.id,
        open: open.id,
        single_correct,
        single_wrong,
        multi_a,
        multi_b,
        multi_c,
    }
}
