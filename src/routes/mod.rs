pub mod admin;
pub mod attempts;
pub mod health;
pub mod test_routes;

use std::time::Duration;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::middleware::auth::{require_admin, require_auth};
use crate::middleware::cors::api_cors;
use crate::AppState;

pub fn router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    let admin_api = Router::new()
        .route(
            "/difficulty/recalculate",
            post(admin::recalculate_difficulty),
        )
        .route(
            "/difficulty/recalculate-ml",
            post(admin::recalculate_difficulty_ml),
        )
        .layer(from_fn(require_admin));

    let api = Router::new()
        .route("/tests/:test_id/questions", get(test_routes::list_questions))
        .route("/tests/:test_id/attempts", post(test_routes::start_attempt))
        .route("/tests/:test_id/attempts/count", get(test_routes::attempt_count))
        .route("/tests/:test_id/attempts/latest", get(test_routes::latest_attempt))
        .route("/tests/:test_id/ungraded", get(test_routes::list_ungraded))
        .route("/attempts/:attempt_id", get(attempts::get_attempt))
        .route("/attempts/:attempt_id/answers", post(attempts::submit_answer))
        .route("/attempts/:attempt_id/finish", patch(attempts::finish_attempt))
        .route(
            "/attempts/:attempt_id/answers/:question_id/grade",
            post(attempts::grade_answer),
        )
        .nest("/admin", admin_api)
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
        .layer(TimeoutLayer::new(timeout))
        .layer(api_cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
