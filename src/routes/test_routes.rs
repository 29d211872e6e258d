use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::dto::attempt_dto::{AttemptCountResponse, AttemptResponse, QuestionView};
use crate::error::Result;
use crate::middleware::auth::{Claims, Role};
use crate::models::answer::UngradedAnswer;
use crate::AppState;

/// Students see questions without correct answers.
#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<Json<Vec<QuestionView>>> {
    let reveal = claims.is_staff();
    let questions = state.attempt_service.test_questions(test_id).await?;
    Ok(Json(
        questions
            .into_iter()
            .map(|q| QuestionView::new(q, reveal))
            .collect(),
    ))
}

#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<(StatusCode, Json<AttemptResponse>)> {
    let attempt = state
        .attempt_service
        .start_attempt(claims.user_id, test_id)
        .await?;
    Ok((StatusCode::CREATED, Json(attempt.into())))
}

#[axum::debug_handler]
pub async fn attempt_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<Json<AttemptCountResponse>> {
    let count = state
        .attempt_service
        .attempt_count(claims.user_id, test_id)
        .await?;
    Ok(Json(AttemptCountResponse { test_id, count }))
}

#[axum::debug_handler]
pub async fn latest_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<Json<AttemptResponse>> {
    let attempt = state
        .attempt_service
        .latest_attempt(claims.user_id, test_id)
        .await?;
    Ok(Json(attempt.into()))
}

#[axum::debug_handler]
pub async fn list_ungraded(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<Json<Vec<UngradedAnswer>>> {
    claims.require_any(&[Role::Teacher, Role::Admin])?;
    let answers = state.attempt_service.ungraded_answers(test_id).await?;
    Ok(Json(answers))
}
