use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::attempt_dto::{
    AnswerView, AttemptDetailResponse, FinishAttemptResponse, GradeAnswerRequest,
    GradeAnswerResponse, SubmitAnswerRequest, SubmitAnswerResponse,
};
use crate::error::{Error, Result};
use crate::extract::ApiJson;
use crate::middleware::auth::{Claims, Role};
use crate::models::test_attempt::TestAttempt;
use crate::AppState;

fn ensure_owner(claims: &Claims, attempt: &TestAttempt) -> Result<()> {
    if attempt.student_id == claims.user_id {
        Ok(())
    } else {
        Err(Error::Forbidden("attempt belongs to another student".to_string()))
    }
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Json<AttemptDetailResponse>> {
    let detail = state.attempt_service.attempt_detail(attempt_id).await?;
    if !claims.is_staff() {
        ensure_owner(&claims, &detail.attempt)?;
    }

    let reveal = claims.is_staff()
        || detail.attempt.is_finished()
        || state.attempt_service.settings().reveal_correctness;
    let answers = detail
        .answers
        .iter()
        .map(|a| AnswerView::new(a, reveal))
        .collect();
    Ok(Json(AttemptDetailResponse {
        attempt: detail.attempt.into(),
        answers,
    }))
}

#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
    ApiJson(payload): ApiJson<SubmitAnswerRequest>,
) -> Result<Json<SubmitAnswerResponse>> {
    payload.validate()?;
    let attempt = state.attempt_service.get_attempt(attempt_id).await?;
    ensure_owner(&claims, &attempt)?;

    let submitted = state
        .attempt_service
        .submit_answer(attempt_id, payload.question_id, payload.answer)
        .await?;
    Ok(Json(SubmitAnswerResponse {
        saved: true,
        attempt_id,
        question_id: submitted.answer.question_id,
        is_correct: submitted.verdict.map(|v| v.is_correct()),
        verdict: submitted.verdict,
        submitted_at: submitted.answer.submitted_at,
    }))
}

#[axum::debug_handler]
pub async fn finish_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Json<FinishAttemptResponse>> {
    let attempt = state.attempt_service.get_attempt(attempt_id).await?;
    ensure_owner(&claims, &attempt)?;

    let finished = state.attempt_service.finish_attempt(attempt_id).await?;
    Ok(Json(FinishAttemptResponse {
        attempt: finished.attempt.into(),
        results: finished.results,
    }))
}

#[axum::debug_handler]
pub async fn grade_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((attempt_id, question_id)): Path<(Uuid, i64)>,
    ApiJson(payload): ApiJson<GradeAnswerRequest>,
) -> Result<Json<GradeAnswerResponse>> {
    claims.require_any(&[Role::Teacher, Role::Admin])?;
    payload.validate()?;

    let (attempt, answer) = state
        .attempt_service
        .grade_answer(attempt_id, question_id, payload.is_correct)
        .await?;
    tracing::info!(grader_id = claims.user_id, %attempt_id, question_id, "Manual grade stored");
    Ok(Json(GradeAnswerResponse {
        attempt: attempt.into(),
        answer: AnswerView::new(&answer, true),
    }))
}
