use axum::{extract::State, Extension, Json};

use crate::dto::difficulty_dto::{PredictiveRecalcResponse, StatisticalRecalcResponse};
use crate::error::Result;
use crate::middleware::auth::Claims;
use crate::AppState;

#[axum::debug_handler]
pub async fn recalculate_difficulty(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<StatisticalRecalcResponse>> {
    tracing::info!(admin_id = claims.user_id, "Statistical difficulty recalculation requested");
    let updated = state.difficulty_service.recalc_statistical().await?;
    Ok(Json(StatisticalRecalcResponse {
        strategy: "statistical".to_string(),
        updated,
    }))
}

#[axum::debug_handler]
pub async fn recalculate_difficulty_ml(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<PredictiveRecalcResponse>> {
    tracing::info!(admin_id = claims.user_id, "Predictive difficulty recalculation requested");
    let summary = state.difficulty_service.recalc_predictive().await?;
    Ok(Json(PredictiveRecalcResponse {
        strategy: "predictive".to_string(),
        summary,
    }))
}
