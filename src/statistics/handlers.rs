use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, instrument};

use super::OprMetrics;
use crate::shared::{AppError, AppState};

/// GET /events/:event_key/opr
#[instrument(name = "get_event_opr", skip(state))]
pub async fn get_event_opr(
    State(state): State<AppState>,
    Path(event_key): Path<String>,
) -> Result<Json<OprMetrics>, AppError> {
    let metrics = state.statistics_service.get_event_metrics(&event_key).await?;
    Ok(Json(metrics))
}

/// POST /events/:event_key/opr/recalculate
#[instrument(name = "recalculate_event_opr", skip(state))]
pub async fn recalculate_event_opr(
    State(state): State<AppState>,
    Path(event_key): Path<String>,
) -> Result<Json<OprMetrics>, AppError> {
    info!(event_key = %event_key, "Recalculating event metrics");
    let metrics = state.statistics_service.recalculate(&event_key).await?;
    Ok(Json(metrics))
}

/// DELETE /events/:event_key/opr
#[instrument(name = "clear_event_opr", skip(state))]
pub async fn clear_event_opr(
    State(state): State<AppState>,
    Path(event_key): Path<String>,
) -> StatusCode {
    let removed = state.statistics_service.clear_cache(&event_key).await;
    info!(event_key = %event_key, removed, "Cleared cached event metrics");
    StatusCode::NO_CONTENT
}
