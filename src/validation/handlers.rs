use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use super::{ValidationExecutionSummary, ValidationResult, ValidationStrategyType, ValidationTruth};
use crate::elo::{EloHistoryEntry, LeaderboardEntry, ScouterRating};
use crate::shared::{AppError, AppState};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ValidateRequest {
    /// Restricts the run to these strategies; all registered when absent
    #[serde(default)]
    pub strategies: Option<Vec<ValidationStrategyType>>,
}

#[derive(Debug, Deserialize)]
pub struct SeasonQuery {
    pub season: i32,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub season: i32,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ValidationsQuery {
    pub season: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ManualTruthRequest {
    pub payload: Value,
    pub created_by: Option<String>,
}

/// A request without a JSON body runs every strategy; a body that does not
/// parse is rejected rather than widened to all strategies
fn validate_request(
    request: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<ValidateRequest, AppError> {
    match request {
        Ok(Json(request)) => Ok(request),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(ValidateRequest::default()),
        Err(rejection) => Err(AppError::BadRequest(rejection.body_text())),
    }
}

/// POST /events/:event_key/validate
#[instrument(name = "validate_event", skip(state, request))]
pub async fn validate_event(
    State(state): State<AppState>,
    Path(event_key): Path<String>,
    request: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidationExecutionSummary>, AppError> {
    let request = validate_request(request)?;
    info!(event_key = %event_key, strategies = ?request.strategies, "Validating event");

    let summary = state
        .validation_service
        .validate_event(&event_key, request.strategies.as_deref())
        .await?;

    info!(
        execution_id = %summary.execution_id,
        total_validations = summary.total_validations,
        "Event validated"
    );
    Ok(Json(summary))
}

/// POST /matches/:match_key/validate
#[instrument(name = "validate_match", skip(state, request))]
pub async fn validate_match(
    State(state): State<AppState>,
    Path(match_key): Path<String>,
    request: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidationExecutionSummary>, AppError> {
    let request = validate_request(request)?;
    info!(match_key = %match_key, strategies = ?request.strategies, "Validating match");

    let summary = state
        .validation_service
        .validate_match(&match_key, request.strategies.as_deref())
        .await?;
    Ok(Json(summary))
}

/// GET /matches/:match_key/validations
#[instrument(name = "get_match_validations", skip(state))]
pub async fn get_match_validations(
    State(state): State<AppState>,
    Path(match_key): Path<String>,
) -> Result<Json<Vec<ValidationResult>>, AppError> {
    let results = state
        .validation_service
        .get_match_validations(&match_key)
        .await?;
    Ok(Json(results))
}

/// GET /matches/:match_key/truths
#[instrument(name = "get_match_truths", skip(state))]
pub async fn get_match_truths(
    State(state): State<AppState>,
    Path(match_key): Path<String>,
) -> Result<Json<Vec<ValidationTruth>>, AppError> {
    let truths = state.validation_service.get_match_truths(&match_key).await?;
    Ok(Json(truths))
}

/// POST /matches/:match_key/teams/:team/manual-truth
#[instrument(name = "record_manual_truth", skip(state, request))]
pub async fn record_manual_truth(
    State(state): State<AppState>,
    Path((match_key, team_number)): Path<(String, i32)>,
    Json(request): Json<ManualTruthRequest>,
) -> Result<(StatusCode, Json<ValidationTruth>), AppError> {
    if !request.payload.is_object() {
        return Err(AppError::BadRequest(
            "payload must be a JSON object".to_string(),
        ));
    }

    let truth = state
        .validation_service
        .record_manual_truth(&match_key, team_number, request.payload, request.created_by)
        .await?;

    info!(match_key = %match_key, team_number, "Manual truth stored");
    Ok((StatusCode::CREATED, Json(truth)))
}

/// GET /scouters/:scouter_id/rating?season=
#[instrument(name = "get_scouter_rating", skip(state))]
pub async fn get_scouter_rating(
    State(state): State<AppState>,
    Path(scouter_id): Path<String>,
    Query(query): Query<SeasonQuery>,
) -> Result<Json<ScouterRating>, AppError> {
    let rating = state
        .validation_service
        .get_scouter_rating(&scouter_id, query.season)
        .await?;
    Ok(Json(rating))
}

/// GET /scouters/:scouter_id/history?season=&limit=
#[instrument(name = "get_scouter_history", skip(state))]
pub async fn get_scouter_history(
    State(state): State<AppState>,
    Path(scouter_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<EloHistoryEntry>>, AppError> {
    let history = state
        .validation_service
        .get_scouter_rating_history(&scouter_id, query.season, query.limit)
        .await?;
    Ok(Json(history))
}

/// GET /scouters/:scouter_id/validations?season=
#[instrument(name = "get_scouter_validations", skip(state))]
pub async fn get_scouter_validations(
    State(state): State<AppState>,
    Path(scouter_id): Path<String>,
    Query(query): Query<ValidationsQuery>,
) -> Result<Json<Vec<ValidationResult>>, AppError> {
    let results = state
        .validation_service
        .get_scouter_validations(&scouter_id, query.season)
        .await?;
    Ok(Json(results))
}

/// GET /events/:event_key/leaderboard?limit=
#[instrument(name = "get_event_leaderboard", skip(state))]
pub async fn get_event_leaderboard(
    State(state): State<AppState>,
    Path(event_key): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let entries = state
        .validation_service
        .get_event_leaderboard(&event_key, query.limit)
        .await?;
    Ok(Json(entries))
}

/// GET /seasons/:year/leaderboard?limit=
#[instrument(name = "get_season_leaderboard", skip(state))]
pub async fn get_season_leaderboard(
    State(state): State<AppState>,
    Path(season_year): Path<i32>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let entries = state
        .validation_service
        .get_season_leaderboard(season_year, query.limit)
        .await?;
    Ok(Json(entries))
}
