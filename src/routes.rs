use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::shared::AppState;
use crate::statistics::handlers as statistics;
use crate::validation::handlers as validation;

/// All HTTP routes, with request tracing
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Scouter validation service" }))
        .route("/events/:event_key/validate", post(validation::validate_event))
        .route(
            "/events/:event_key/leaderboard",
            get(validation::get_event_leaderboard),
        )
        .route(
            "/events/:event_key/opr",
            get(statistics::get_event_opr).delete(statistics::clear_event_opr),
        )
        .route(
            "/events/:event_key/opr/recalculate",
            post(statistics::recalculate_event_opr),
        )
        .route("/matches/:match_key/validate", post(validation::validate_match))
        .route(
            "/matches/:match_key/validations",
            get(validation::get_match_validations),
        )
        .route("/matches/:match_key/truths", get(validation::get_match_truths))
        .route(
            "/matches/:match_key/teams/:team/manual-truth",
            post(validation::record_manual_truth),
        )
        .route(
            "/scouters/:scouter_id/rating",
            get(validation::get_scouter_rating),
        )
        .route(
            "/scouters/:scouter_id/history",
            get(validation::get_scouter_history),
        )
        .route(
            "/scouters/:scouter_id/validations",
            get(validation::get_scouter_validations),
        )
        .route(
            "/seasons/:year/leaderboard",
            get(validation::get_season_leaderboard),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
