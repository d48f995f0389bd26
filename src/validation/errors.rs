use serde_json::{json, Value};
use thiserror::Error;

use super::models::ValidationStrategyType;
use crate::shared::RepositoryError;

/// Public error taxonomy of the validation service. Every variant carries a
/// machine-readable code and a JSON context for callers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Validation of event {event_key} failed: {message}")]
    EventValidationFailed { event_key: String, message: String },

    #[error("Match not found: {match_key}")]
    MatchNotFound { match_key: String },

    #[error("Validation of match {match_key} failed: {message}")]
    MatchValidationFailed { match_key: String, message: String },

    #[error("Failed to load rating for scouter {scouter_id}: {message}")]
    GetRatingFailed { scouter_id: String, message: String },

    #[error("Failed to load rating history for scouter {scouter_id}: {message}")]
    GetHistoryFailed { scouter_id: String, message: String },

    #[error("Failed to load leaderboard for {scope}: {message}")]
    GetLeaderboardFailed { scope: String, message: String },

    #[error("Failed to load validations for {scope}: {message}")]
    GetValidationsFailed { scope: String, message: String },

    #[error("Event key {event_key} does not start with a season year")]
    InvalidEventKey { event_key: String },

    #[error("{strategy} strategy failed: {message}")]
    StrategyFailed {
        strategy: ValidationStrategyType,
        message: String,
    },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EventValidationFailed { .. } => "EVENT_VALIDATION_FAILED",
            ValidationError::MatchNotFound { .. } => "MATCH_NOT_FOUND",
            ValidationError::MatchValidationFailed { .. } => "MATCH_VALIDATION_FAILED",
            ValidationError::GetRatingFailed { .. } => "GET_RATING_FAILED",
            ValidationError::GetHistoryFailed { .. } => "GET_HISTORY_FAILED",
            ValidationError::GetLeaderboardFailed { .. } => "GET_LEADERBOARD_FAILED",
            ValidationError::GetValidationsFailed { .. } => "GET_VALIDATIONS_FAILED",
            ValidationError::InvalidEventKey { .. } => "INVALID_EVENT_KEY",
            ValidationError::StrategyFailed { .. } => "STRATEGY_FAILED",
            ValidationError::Repository(_) => "REPOSITORY_ERROR",
        }
    }

    pub fn context(&self) -> Value {
        match self {
            ValidationError::EventValidationFailed { event_key, message } => {
                json!({ "event_key": event_key, "cause": message })
            }
            ValidationError::MatchNotFound { match_key } => json!({ "match_key": match_key }),
            ValidationError::MatchValidationFailed { match_key, message } => {
                json!({ "match_key": match_key, "cause": message })
            }
            ValidationError::GetRatingFailed { scouter_id, message }
            | ValidationError::GetHistoryFailed { scouter_id, message } => {
                json!({ "scouter_id": scouter_id, "cause": message })
            }
            ValidationError::GetLeaderboardFailed { scope, message }
            | ValidationError::GetValidationsFailed { scope, message } => {
                json!({ "scope": scope, "cause": message })
            }
            ValidationError::InvalidEventKey { event_key } => json!({ "event_key": event_key }),
            ValidationError::StrategyFailed { strategy, message } => {
                json!({ "strategy": strategy, "cause": message })
            }
            ValidationError::Repository(err) => json!({ "cause": err.to_string() }),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ValidationError::MatchNotFound { .. }
                | ValidationError::Repository(RepositoryError::NotFound(_))
        )
    }
}
