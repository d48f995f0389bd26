use serde_json::{json, Value};
use thiserror::Error;

use crate::shared::RepositoryError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatisticsError {
    #[error("No completed matches for event {event_key}")]
    NoCompletedMatches { event_key: String },

    /// Fewer alliance equations than teams to solve for
    #[error("Insufficient data for regression: {equations} equations for {unknowns} teams")]
    InsufficientData { equations: usize, unknowns: usize },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl StatisticsError {
    pub fn code(&self) -> &'static str {
        match self {
            StatisticsError::NoCompletedMatches { .. } => "NO_COMPLETED_MATCHES",
            StatisticsError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            StatisticsError::Repository(_) => "REPOSITORY_ERROR",
        }
    }

    pub fn context(&self) -> Value {
        match self {
            StatisticsError::NoCompletedMatches { event_key } => json!({ "event_key": event_key }),
            StatisticsError::InsufficientData {
                equations,
                unknowns,
            } => json!({ "equations": equations, "unknowns": unknowns }),
            StatisticsError::Repository(err) => json!({ "cause": err.to_string() }),
        }
    }

    /// The event does not (yet) have enough played matches; not a failure
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            StatisticsError::NoCompletedMatches { .. } | StatisticsError::InsufficientData { .. }
        )
    }
}
