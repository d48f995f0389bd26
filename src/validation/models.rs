use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use super::comparison::ObservationComparison;
use crate::elo::EloUpdateSummary;

/// Declaration order is execution order within a (match, team) pair
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValidationStrategyType {
    Consensus,
    Tba,
    Manual,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValidationOutcome {
    ExactMatch,
    CloseMatch,
    Mismatch,
}

impl ValidationOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, ValidationOutcome::Mismatch)
    }
}

/// Everything a strategy needs to judge one team in one match
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationContext {
    pub event_key: String,
    pub match_key: String,
    pub team_number: i32,
    pub season_year: i32,
    pub execution_id: Uuid,
    pub min_scouts_required: usize,
}

/// Append-only verdict on one scouter's observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub scouter_id: String,
    pub event_key: String,
    pub match_key: String,
    pub team_number: i32,
    pub season_year: i32,
    pub validation_type: ValidationStrategyType,
    pub outcome: ValidationOutcome,
    pub accuracy_score: f64,
    /// Per-field comparison breakdown
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl ValidationResult {
    pub fn from_comparison(
        context: &ValidationContext,
        scouter_id: &str,
        validation_type: ValidationStrategyType,
        comparison: &ObservationComparison,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            execution_id: context.execution_id,
            scouter_id: scouter_id.to_string(),
            event_key: context.event_key.clone(),
            match_key: context.match_key.clone(),
            team_number: context.team_number,
            season_year: context.season_year,
            validation_type,
            outcome: comparison.outcome,
            accuracy_score: comparison.accuracy_score,
            details: comparison.details(),
            created_at: Utc::now(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TruthSource {
    Consensus,
    Manual,
}

/// Reference payload a scout's observation is compared against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationTruth {
    pub id: Uuid,
    pub event_key: String,
    pub match_key: String,
    pub team_number: i32,
    pub season_year: i32,
    pub source: TruthSource,
    pub payload: Value,
    /// Observations consolidated into the payload (0 for manual entries)
    pub scout_count: i32,
    pub execution_id: Option<Uuid>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A unit of work that failed without aborting the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub match_key: Option<String>,
    pub team_number: Option<i32>,
    pub scouter_id: Option<String>,
    pub message: String,
}

/// Phases of a validation run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunPhase {
    Pending,
    Running,
    Persisting,
    UpdatingElo,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationExecutionSummary {
    pub execution_id: Uuid,
    pub event_key: String,
    /// Set when the run covered a single match
    pub match_key: Option<String>,
    pub strategies: Vec<ValidationStrategyType>,
    pub total_matches: usize,
    pub matches_processed: usize,
    pub teams_validated: usize,
    pub total_validations: usize,
    pub validations_by_type: BTreeMap<ValidationStrategyType, usize>,
    pub scouters_affected: usize,
    pub elo_updates: Vec<EloUpdateSummary>,
    pub errors: Vec<ValidationFailure>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn strategy_types_iterate_in_execution_order() {
        let order: Vec<_> = ValidationStrategyType::iter().collect();
        assert_eq!(
            order,
            vec![
                ValidationStrategyType::Consensus,
                ValidationStrategyType::Tba,
                ValidationStrategyType::Manual
            ]
        );
        assert!(ValidationStrategyType::Consensus < ValidationStrategyType::Manual);
    }

    #[test]
    fn outcomes_use_snake_case_names() {
        assert_eq!(ValidationOutcome::ExactMatch.to_string(), "exact_match");
        assert_eq!(
            ValidationOutcome::from_str("close_match").unwrap(),
            ValidationOutcome::CloseMatch
        );
        assert_eq!(
            serde_json::to_string(&ValidationOutcome::Mismatch).unwrap(),
            "\"mismatch\""
        );
    }

    #[test]
    fn only_mismatch_counts_as_failure() {
        assert!(ValidationOutcome::ExactMatch.is_success());
        assert!(ValidationOutcome::CloseMatch.is_success());
        assert!(!ValidationOutcome::Mismatch.is_success());
    }
}
