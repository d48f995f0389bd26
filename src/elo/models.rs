use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{ValidationOutcome, ValidationStrategyType};

/// Current rating state for one scouter in one season
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScouterRating {
    pub scouter_id: String,
    pub season_year: i32,
    pub current_elo: i32,
    pub peak_elo: i32,
    pub lowest_elo: i32,
    pub total_validations: i32,
    /// Exact or close matches
    pub successful_validations: i32,
    pub failed_validations: i32,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScouterRating {
    /// Rating for a scouter that has never been validated
    pub fn initial(scouter_id: &str, season_year: i32, rating: i32) -> Self {
        Self {
            scouter_id: scouter_id.to_string(),
            season_year,
            current_elo: rating,
            peak_elo: rating,
            lowest_elo: rating,
            total_validations: 0,
            successful_validations: 0,
            failed_validations: 0,
            updated_at: None,
        }
    }

    pub fn apply(&mut self, params: &UpdateRatingParams) {
        self.current_elo = params.new_elo;
        self.peak_elo = self.peak_elo.max(params.new_elo);
        self.lowest_elo = self.lowest_elo.min(params.new_elo);
        self.total_validations += 1;
        if params.outcome.is_success() {
            self.successful_validations += 1;
        } else {
            self.failed_validations += 1;
        }
        self.updated_at = Some(Utc::now());
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_validations == 0 {
            return 0.0;
        }
        self.successful_validations as f64 / self.total_validations as f64
    }
}

/// A single conditional rating write. The store rejects it when the stored
/// rating no longer equals `previous_elo`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRatingParams {
    pub scouter_id: String,
    pub season_year: i32,
    pub previous_elo: i32,
    pub new_elo: i32,
    pub outcome: ValidationOutcome,
}

/// One applied validation in a scouter's rating trajectory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EloHistoryEntry {
    pub id: Uuid,
    pub scouter_id: String,
    pub season_year: i32,
    pub execution_id: Uuid,
    pub validation_id: Uuid,
    pub elo_before: i32,
    pub elo_after: i32,
    pub delta: i32,
    pub outcome: ValidationOutcome,
    pub accuracy_score: f64,
    pub validation_type: ValidationStrategyType,
    pub event_key: String,
    pub match_key: String,
    pub team_number: i32,
    pub created_at: DateTime<Utc>,
}

/// Per-scouter rollup of one validation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EloUpdateSummary {
    pub scouter_id: String,
    pub season_year: i32,
    pub starting_elo: i32,
    pub ending_elo: i32,
    pub total_delta: i32,
    pub validations_processed: usize,
    pub average_accuracy: f64,
}

impl EloUpdateSummary {
    pub fn from_history(
        scouter_id: &str,
        season_year: i32,
        starting_elo: i32,
        entries: &[EloHistoryEntry],
    ) -> Self {
        let ending_elo = entries.last().map(|e| e.elo_after).unwrap_or(starting_elo);
        let average_accuracy = if entries.is_empty() {
            0.0
        } else {
            entries.iter().map(|e| e.accuracy_score).sum::<f64>() / entries.len() as f64
        };

        Self {
            scouter_id: scouter_id.to_string(),
            season_year,
            starting_elo,
            ending_elo,
            total_delta: ending_elo - starting_elo,
            validations_processed: entries.len(),
            average_accuracy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub scouter_id: String,
    pub season_year: i32,
    pub current_elo: i32,
    pub validations: i64,
    pub average_accuracy: f64,
    /// Sum of deltas within the leaderboard scope
    pub elo_change: i64,
}
