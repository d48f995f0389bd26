use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMetrics {
    pub team_number: i32,
    pub opr: f64,
    pub dpr: f64,
    /// OPR minus DPR
    pub ccwm: f64,
    pub matches_played: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldStatistics {
    pub opr: Distribution,
    pub dpr: Distribution,
    pub ccwm: Distribution,
}

/// Team numbers per alliance-selection tier, best first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllianceRecommendations {
    pub first_pick: Vec<i32>,
    pub second_pick: Vec<i32>,
    pub defensive_pick: Vec<i32>,
    pub balanced_pick: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OprMetrics {
    pub event_key: String,
    /// Sorted by OPR, highest first
    pub teams: Vec<TeamMetrics>,
    pub completed_matches: usize,
    pub team_count: usize,
    pub field: FieldStatistics,
    pub recommendations: AllianceRecommendations,
    pub warnings: Vec<String>,
    pub calculated_at: DateTime<Utc>,
}

impl OprMetrics {
    pub fn team(&self, team_number: i32) -> Option<&TeamMetrics> {
        self.teams.iter().find(|t| t.team_number == team_number)
    }
}
