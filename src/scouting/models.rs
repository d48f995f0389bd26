use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One scout's submitted record of one team in one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoutingObservation {
    pub id: Uuid,
    pub scouter_id: String,
    pub event_key: String,
    pub match_key: String,
    pub team_number: i32,
    pub season_year: i32,
    /// Season-specific JSON payload (auto/teleop/endgame sections, notes)
    pub performance: Value,
    pub submitted_at: DateTime<Utc>,
}

impl ScoutingObservation {
    pub fn new(
        scouter_id: &str,
        event_key: &str,
        match_key: &str,
        team_number: i32,
        season_year: i32,
        performance: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            scouter_id: scouter_id.to_string(),
            event_key: event_key.to_string(),
            match_key: match_key.to_string(),
            team_number,
            season_year,
            performance,
            submitted_at: Utc::now(),
        }
    }
}
