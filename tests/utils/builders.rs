#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::Value;

use scouter_validation::{
    matches::{season_from_event_key, MatchModel},
    scouting::ScoutingObservation,
};

// ============================================================================
// Event Setup Utilities
// ============================================================================

/// Builds the matches and scouting observations of one event
pub struct EventBuilder {
    event_key: String,
    matches: Vec<MatchModel>,
    observations: Vec<ScoutingObservation>,
}

impl EventBuilder {
    pub fn new(event_key: &str) -> Self {
        Self {
            event_key: event_key.to_string(),
            matches: vec![],
            observations: vec![],
        }
    }

    pub fn event_key(&self) -> &str {
        &self.event_key
    }

    pub fn match_key(&self, match_number: i32) -> String {
        format!("{}_qm{}", self.event_key, match_number)
    }

    pub fn with_match(mut self, model: MatchModel) -> Self {
        self.matches.push(model);
        self
    }

    /// Adds a completed qualification match
    pub fn with_played_match(self, match_number: i32, red: [i32; 3], blue: [i32; 3]) -> Self {
        let model = MatchModel::qualification(&self.event_key, match_number, red, blue)
            .with_scores(100, 80);
        self.with_match(model)
    }

    /// Each scouter submits `performance` for the team in the match
    pub fn with_scouts(
        mut self,
        match_number: i32,
        team_number: i32,
        scouters: &[&str],
        performance: Value,
    ) -> Self {
        let match_key = self.match_key(match_number);
        let season_year = season_from_event_key(&self.event_key).unwrap_or(2025);

        self.observations
            .extend(scouters.iter().map(|scouter| {
                ScoutingObservation::new(
                    scouter,
                    &self.event_key,
                    &match_key,
                    team_number,
                    season_year,
                    performance.clone(),
                )
            }));
        self
    }

    /// The same scouters submit `performance` for every team of every match
    pub fn with_scouts_everywhere(self, scouters: &[&str], performance: Value) -> Self {
        let targets: Vec<(i32, i32)> = self
            .matches
            .iter()
            .flat_map(|m| m.teams().into_iter().map(move |team| (m.match_number, team)))
            .collect();

        targets.into_iter().fold(self, |builder, (match_number, team)| {
            builder.with_scouts(match_number, team, scouters, performance.clone())
        })
    }

    pub fn build(self) -> (Vec<MatchModel>, Vec<ScoutingObservation>) {
        (self.matches, self.observations)
    }
}
