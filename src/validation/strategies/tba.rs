use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{judge_observations, latest_per_scouter};
use crate::matches::MatchRepository;
use crate::scouting::ScoutingRepository;
use crate::validation::{
    ComparisonSettings, ValidationContext, ValidationError, ValidationResult, ValidationStrategy,
    ValidationStrategyType,
};

/// How an official per-robot breakdown value maps onto an observation value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TbaFieldKind {
    /// Boolean observation; true when the official value is one of `truthy`
    Flag { truthy: Vec<String> },
    /// String observation translated through `(official, observed)` pairs
    Category { values: Vec<(String, String)> },
}

/// One per-robot breakdown field, e.g. `autoLineRobot` + station number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TbaFieldMapping {
    pub breakdown_field: String,
    /// Dotted path inside the observation payload
    pub observation_path: String,
    pub kind: TbaFieldKind,
}

impl TbaFieldMapping {
    fn flag(breakdown_field: &str, observation_path: &str, truthy: &[&str]) -> Self {
        Self {
            breakdown_field: breakdown_field.to_string(),
            observation_path: observation_path.to_string(),
            kind: TbaFieldKind::Flag {
                truthy: truthy.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    fn category(breakdown_field: &str, observation_path: &str, values: &[(&str, &str)]) -> Self {
        Self {
            breakdown_field: breakdown_field.to_string(),
            observation_path: observation_path.to_string(),
            kind: TbaFieldKind::Category {
                values: values
                    .iter()
                    .map(|(official, observed)| (official.to_string(), observed.to_string()))
                    .collect(),
            },
        }
    }

    /// Translates the official value for the robot at `station`
    pub fn truth_value(&self, breakdown: &Value, station: usize) -> Option<Value> {
        let raw = breakdown.get(format!("{}{}", self.breakdown_field, station))?;
        let raw = raw.as_str()?;

        match &self.kind {
            TbaFieldKind::Flag { truthy } => Some(Value::Bool(
                truthy.iter().any(|t| t.eq_ignore_ascii_case(raw)),
            )),
            TbaFieldKind::Category { values } => values
                .iter()
                .find(|(official, _)| official.eq_ignore_ascii_case(raw))
                .map(|(_, observed)| Value::String(observed.clone())),
        }
    }
}

/// Field mappings for the seasons with known breakdown layouts
pub fn default_field_mappings() -> HashMap<i32, Vec<TbaFieldMapping>> {
    let mut mappings = HashMap::new();
    mappings.insert(
        2025,
        vec![
            TbaFieldMapping::flag("autoLineRobot", "auto.left_starting_zone", &["Yes"]),
            TbaFieldMapping::category(
                "endGameRobot",
                "endgame.position",
                &[
                    ("DeepCage", "deep"),
                    ("ShallowCage", "shallow"),
                    ("Parked", "park"),
                    ("None", "none"),
                ],
            ),
        ],
    );
    mappings.insert(
        2024,
        vec![
            TbaFieldMapping::flag("autoLineRobot", "auto.left_starting_zone", &["Yes"]),
            TbaFieldMapping::category(
                "endGameRobot",
                "endgame.position",
                &[("Onstage", "onstage"), ("Parked", "park"), ("None", "none")],
            ),
        ],
    );
    mappings
}

/// Judges scouts against the official per-robot score breakdown
pub struct TbaStrategy {
    matches: Arc<dyn MatchRepository>,
    scouting: Arc<dyn ScoutingRepository>,
    mappings: HashMap<i32, Vec<TbaFieldMapping>>,
    comparison: ComparisonSettings,
}

impl TbaStrategy {
    pub fn new(
        matches: Arc<dyn MatchRepository>,
        scouting: Arc<dyn ScoutingRepository>,
        comparison: ComparisonSettings,
    ) -> Self {
        Self::with_mappings(matches, scouting, default_field_mappings(), comparison)
    }

    pub fn with_mappings(
        matches: Arc<dyn MatchRepository>,
        scouting: Arc<dyn ScoutingRepository>,
        mappings: HashMap<i32, Vec<TbaFieldMapping>>,
        comparison: ComparisonSettings,
    ) -> Self {
        Self {
            matches,
            scouting,
            mappings,
            comparison,
        }
    }

    /// Official truth payload for the team, if the match has one
    async fn truth_for(&self, context: &ValidationContext) -> Result<Option<Value>, ValidationError> {
        let Some(mappings) = self.mappings.get(&context.season_year) else {
            return Ok(None);
        };

        let Some(model) = self.matches.find_by_match_key(&context.match_key).await? else {
            return Ok(None);
        };
        if !model.is_completed() {
            return Ok(None);
        }

        let Some((alliance, station)) = model.position_of(context.team_number) else {
            return Ok(None);
        };
        let Some(breakdown) = model.alliance_breakdown(alliance) else {
            return Ok(None);
        };

        let mut truth = Value::Object(Map::new());
        for mapping in mappings {
            if let Some(value) = mapping.truth_value(breakdown, station) {
                insert_path(&mut truth, &mapping.observation_path, value);
            }
        }

        let has_fields = truth.as_object().is_some_and(|o| !o.is_empty());
        Ok(has_fields.then_some(truth))
    }
}

#[async_trait]
impl ValidationStrategy for TbaStrategy {
    fn strategy_type(&self) -> ValidationStrategyType {
        ValidationStrategyType::Tba
    }

    #[instrument(skip(self, context), fields(match_key = %context.match_key, team = context.team_number))]
    async fn can_validate(&self, context: &ValidationContext) -> bool {
        match self.truth_for(context).await {
            Ok(Some(_)) => {}
            Ok(None) => return false,
            Err(err) => {
                warn!(?err, "Could not load official breakdown");
                return false;
            }
        }

        match self
            .scouting
            .find_by_match_and_team(&context.match_key, context.team_number)
            .await
        {
            Ok(observations) => !observations.is_empty(),
            Err(err) => {
                warn!(?err, "Could not load observations for official check");
                false
            }
        }
    }

    #[instrument(skip(self, context), fields(match_key = %context.match_key, team = context.team_number))]
    async fn validate(
        &self,
        context: &ValidationContext,
    ) -> Result<Vec<ValidationResult>, ValidationError> {
        let Some(truth) = self.truth_for(context).await? else {
            debug!("No official breakdown for team");
            return Ok(Vec::new());
        };

        let observations = latest_per_scouter(
            self.scouting
                .find_by_match_and_team(&context.match_key, context.team_number)
                .await?,
        );

        let results = judge_observations(
            context,
            &observations,
            &truth,
            ValidationStrategyType::Tba,
            &self.comparison,
        );
        debug!(results = results.len(), "Official validation complete");
        Ok(results)
    }
}

/// Sets `value` at a dotted path, creating intermediate objects
fn insert_path(target: &mut Value, path: &str, value: Value) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(object) = target else {
        return;
    };

    match path.split_once('.') {
        Some((head, rest)) => {
            let child = object
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            insert_path(child, rest, value);
        }
        None => {
            object.insert(path.to_string(), value);
        }
    }
}
