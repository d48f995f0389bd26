pub mod consensus;
pub mod manual;
pub mod tba;

pub use consensus::ConsensusStrategy;
pub use manual::ManualStrategy;
pub use tba::{TbaFieldKind, TbaFieldMapping, TbaStrategy};

use serde_json::Value;
use std::sync::Arc;

use super::comparison::{compare_observation, ComparisonSettings};
use super::models::{ValidationContext, ValidationResult, ValidationStrategyType};
use super::{StrategyRegistry, ValidationConsensusRepository};
use crate::matches::MatchRepository;
use crate::scouting::{ScoutingObservation, ScoutingRepository};

/// Registry with the consensus, official and manual strategies
pub fn default_registry(
    matches: Arc<dyn MatchRepository>,
    scouting: Arc<dyn ScoutingRepository>,
    truths: Arc<dyn ValidationConsensusRepository>,
    comparison: ComparisonSettings,
) -> StrategyRegistry {
    StrategyRegistry::new()
        .with_strategy(Arc::new(ConsensusStrategy::new(
            scouting.clone(),
            truths.clone(),
            comparison,
        )))
        .with_strategy(Arc::new(TbaStrategy::new(
            matches,
            scouting.clone(),
            comparison,
        )))
        .with_strategy(Arc::new(ManualStrategy::new(scouting, truths, comparison)))
}

/// Keeps each scouter's most recent submission, in order of first submission
pub(crate) fn latest_per_scouter(observations: Vec<ScoutingObservation>) -> Vec<ScoutingObservation> {
    let mut latest: Vec<ScoutingObservation> = Vec::with_capacity(observations.len());
    for observation in observations {
        match latest
            .iter_mut()
            .find(|existing| existing.scouter_id == observation.scouter_id)
        {
            Some(existing) if existing.submitted_at <= observation.submitted_at => {
                *existing = observation
            }
            Some(_) => {}
            None => latest.push(observation),
        }
    }
    latest
}

/// Judges every observation against one truth payload
pub(crate) fn judge_observations(
    context: &ValidationContext,
    observations: &[ScoutingObservation],
    truth: &Value,
    validation_type: ValidationStrategyType,
    settings: &ComparisonSettings,
) -> Vec<ValidationResult> {
    observations
        .iter()
        .filter_map(|observation| {
            compare_observation(&observation.performance, truth, settings).map(|comparison| {
                ValidationResult::from_comparison(
                    context,
                    &observation.scouter_id,
                    validation_type,
                    &comparison,
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationOutcome;
    use chrono::Duration;
    use serde_json::json;
    use uuid::Uuid;

    fn context() -> ValidationContext {
        ValidationContext {
            event_key: "2025wimi".to_string(),
            match_key: "2025wimi_qm1".to_string(),
            team_number: 254,
            season_year: 2025,
            execution_id: Uuid::new_v4(),
            min_scouts_required: 1,
        }
    }

    fn observation(scouter: &str, performance: Value) -> ScoutingObservation {
        ScoutingObservation::new(scouter, "2025wimi", "2025wimi_qm1", 254, 2025, performance)
    }

    #[test]
    fn keeps_latest_submission_per_scouter() {
        let first = observation("a", json!({ "n": 1 }));
        let mut second = observation("a", json!({ "n": 2 }));
        second.submitted_at = first.submitted_at + Duration::seconds(5);
        let other = observation("b", json!({ "n": 3 }));

        let latest = latest_per_scouter(vec![first, other, second]);

        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].scouter_id, "a");
        assert_eq!(latest[0].performance, json!({ "n": 2 }));
        assert_eq!(latest[1].scouter_id, "b");
    }

    #[test]
    fn judges_each_comparable_observation() {
        let ctx = context();
        let truth = json!({ "auto": { "coral": 4 } });
        let observations = vec![
            observation("a", json!({ "auto": { "coral": 4 } })),
            observation("b", json!({ "auto": { "coral": 9 } })),
            observation("c", json!({ "teleop": { "net": 1 } })),
        ];

        let results = judge_observations(
            &ctx,
            &observations,
            &truth,
            ValidationStrategyType::Manual,
            &ComparisonSettings::default(),
        );

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].outcome, ValidationOutcome::ExactMatch);
        assert_eq!(results[1].outcome, ValidationOutcome::Mismatch);
        assert!(results.iter().all(|r| r.execution_id == ctx.execution_id));
    }
}
