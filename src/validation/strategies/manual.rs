use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{judge_observations, latest_per_scouter};
use crate::scouting::ScoutingRepository;
use crate::validation::{
    ComparisonSettings, TruthSource, ValidationConsensusRepository, ValidationContext,
    ValidationError, ValidationResult, ValidationStrategy, ValidationStrategyType,
};

/// Judges scouts against a truth entered by hand for the team
pub struct ManualStrategy {
    scouting: Arc<dyn ScoutingRepository>,
    truths: Arc<dyn ValidationConsensusRepository>,
    comparison: ComparisonSettings,
}

impl ManualStrategy {
    pub fn new(
        scouting: Arc<dyn ScoutingRepository>,
        truths: Arc<dyn ValidationConsensusRepository>,
        comparison: ComparisonSettings,
    ) -> Self {
        Self {
            scouting,
            truths,
            comparison,
        }
    }
}

#[async_trait]
impl ValidationStrategy for ManualStrategy {
    fn strategy_type(&self) -> ValidationStrategyType {
        ValidationStrategyType::Manual
    }

    #[instrument(skip(self, context), fields(match_key = %context.match_key, team = context.team_number))]
    async fn can_validate(&self, context: &ValidationContext) -> bool {
        let truth = self
            .truths
            .find_truth(&context.match_key, context.team_number, TruthSource::Manual)
            .await;
        match truth {
            Ok(Some(_)) => {}
            Ok(None) => return false,
            Err(err) => {
                warn!(?err, "Could not load manual truth");
                return false;
            }
        }

        self.scouting
            .find_by_match_and_team(&context.match_key, context.team_number)
            .await
            .map(|observations| !observations.is_empty())
            .unwrap_or_else(|err| {
                warn!(?err, "Could not load observations for manual check");
                false
            })
    }

    #[instrument(skip(self, context), fields(match_key = %context.match_key, team = context.team_number))]
    async fn validate(
        &self,
        context: &ValidationContext,
    ) -> Result<Vec<ValidationResult>, ValidationError> {
        let Some(truth) = self
            .truths
            .find_truth(&context.match_key, context.team_number, TruthSource::Manual)
            .await?
        else {
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
            &truth.payload,
            ValidationStrategyType::Manual,
            &self.comparison,
        );
        debug!(
            results = results.len(),
            author = ?truth.created_by,
            "Manual validation complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scouting::{InMemoryScoutingRepository, ScoutingObservation};
    use crate::validation::{InMemoryValidationConsensusRepository, ValidationOutcome, ValidationTruth};
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn context() -> ValidationContext {
        ValidationContext {
            event_key: "2025wimi".to_string(),
            match_key: "2025wimi_qm3".to_string(),
            team_number: 930,
            season_year: 2025,
            execution_id: Uuid::new_v4(),
            min_scouts_required: 3,
        }
    }

    fn manual_truth(payload: serde_json::Value) -> ValidationTruth {
        ValidationTruth {
            id: Uuid::new_v4(),
            event_key: "2025wimi".to_string(),
            match_key: "2025wimi_qm3".to_string(),
            team_number: 930,
            season_year: 2025,
            source: TruthSource::Manual,
            payload,
            scout_count: 0,
            execution_id: None,
            created_by: Some("head-scout".to_string()),
            created_at: Utc::now(),
        }
    }

    fn scouting(performances: &[(&str, serde_json::Value)]) -> Arc<InMemoryScoutingRepository> {
        Arc::new(InMemoryScoutingRepository::with_observations(
            performances
                .iter()
                .map(|(scouter, performance)| {
                    ScoutingObservation::new(
                        scouter,
                        "2025wimi",
                        "2025wimi_qm3",
                        930,
                        2025,
                        performance.clone(),
                    )
                })
                .collect(),
        ))
    }

    #[tokio::test]
    async fn cannot_validate_without_manual_truth() {
        let truths = Arc::new(InMemoryValidationConsensusRepository::new());
        let strategy = ManualStrategy::new(
            scouting(&[("a", json!({ "teleop": { "algae_net": 2 } }))]),
            truths,
            ComparisonSettings::default(),
        );

        assert!(!strategy.can_validate(&context()).await);
        assert!(strategy.validate(&context()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ignores_consensus_truths() {
        let truths = Arc::new(InMemoryValidationConsensusRepository::new());
        let mut consensus = manual_truth(json!({ "teleop": { "algae_net": 2 } }));
        consensus.source = TruthSource::Consensus;
        truths.save_truth(&consensus).await.unwrap();

        let strategy = ManualStrategy::new(
            scouting(&[("a", json!({ "teleop": { "algae_net": 2 } }))]),
            truths,
            ComparisonSettings::default(),
        );
        assert!(!strategy.can_validate(&context()).await);
    }

    #[tokio::test]
    async fn judges_scouts_against_manual_truth() {
        let truths = Arc::new(InMemoryValidationConsensusRepository::new());
        truths
            .save_truth(&manual_truth(json!({ "teleop": { "algae_net": 10 } })))
            .await
            .unwrap();

        let strategy = ManualStrategy::new(
            scouting(&[
                ("a", json!({ "teleop": { "algae_net": 10 } })),
                ("b", json!({ "teleop": { "algae_net": 11 } })),
            ]),
            truths,
            ComparisonSettings::default(),
        );
        let ctx = context();

        assert!(strategy.can_validate(&ctx).await);
        let results = strategy.validate(&ctx).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].outcome, ValidationOutcome::ExactMatch);
        assert_eq!(results[1].outcome, ValidationOutcome::CloseMatch);
        assert_eq!(results[1].accuracy_score, 0.7);
    }
}
