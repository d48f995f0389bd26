use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{judge_observations, latest_per_scouter};
use crate::consolidation::consolidate_performance_data;
use crate::scouting::ScoutingRepository;
use crate::validation::{
    ComparisonSettings, TruthSource, ValidationConsensusRepository, ValidationContext,
    ValidationError, ValidationResult, ValidationStrategy, ValidationStrategyType,
    ValidationTruth,
};

/// Judges each scout against the consolidated view of everyone who scouted
/// the same team in the same match.
pub struct ConsensusStrategy {
    scouting: Arc<dyn ScoutingRepository>,
    consensus: Arc<dyn ValidationConsensusRepository>,
    comparison: ComparisonSettings,
    /// Consensus payloads awaiting `commit`, per run and team
    staged: Mutex<HashMap<StagingKey, ValidationTruth>>,
}

type StagingKey = (Uuid, String, i32);

fn staging_key(context: &ValidationContext) -> StagingKey {
    (
        context.execution_id,
        context.match_key.clone(),
        context.team_number,
    )
}

impl ConsensusStrategy {
    pub fn new(
        scouting: Arc<dyn ScoutingRepository>,
        consensus: Arc<dyn ValidationConsensusRepository>,
        comparison: ComparisonSettings,
    ) -> Self {
        Self {
            scouting,
            consensus,
            comparison,
            staged: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ValidationStrategy for ConsensusStrategy {
    fn strategy_type(&self) -> ValidationStrategyType {
        ValidationStrategyType::Consensus
    }

    #[instrument(skip(self, context), fields(match_key = %context.match_key, team = context.team_number))]
    async fn can_validate(&self, context: &ValidationContext) -> bool {
        match self
            .scouting
            .find_by_match_and_team(&context.match_key, context.team_number)
            .await
        {
            Ok(observations) => {
                let scouts = latest_per_scouter(observations).len();
                scouts > 0 && scouts >= context.min_scouts_required
            }
            Err(err) => {
                warn!(?err, "Could not load observations for consensus check");
                false
            }
        }
    }

    #[instrument(skip(self, context), fields(match_key = %context.match_key, team = context.team_number))]
    async fn validate(
        &self,
        context: &ValidationContext,
    ) -> Result<Vec<ValidationResult>, ValidationError> {
        let observations = latest_per_scouter(
            self.scouting
                .find_by_match_and_team(&context.match_key, context.team_number)
                .await?,
        );

        if observations.is_empty() || observations.len() < context.min_scouts_required {
            debug!(scouts = observations.len(), "Not enough scouts for consensus");
            return Ok(Vec::new());
        }

        let payloads: Vec<Value> = observations.iter().map(|o| o.performance.clone()).collect();
        let consensus = consolidate_performance_data(&payloads, None);

        self.staged.lock().await.insert(
            staging_key(context),
            ValidationTruth {
                id: Uuid::new_v4(),
                event_key: context.event_key.clone(),
                match_key: context.match_key.clone(),
                team_number: context.team_number,
                season_year: context.season_year,
                source: TruthSource::Consensus,
                payload: consensus.clone(),
                scout_count: observations.len() as i32,
                execution_id: Some(context.execution_id),
                created_by: None,
                created_at: Utc::now(),
            },
        );

        let results = judge_observations(
            context,
            &observations,
            &consensus,
            ValidationStrategyType::Consensus,
            &self.comparison,
        );

        debug!(
            scouts = observations.len(),
            results = results.len(),
            "Consensus validation complete"
        );
        Ok(results)
    }

    async fn commit(&self, context: &ValidationContext) -> Result<(), ValidationError> {
        let staged = self.staged.lock().await.remove(&staging_key(context));
        if let Some(truth) = staged {
            self.consensus.save_truth(&truth).await?;
            debug!(scout_count = truth.scout_count, "Consensus truth stored");
        }
        Ok(())
    }

    async fn discard(&self, context: &ValidationContext) {
        if self.staged.lock().await.remove(&staging_key(context)).is_some() {
            debug!(
                match_key = %context.match_key,
                team = context.team_number,
                "Consensus truth dropped with its team"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scouting::{InMemoryScoutingRepository, ScoutingObservation};
    use crate::shared::RepositoryError;
    use crate::validation::{InMemoryValidationConsensusRepository, ValidationOutcome};
    use serde_json::json;

    struct FailingScoutingRepository;

    #[async_trait]
    impl ScoutingRepository for FailingScoutingRepository {
        async fn find_by_match_and_team(
            &self,
            _match_key: &str,
            _team_number: i32,
        ) -> Result<Vec<ScoutingObservation>, RepositoryError> {
            Err(RepositoryError::Database("connection reset".to_string()))
        }
    }

    fn context(min_scouts_required: usize) -> ValidationContext {
        ValidationContext {
            event_key: "2025wimi".to_string(),
            match_key: "2025wimi_qm1".to_string(),
            team_number: 254,
            season_year: 2025,
            execution_id: Uuid::new_v4(),
            min_scouts_required,
        }
    }

    fn observation(scouter: &str, coral: i64, left_zone: bool) -> ScoutingObservation {
        ScoutingObservation::new(
            scouter,
            "2025wimi",
            "2025wimi_qm1",
            254,
            2025,
            json!({ "auto": { "coral_l4": coral, "left_zone": left_zone } }),
        )
    }

    fn strategy(
        scouting: Arc<dyn ScoutingRepository>,
    ) -> (ConsensusStrategy, Arc<InMemoryValidationConsensusRepository>) {
        let consensus = Arc::new(InMemoryValidationConsensusRepository::new());
        (
            ConsensusStrategy::new(scouting, consensus.clone(), ComparisonSettings::default()),
            consensus,
        )
    }

    #[tokio::test]
    async fn cannot_validate_without_scouts() {
        let (strategy, _) = strategy(Arc::new(InMemoryScoutingRepository::new()));
        assert!(!strategy.can_validate(&context(3)).await);
    }

    #[tokio::test]
    async fn cannot_validate_below_minimum_scouts() {
        let (strategy, _) = strategy(Arc::new(InMemoryScoutingRepository::with_observations(
            vec![observation("a", 2, true), observation("b", 2, true)],
        )));
        assert!(!strategy.can_validate(&context(3)).await);
        assert!(strategy.validate(&context(3)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repository_failure_means_cannot_validate() {
        let (strategy, _) = strategy(Arc::new(FailingScoutingRepository));
        assert!(!strategy.can_validate(&context(1)).await);
    }

    #[tokio::test]
    async fn judges_every_scout_against_consensus() {
        let (strategy, consensus) =
            strategy(Arc::new(InMemoryScoutingRepository::with_observations(vec![
                observation("a", 3, true),
                observation("b", 3, true),
                observation("c", 9, false),
            ])));
        let ctx = context(3);

        assert!(strategy.can_validate(&ctx).await);
        let results = strategy.validate(&ctx).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results
            .iter()
            .all(|r| r.validation_type == ValidationStrategyType::Consensus));

        let outlier = results.iter().find(|r| r.scouter_id == "c").unwrap();
        assert_eq!(outlier.outcome, ValidationOutcome::Mismatch);
        assert_eq!(outlier.accuracy_score, 0.0);

        let agreeing = results.iter().find(|r| r.scouter_id == "a").unwrap();
        // consensus coral is round(15 / 3) = 5, two off from 3
        assert_eq!(agreeing.outcome, ValidationOutcome::Mismatch);
        assert!((agreeing.accuracy_score - 0.5).abs() < 1e-12);

        strategy.commit(&ctx).await.unwrap();
        let stored = consensus
            .find_truth("2025wimi_qm1", 254, TruthSource::Consensus)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.scout_count, 3);
        assert_eq!(stored.payload["auto"]["left_zone"], json!(true));
        assert_eq!(stored.execution_id, Some(ctx.execution_id));
    }

    #[tokio::test]
    async fn consensus_truth_waits_for_commit() {
        let (strategy, consensus) =
            strategy(Arc::new(InMemoryScoutingRepository::with_observations(vec![
                observation("a", 3, true),
                observation("b", 3, true),
                observation("c", 3, true),
            ])));
        let ctx = context(3);

        strategy.validate(&ctx).await.unwrap();
        assert!(consensus
            .find_truth("2025wimi_qm1", 254, TruthSource::Consensus)
            .await
            .unwrap()
            .is_none());

        strategy.discard(&ctx).await;
        strategy.commit(&ctx).await.unwrap();
        assert!(consensus
            .find_truth("2025wimi_qm1", 254, TruthSource::Consensus)
            .await
            .unwrap()
            .is_none());
    }
}
