use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    RunPhase, StrategyRegistry, TruthSource, ValidationConsensusRepository, ValidationContext,
    ValidationError, ValidationExecutionSummary, ValidationFailure, ValidationResult,
    ValidationResultRepository, ValidationSettings, ValidationStrategy, ValidationStrategyType,
    ValidationTruth,
};
use crate::elo::{
    EloCalculator, EloHistoryEntry, EloUpdateSummary, LeaderboardEntry, ScouterEloRepository,
    ScouterRating, UpdateRatingParams,
};
use crate::matches::{season_from_event_key, MatchModel, MatchRepository};

/// Where a run was started from; decides which error a fatal failure becomes
#[derive(Debug, Clone, Copy)]
struct RunScope<'a> {
    event_key: &'a str,
    match_key: Option<&'a str>,
}

impl RunScope<'_> {
    fn failure(&self, message: impl Into<String>) -> ValidationError {
        match self.match_key {
            Some(match_key) => ValidationError::MatchValidationFailed {
                match_key: match_key.to_string(),
                message: message.into(),
            },
            None => ValidationError::EventValidationFailed {
                event_key: self.event_key.to_string(),
                message: message.into(),
            },
        }
    }
}

#[derive(Debug, Default)]
struct MatchOutcome {
    results: Vec<ValidationResult>,
    failures: Vec<ValidationFailure>,
    teams_attempted: usize,
    teams_validated: usize,
}

async fn discard_all(strategies: &[&Arc<dyn ValidationStrategy>], context: &ValidationContext) {
    for strategy in strategies {
        strategy.discard(context).await;
    }
}

/// Runs validation strategies over matches and folds the verdicts into
/// scouter ratings.
pub struct ScouterValidationService {
    matches: Arc<dyn MatchRepository>,
    elo: Arc<dyn ScouterEloRepository>,
    results: Arc<dyn ValidationResultRepository>,
    truths: Arc<dyn ValidationConsensusRepository>,
    strategies: StrategyRegistry,
    calculator: EloCalculator,
    settings: ValidationSettings,
    event_mutexes: Arc<RwLock<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl ScouterValidationService {
    pub fn new(
        matches: Arc<dyn MatchRepository>,
        elo: Arc<dyn ScouterEloRepository>,
        results: Arc<dyn ValidationResultRepository>,
        truths: Arc<dyn ValidationConsensusRepository>,
        strategies: StrategyRegistry,
        calculator: EloCalculator,
        settings: ValidationSettings,
    ) -> Self {
        Self {
            matches,
            elo,
            results,
            truths,
            strategies,
            calculator,
            settings,
            event_mutexes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn strategy_types(&self) -> Vec<ValidationStrategyType> {
        self.strategies.types()
    }

    /// Validates every completed match of an event
    #[instrument(skip(self, strategy_types))]
    pub async fn validate_event(
        &self,
        event_key: &str,
        strategy_types: Option<&[ValidationStrategyType]>,
    ) -> Result<ValidationExecutionSummary, ValidationError> {
        let scope = RunScope {
            event_key,
            match_key: None,
        };
        let season_year = season_from_event_key(event_key).ok_or_else(|| {
            ValidationError::InvalidEventKey {
                event_key: event_key.to_string(),
            }
        })?;

        let event_lock = self.event_lock(event_key).await;
        let summary = {
            let _guard = event_lock.lock().await;
            self.execute_event(scope, season_year, strategy_types).await
        };
        self.release_event_lock(event_key, event_lock).await;
        summary
    }

    async fn execute_event(
        &self,
        scope: RunScope<'_>,
        season_year: i32,
        strategy_types: Option<&[ValidationStrategyType]>,
    ) -> Result<ValidationExecutionSummary, ValidationError> {
        let matches = self
            .matches
            .find_by_event_key(scope.event_key)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to load event matches");
                scope.failure(e.to_string())
            })?;

        let total_matches = matches.len();
        let completed: Vec<MatchModel> = matches.into_iter().filter(|m| m.is_completed()).collect();
        debug!(
            total_matches,
            completed_matches = completed.len(),
            "Loaded event matches"
        );

        self.execute(scope, season_year, total_matches, completed, strategy_types)
            .await
    }

    /// Validates one match, played or not
    #[instrument(skip(self, strategy_types))]
    pub async fn validate_match(
        &self,
        match_key: &str,
        strategy_types: Option<&[ValidationStrategyType]>,
    ) -> Result<ValidationExecutionSummary, ValidationError> {
        let model = self
            .matches
            .find_by_match_key(match_key)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to load match");
                ValidationError::MatchValidationFailed {
                    match_key: match_key.to_string(),
                    message: e.to_string(),
                }
            })?
            .ok_or_else(|| ValidationError::MatchNotFound {
                match_key: match_key.to_string(),
            })?;

        let season_year =
            model
                .season_year()
                .ok_or_else(|| ValidationError::InvalidEventKey {
                    event_key: model.event_key.clone(),
                })?;

        let event_key = model.event_key.clone();
        let scope = RunScope {
            event_key: &event_key,
            match_key: Some(match_key),
        };

        let event_lock = self.event_lock(&event_key).await;
        let summary = {
            let _guard = event_lock.lock().await;
            self.execute(scope, season_year, 1, vec![model], strategy_types)
                .await
        };
        self.release_event_lock(&event_key, event_lock).await;
        summary
    }

    async fn execute(
        &self,
        scope: RunScope<'_>,
        season_year: i32,
        total_matches: usize,
        mut matches: Vec<MatchModel>,
        strategy_types: Option<&[ValidationStrategyType]>,
    ) -> Result<ValidationExecutionSummary, ValidationError> {
        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();
        let strategies = self.strategies.select(strategy_types);
        let strategy_order: Vec<ValidationStrategyType> =
            strategies.iter().map(|s| s.strategy_type()).collect();

        info!(
            %execution_id,
            event_key = scope.event_key,
            phase = %RunPhase::Pending,
            strategies = ?strategy_order,
            "Validation run created"
        );

        matches.sort_by(|a, b| a.canonical_cmp(b));

        info!(%execution_id, phase = %RunPhase::Running, matches = matches.len(), "Validating matches");
        let mut results = Vec::new();
        let mut errors = Vec::new();
        let mut teams_attempted = 0;
        let mut teams_validated = 0;

        for (index, batch) in matches.chunks(self.settings.batch_size.max(1)).enumerate() {
            debug!(batch = index + 1, size = batch.len(), "Processing match batch");
            for model in batch {
                let outcome = self
                    .validate_single_match(model, season_year, execution_id, &strategies)
                    .await;
                teams_attempted += outcome.teams_attempted;
                teams_validated += outcome.teams_validated;
                results.extend(outcome.results);
                errors.extend(outcome.failures);
            }
        }

        if teams_attempted == 1 && errors.len() == 1 {
            let failure = &errors[0];
            warn!(%execution_id, message = %failure.message, "Only unit of work failed");
            return Err(scope.failure(failure.message.clone()));
        }

        info!(%execution_id, phase = %RunPhase::Persisting, results = results.len(), "Persisting validation results");
        if !results.is_empty() {
            self.results.create_batch(&results).await.map_err(|e| {
                warn!(error = %e, "Failed to persist validation results");
                scope.failure(e.to_string())
            })?;
        }

        info!(%execution_id, phase = %RunPhase::UpdatingElo, "Applying rating updates");
        let (elo_updates, elo_errors) = self
            .apply_elo_updates(&results, &matches, season_year, execution_id)
            .await;
        errors.extend(elo_errors);

        let mut validations_by_type = BTreeMap::new();
        for result in &results {
            *validations_by_type.entry(result.validation_type).or_insert(0) += 1;
        }

        let completed_at = Utc::now();
        let summary = ValidationExecutionSummary {
            execution_id,
            event_key: scope.event_key.to_string(),
            match_key: scope.match_key.map(str::to_string),
            strategies: strategy_order,
            total_matches,
            matches_processed: matches.len(),
            teams_validated,
            total_validations: results.len(),
            validations_by_type,
            scouters_affected: elo_updates.len(),
            elo_updates,
            errors,
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds(),
        };

        info!(
            %execution_id,
            phase = %RunPhase::Completed,
            total_validations = summary.total_validations,
            scouters_affected = summary.scouters_affected,
            errors = summary.errors.len(),
            duration_ms = summary.duration_ms,
            "Validation run finished"
        );
        Ok(summary)
    }

    /// Runs every applicable strategy for every team in the match. A team
    /// keeps its results only when none of its strategies failed.
    async fn validate_single_match(
        &self,
        model: &MatchModel,
        season_year: i32,
        execution_id: Uuid,
        strategies: &[Arc<dyn ValidationStrategy>],
    ) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();

        for team_number in model.teams() {
            let context = ValidationContext {
                event_key: model.event_key.clone(),
                match_key: model.match_key.clone(),
                team_number,
                season_year,
                execution_id,
                min_scouts_required: self.settings.min_scouts_required,
            };
            outcome.teams_attempted += 1;

            match self.validate_team(&context, strategies).await {
                Ok(Some(team_results)) => {
                    outcome.teams_validated += 1;
                    outcome.results.extend(team_results);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        match_key = %model.match_key,
                        team_number,
                        error = %err,
                        "Team validation failed"
                    );
                    outcome.failures.push(ValidationFailure {
                        match_key: Some(model.match_key.clone()),
                        team_number: Some(team_number),
                        scouter_id: None,
                        message: err.to_string(),
                    });
                }
            }
        }

        outcome
    }

    /// `None` when no strategy could validate the team. Staged truths are
    /// committed only when every applicable strategy succeeded.
    async fn validate_team(
        &self,
        context: &ValidationContext,
        strategies: &[Arc<dyn ValidationStrategy>],
    ) -> Result<Option<Vec<ValidationResult>>, ValidationError> {
        let mut team_results = Vec::new();
        let mut applied: Vec<&Arc<dyn ValidationStrategy>> = Vec::new();

        for strategy in strategies {
            if !strategy.can_validate(context).await {
                continue;
            }
            applied.push(strategy);

            match strategy.validate(context).await {
                Ok(results) => team_results.extend(results),
                Err(err) => {
                    discard_all(&applied, context).await;
                    return Err(ValidationError::StrategyFailed {
                        strategy: strategy.strategy_type(),
                        message: err.to_string(),
                    });
                }
            }
        }

        for strategy in &applied {
            if let Err(err) = strategy.commit(context).await {
                discard_all(&applied, context).await;
                return Err(ValidationError::StrategyFailed {
                    strategy: strategy.strategy_type(),
                    message: err.to_string(),
                });
            }
        }

        Ok((!applied.is_empty()).then_some(team_results))
    }

    /// Applies one rating update per result, per scouter, in canonical order:
    /// match play order, then strategy type, then team number.
    async fn apply_elo_updates(
        &self,
        results: &[ValidationResult],
        matches: &[MatchModel],
        season_year: i32,
        execution_id: Uuid,
    ) -> (Vec<EloUpdateSummary>, Vec<ValidationFailure>) {
        let match_order: HashMap<&str, usize> = matches
            .iter()
            .enumerate()
            .map(|(index, m)| (m.match_key.as_str(), index))
            .collect();

        let mut ordered: Vec<&ValidationResult> = results.iter().collect();
        ordered.sort_by_key(|r| {
            (
                match_order.get(r.match_key.as_str()).copied().unwrap_or(usize::MAX),
                r.validation_type,
                r.team_number,
            )
        });

        let mut by_scouter: BTreeMap<&str, Vec<&ValidationResult>> = BTreeMap::new();
        for result in ordered {
            by_scouter.entry(result.scouter_id.as_str()).or_default().push(result);
        }

        let mut summaries = Vec::new();
        let mut failures = Vec::new();
        for (scouter_id, scouter_results) in by_scouter {
            let (summary, failure) = self
                .apply_scouter_updates(scouter_id, season_year, execution_id, &scouter_results)
                .await;
            summaries.extend(summary);
            failures.extend(failure);
        }

        (summaries, failures)
    }

    #[instrument(skip(self, results), fields(count = results.len()))]
    async fn apply_scouter_updates(
        &self,
        scouter_id: &str,
        season_year: i32,
        execution_id: Uuid,
        results: &[&ValidationResult],
    ) -> (Option<EloUpdateSummary>, Option<ValidationFailure>) {
        let scouter_failure = |message: String| ValidationFailure {
            match_key: None,
            team_number: None,
            scouter_id: Some(scouter_id.to_string()),
            message,
        };

        let starting_elo = match self.elo.get_current_rating(scouter_id, season_year).await {
            Ok(rating) => rating
                .map(|r| r.current_elo)
                .unwrap_or_else(|| self.calculator.initial_rating()),
            Err(e) => {
                warn!(error = %e, "Failed to load current rating");
                return (None, Some(scouter_failure(e.to_string())));
            }
        };

        let mut current = starting_elo;
        let mut entries = Vec::with_capacity(results.len());
        let mut failure = None;

        for result in results {
            let calculation = self
                .calculator
                .calculate_new_rating(current, result.accuracy_score);
            let params = UpdateRatingParams {
                scouter_id: scouter_id.to_string(),
                season_year,
                previous_elo: current,
                new_elo: calculation.new_rating,
                outcome: result.outcome,
            };

            let entry = EloHistoryEntry {
                id: Uuid::new_v4(),
                scouter_id: scouter_id.to_string(),
                season_year,
                execution_id,
                validation_id: result.id,
                elo_before: current,
                elo_after: calculation.new_rating,
                delta: calculation.new_rating - current,
                outcome: result.outcome,
                accuracy_score: result.accuracy_score,
                validation_type: result.validation_type,
                event_key: result.event_key.clone(),
                match_key: result.match_key.clone(),
                team_number: result.team_number,
                created_at: Utc::now(),
            };

            match self.elo.apply_update(&params, &entry).await {
                Ok(stored) => {
                    current = stored.current_elo;
                    entries.push(entry);
                }
                Err(e) => {
                    warn!(error = %e, validation_id = %result.id, "Rating update rejected");
                    failure = Some(ValidationFailure {
                        match_key: Some(result.match_key.clone()),
                        team_number: Some(result.team_number),
                        ..scouter_failure(e.to_string())
                    });
                    break;
                }
            }
        }

        let summary = (!entries.is_empty()).then(|| {
            EloUpdateSummary::from_history(scouter_id, season_year, starting_elo, &entries)
        });
        debug!(starting_elo, ending_elo = current, "Scouter rating updated");
        (summary, failure)
    }

    async fn event_lock(&self, event_key: &str) -> Arc<AsyncMutex<()>> {
        {
            let guard = self.event_mutexes.read().await;
            if let Some(lock) = guard.get(event_key) {
                return lock.clone();
            }
        }

        let mut guard = self.event_mutexes.write().await;
        guard
            .entry(event_key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Forgets the event's lock once no other run holds or awaits it
    async fn release_event_lock(&self, event_key: &str, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self.event_mutexes.write().await;
        // One reference in the map, one here
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(event_key);
        }
    }

    #[cfg(test)]
    async fn tracked_event_locks(&self) -> usize {
        self.event_mutexes.read().await.len()
    }

    /// Current rating, or the starting rating for a scouter never validated
    #[instrument(skip(self))]
    pub async fn get_scouter_rating(
        &self,
        scouter_id: &str,
        season_year: i32,
    ) -> Result<ScouterRating, ValidationError> {
        let rating = self
            .elo
            .get_current_rating(scouter_id, season_year)
            .await
            .map_err(|e| ValidationError::GetRatingFailed {
                scouter_id: scouter_id.to_string(),
                message: e.to_string(),
            })?;

        Ok(rating.unwrap_or_else(|| {
            ScouterRating::initial(scouter_id, season_year, self.calculator.initial_rating())
        }))
    }

    #[instrument(skip(self))]
    pub async fn get_scouter_rating_history(
        &self,
        scouter_id: &str,
        season_year: i32,
        limit: Option<usize>,
    ) -> Result<Vec<EloHistoryEntry>, ValidationError> {
        self.elo
            .get_rating_history(scouter_id, season_year, limit)
            .await
            .map_err(|e| ValidationError::GetHistoryFailed {
                scouter_id: scouter_id.to_string(),
                message: e.to_string(),
            })
    }

    #[instrument(skip(self))]
    pub async fn get_event_leaderboard(
        &self,
        event_key: &str,
        limit: Option<usize>,
    ) -> Result<Vec<LeaderboardEntry>, ValidationError> {
        self.elo
            .get_event_leaderboard(event_key, limit)
            .await
            .map_err(|e| ValidationError::GetLeaderboardFailed {
                scope: format!("event {event_key}"),
                message: e.to_string(),
            })
    }

    #[instrument(skip(self))]
    pub async fn get_season_leaderboard(
        &self,
        season_year: i32,
        limit: Option<usize>,
    ) -> Result<Vec<LeaderboardEntry>, ValidationError> {
        self.elo
            .get_season_leaderboard(season_year, limit)
            .await
            .map_err(|e| ValidationError::GetLeaderboardFailed {
                scope: format!("season {season_year}"),
                message: e.to_string(),
            })
    }

    #[instrument(skip(self))]
    pub async fn get_scouter_validations(
        &self,
        scouter_id: &str,
        season_year: Option<i32>,
    ) -> Result<Vec<ValidationResult>, ValidationError> {
        self.results
            .find_by_scouter(scouter_id, season_year)
            .await
            .map_err(|e| ValidationError::GetValidationsFailed {
                scope: format!("scouter {scouter_id}"),
                message: e.to_string(),
            })
    }

    #[instrument(skip(self))]
    pub async fn get_match_validations(
        &self,
        match_key: &str,
    ) -> Result<Vec<ValidationResult>, ValidationError> {
        self.results
            .find_by_match(match_key)
            .await
            .map_err(|e| ValidationError::GetValidationsFailed {
                scope: format!("match {match_key}"),
                message: e.to_string(),
            })
    }

    /// Consensus and manual truths stored for a match
    #[instrument(skip(self))]
    pub async fn get_match_truths(
        &self,
        match_key: &str,
    ) -> Result<Vec<ValidationTruth>, ValidationError> {
        self.truths
            .find_by_match(match_key)
            .await
            .map_err(|e| ValidationError::GetValidationsFailed {
                scope: format!("match {match_key}"),
                message: e.to_string(),
            })
    }

    /// Stores a hand-entered truth for a team, replacing any earlier one
    #[instrument(skip(self, payload))]
    pub async fn record_manual_truth(
        &self,
        match_key: &str,
        team_number: i32,
        payload: Value,
        created_by: Option<String>,
    ) -> Result<ValidationTruth, ValidationError> {
        let invalid = |message: String| ValidationError::MatchValidationFailed {
            match_key: match_key.to_string(),
            message,
        };

        if !payload.is_object() {
            return Err(invalid("manual truth must be a JSON object".to_string()));
        }

        let model = self
            .matches
            .find_by_match_key(match_key)
            .await?
            .ok_or_else(|| ValidationError::MatchNotFound {
                match_key: match_key.to_string(),
            })?;

        if model.position_of(team_number).is_none() {
            return Err(invalid(format!("team {team_number} did not play in this match")));
        }

        let season_year = model
            .season_year()
            .ok_or_else(|| ValidationError::InvalidEventKey {
                event_key: model.event_key.clone(),
            })?;

        let truth = ValidationTruth {
            id: Uuid::new_v4(),
            event_key: model.event_key.clone(),
            match_key: match_key.to_string(),
            team_number,
            season_year,
            source: TruthSource::Manual,
            payload,
            scout_count: 0,
            execution_id: None,
            created_by,
            created_at: Utc::now(),
        };

        self.truths.save_truth(&truth).await?;
        info!(team_number, "Manual truth recorded");
        Ok(truth)
    }
}
