use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::{
    TruthSource, ValidationOutcome, ValidationResult, ValidationStrategyType, ValidationTruth,
};
use crate::shared::RepositoryError;

/// Append-only store of validation verdicts
#[async_trait]
pub trait ValidationResultRepository: Send + Sync {
    async fn create_batch(&self, results: &[ValidationResult]) -> Result<(), RepositoryError>;
    async fn find_by_scouter(
        &self,
        scouter_id: &str,
        season_year: Option<i32>,
    ) -> Result<Vec<ValidationResult>, RepositoryError>;
    async fn find_by_match(&self, match_key: &str)
        -> Result<Vec<ValidationResult>, RepositoryError>;
}

/// Store of consensus and manual truth payloads
#[async_trait]
pub trait ValidationConsensusRepository: Send + Sync {
    /// Inserts or replaces the truth for (match, team, source)
    async fn save_truth(&self, truth: &ValidationTruth) -> Result<(), RepositoryError>;
    async fn find_truth(
        &self,
        match_key: &str,
        team_number: i32,
        source: TruthSource,
    ) -> Result<Option<ValidationTruth>, RepositoryError>;
    async fn find_by_match(&self, match_key: &str) -> Result<Vec<ValidationTruth>, RepositoryError>;
}

/// In-memory implementation of ValidationResultRepository for development and testing
#[derive(Debug, Default)]
pub struct InMemoryValidationResultRepository {
    results: RwLock<Vec<ValidationResult>>,
}

impl InMemoryValidationResultRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn result_count(&self) -> usize {
        self.results.read().await.len()
    }
}

#[async_trait]
impl ValidationResultRepository for InMemoryValidationResultRepository {
    #[instrument(skip(self, results), fields(count = results.len()))]
    async fn create_batch(&self, results: &[ValidationResult]) -> Result<(), RepositoryError> {
        self.results.write().await.extend_from_slice(results);
        debug!("Stored validation results in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_scouter(
        &self,
        scouter_id: &str,
        season_year: Option<i32>,
    ) -> Result<Vec<ValidationResult>, RepositoryError> {
        let results = self.results.read().await;
        Ok(results
            .iter()
            .filter(|r| r.scouter_id == scouter_id)
            .filter(|r| season_year.map_or(true, |season| r.season_year == season))
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn find_by_match(
        &self,
        match_key: &str,
    ) -> Result<Vec<ValidationResult>, RepositoryError> {
        let results = self.results.read().await;
        Ok(results
            .iter()
            .filter(|r| r.match_key == match_key)
            .cloned()
            .collect())
    }
}

/// In-memory implementation of ValidationConsensusRepository for development and testing
#[derive(Debug, Default)]
pub struct InMemoryValidationConsensusRepository {
    truths: RwLock<Vec<ValidationTruth>>,
}

impl InMemoryValidationConsensusRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ValidationConsensusRepository for InMemoryValidationConsensusRepository {
    #[instrument(skip(self, truth), fields(match_key = %truth.match_key, team_number = truth.team_number))]
    async fn save_truth(&self, truth: &ValidationTruth) -> Result<(), RepositoryError> {
        let mut truths = self.truths.write().await;
        truths.retain(|t| {
            !(t.match_key == truth.match_key
                && t.team_number == truth.team_number
                && t.source == truth.source)
        });
        truths.push(truth.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_truth(
        &self,
        match_key: &str,
        team_number: i32,
        source: TruthSource,
    ) -> Result<Option<ValidationTruth>, RepositoryError> {
        let truths = self.truths.read().await;
        Ok(truths
            .iter()
            .find(|t| t.match_key == match_key && t.team_number == team_number && t.source == source)
            .cloned())
    }

    #[instrument(skip(self))]
    async fn find_by_match(&self, match_key: &str) -> Result<Vec<ValidationTruth>, RepositoryError> {
        let truths = self.truths.read().await;
        let mut found: Vec<ValidationTruth> = truths
            .iter()
            .filter(|t| t.match_key == match_key)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.team_number);
        Ok(found)
    }
}

/// PostgreSQL implementation of validation result storage
pub struct PostgresValidationResultRepository {
    pool: PgPool,
}

impl PostgresValidationResultRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RESULT_COLUMNS: &str = "id, execution_id, scouter_id, event_key, match_key, team_number, \
     season_year, validation_type, outcome, accuracy_score, details, created_at";

fn parse_column<T: std::str::FromStr>(raw: String, column: &str) -> Result<T, RepositoryError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| RepositoryError::Database(format!("invalid {column} {raw}: {e}")))
}

fn result_from_row(row: &PgRow) -> Result<ValidationResult, RepositoryError> {
    Ok(ValidationResult {
        id: row.try_get("id")?,
        execution_id: row.try_get("execution_id")?,
        scouter_id: row.try_get("scouter_id")?,
        event_key: row.try_get("event_key")?,
        match_key: row.try_get("match_key")?,
        team_number: row.try_get("team_number")?,
        season_year: row.try_get("season_year")?,
        validation_type: parse_column::<ValidationStrategyType>(
            row.try_get("validation_type")?,
            "validation_type",
        )?,
        outcome: parse_column::<ValidationOutcome>(row.try_get("outcome")?, "outcome")?,
        accuracy_score: row.try_get("accuracy_score")?,
        details: row.try_get("details")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ValidationResultRepository for PostgresValidationResultRepository {
    #[instrument(skip(self, results), fields(count = results.len()))]
    async fn create_batch(&self, results: &[ValidationResult]) -> Result<(), RepositoryError> {
        if results.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for result in results {
            sqlx::query(&format!(
                "INSERT INTO validation_results ({RESULT_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
            ))
            .bind(result.id)
            .bind(result.execution_id)
            .bind(&result.scouter_id)
            .bind(&result.event_key)
            .bind(&result.match_key)
            .bind(result.team_number)
            .bind(result.season_year)
            .bind(result.validation_type.as_ref())
            .bind(result.outcome.as_ref())
            .bind(result.accuracy_score)
            .bind(&result.details)
            .bind(result.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to insert validation result");
                RepositoryError::from(e)
            })?;
        }
        tx.commit().await?;

        debug!("Stored validation results in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_scouter(
        &self,
        scouter_id: &str,
        season_year: Option<i32>,
    ) -> Result<Vec<ValidationResult>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RESULT_COLUMNS} FROM validation_results \
             WHERE scouter_id = $1 AND ($2::int IS NULL OR season_year = $2) \
             ORDER BY created_at ASC"
        ))
        .bind(scouter_id)
        .bind(season_year)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, scouter_id, "Failed to load scouter validations");
            RepositoryError::from(e)
        })?;

        rows.iter().map(result_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn find_by_match(
        &self,
        match_key: &str,
    ) -> Result<Vec<ValidationResult>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RESULT_COLUMNS} FROM validation_results \
             WHERE match_key = $1 ORDER BY created_at ASC"
        ))
        .bind(match_key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, match_key, "Failed to load match validations");
            RepositoryError::from(e)
        })?;

        rows.iter().map(result_from_row).collect()
    }
}

/// PostgreSQL implementation of truth record storage
pub struct PostgresValidationConsensusRepository {
    pool: PgPool,
}

impl PostgresValidationConsensusRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TRUTH_COLUMNS: &str = "id, event_key, match_key, team_number, season_year, source, \
     payload, scout_count, execution_id, created_by, created_at";

fn truth_from_row(row: &PgRow) -> Result<ValidationTruth, RepositoryError> {
    Ok(ValidationTruth {
        id: row.try_get("id")?,
        event_key: row.try_get("event_key")?,
        match_key: row.try_get("match_key")?,
        team_number: row.try_get("team_number")?,
        season_year: row.try_get("season_year")?,
        source: parse_column::<TruthSource>(row.try_get("source")?, "source")?,
        payload: row.try_get("payload")?,
        scout_count: row.try_get("scout_count")?,
        execution_id: row.try_get("execution_id")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ValidationConsensusRepository for PostgresValidationConsensusRepository {
    #[instrument(skip(self, truth), fields(match_key = %truth.match_key, team_number = truth.team_number))]
    async fn save_truth(&self, truth: &ValidationTruth) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO validation_consensus ({TRUTH_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (match_key, team_number, source) DO UPDATE SET \
                id = EXCLUDED.id, payload = EXCLUDED.payload, \
                scout_count = EXCLUDED.scout_count, execution_id = EXCLUDED.execution_id, \
                created_by = EXCLUDED.created_by, created_at = EXCLUDED.created_at"
        ))
        .bind(truth.id)
        .bind(&truth.event_key)
        .bind(&truth.match_key)
        .bind(truth.team_number)
        .bind(truth.season_year)
        .bind(truth.source.as_ref())
        .bind(&truth.payload)
        .bind(truth.scout_count)
        .bind(truth.execution_id)
        .bind(&truth.created_by)
        .bind(truth.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to save truth record");
            RepositoryError::from(e)
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_truth(
        &self,
        match_key: &str,
        team_number: i32,
        source: TruthSource,
    ) -> Result<Option<ValidationTruth>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {TRUTH_COLUMNS} FROM validation_consensus \
             WHERE match_key = $1 AND team_number = $2 AND source = $3"
        ))
        .bind(match_key)
        .bind(team_number)
        .bind(source.as_ref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, match_key, team_number, "Failed to load truth record");
            RepositoryError::from(e)
        })?;

        row.as_ref().map(truth_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_match(&self, match_key: &str) -> Result<Vec<ValidationTruth>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRUTH_COLUMNS} FROM validation_consensus \
             WHERE match_key = $1 ORDER BY team_number ASC, source ASC"
        ))
        .bind(match_key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, match_key, "Failed to load truth records");
            RepositoryError::from(e)
        })?;

        rows.iter().map(truth_from_row).collect()
    }
}
