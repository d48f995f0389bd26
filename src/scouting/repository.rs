use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::ScoutingObservation;
use crate::shared::RepositoryError;

/// Read access to submitted scouting observations
#[async_trait]
pub trait ScoutingRepository: Send + Sync {
    /// Observations for one team in one match, oldest submission first
    async fn find_by_match_and_team(
        &self,
        match_key: &str,
        team_number: i32,
    ) -> Result<Vec<ScoutingObservation>, RepositoryError>;
}

/// In-memory implementation of ScoutingRepository for development and testing
#[derive(Debug, Default)]
pub struct InMemoryScoutingRepository {
    observations: RwLock<Vec<ScoutingObservation>>,
}

impl InMemoryScoutingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observations(observations: Vec<ScoutingObservation>) -> Self {
        Self {
            observations: RwLock::new(observations),
        }
    }

    pub async fn insert(&self, observation: ScoutingObservation) {
        self.observations.write().await.push(observation);
    }
}

#[async_trait]
impl ScoutingRepository for InMemoryScoutingRepository {
    #[instrument(skip(self))]
    async fn find_by_match_and_team(
        &self,
        match_key: &str,
        team_number: i32,
    ) -> Result<Vec<ScoutingObservation>, RepositoryError> {
        let observations = self.observations.read().await;
        let mut found: Vec<ScoutingObservation> = observations
            .iter()
            .filter(|o| o.match_key == match_key && o.team_number == team_number)
            .cloned()
            .collect();
        found.sort_by_key(|o| o.submitted_at);

        debug!(count = found.len(), "Loaded observations from memory");
        Ok(found)
    }
}

/// PostgreSQL implementation of the scouting observation repository
pub struct PostgresScoutingRepository {
    pool: PgPool,
}

impl PostgresScoutingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn observation_from_row(row: &PgRow) -> Result<ScoutingObservation, RepositoryError> {
    Ok(ScoutingObservation {
        id: row.try_get("id")?,
        scouter_id: row.try_get("scouter_id")?,
        event_key: row.try_get("event_key")?,
        match_key: row.try_get("match_key")?,
        team_number: row.try_get("team_number")?,
        season_year: row.try_get("season_year")?,
        performance: row.try_get("performance")?,
        submitted_at: row.try_get("submitted_at")?,
    })
}

#[async_trait]
impl ScoutingRepository for PostgresScoutingRepository {
    #[instrument(skip(self))]
    async fn find_by_match_and_team(
        &self,
        match_key: &str,
        team_number: i32,
    ) -> Result<Vec<ScoutingObservation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, scouter_id, event_key, match_key, team_number, season_year, \
                performance, submitted_at \
             FROM match_scouting \
             WHERE match_key = $1 AND team_number = $2 \
             ORDER BY submitted_at ASC",
        )
        .bind(match_key)
        .bind(team_number)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, match_key, team_number, "Failed to load observations");
            RepositoryError::from(e)
        })?;

        rows.iter().map(observation_from_row).collect()
    }
}
