use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::{CompLevel, MatchModel};
use crate::shared::RepositoryError;

/// Read access to the match schedule and official results
#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn find_by_event_key(&self, event_key: &str) -> Result<Vec<MatchModel>, RepositoryError>;
    async fn find_by_match_key(&self, match_key: &str)
        -> Result<Option<MatchModel>, RepositoryError>;
}

/// In-memory implementation of MatchRepository for development and testing
#[derive(Debug, Default)]
pub struct InMemoryMatchRepository {
    matches: RwLock<HashMap<String, MatchModel>>,
}

impl InMemoryMatchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-populated with matches, keyed by match key
    pub fn with_matches(matches: Vec<MatchModel>) -> Self {
        let map = matches
            .into_iter()
            .map(|m| (m.match_key.clone(), m))
            .collect();
        Self {
            matches: RwLock::new(map),
        }
    }

    /// Inserts or replaces a match
    pub async fn upsert(&self, model: MatchModel) {
        self.matches
            .write()
            .await
            .insert(model.match_key.clone(), model);
    }
}

#[async_trait]
impl MatchRepository for InMemoryMatchRepository {
    #[instrument(skip(self))]
    async fn find_by_event_key(&self, event_key: &str) -> Result<Vec<MatchModel>, RepositoryError> {
        let matches = self.matches.read().await;
        let mut found: Vec<MatchModel> = matches
            .values()
            .filter(|m| m.event_key == event_key)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.canonical_cmp(b));

        debug!(event_key, count = found.len(), "Loaded matches from memory");
        Ok(found)
    }

    #[instrument(skip(self))]
    async fn find_by_match_key(
        &self,
        match_key: &str,
    ) -> Result<Option<MatchModel>, RepositoryError> {
        Ok(self.matches.read().await.get(match_key).cloned())
    }
}

/// PostgreSQL implementation of match repository
pub struct PostgresMatchRepository {
    pool: PgPool,
}

impl PostgresMatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const MATCH_COLUMNS: &str = "event_key, match_key, comp_level, set_number, match_number, \
     red_1, red_2, red_3, blue_1, blue_2, blue_3, red_score, blue_score, score_breakdown";

fn match_from_row(row: &PgRow) -> Result<MatchModel, RepositoryError> {
    let comp_level: String = row.try_get("comp_level")?;
    let comp_level = comp_level
        .parse::<CompLevel>()
        .map_err(|e| RepositoryError::Database(format!("invalid comp_level {comp_level}: {e}")))?;

    Ok(MatchModel {
        event_key: row.try_get("event_key")?,
        match_key: row.try_get("match_key")?,
        comp_level,
        set_number: row.try_get("set_number")?,
        match_number: row.try_get("match_number")?,
        red_1: row.try_get("red_1")?,
        red_2: row.try_get("red_2")?,
        red_3: row.try_get("red_3")?,
        blue_1: row.try_get("blue_1")?,
        blue_2: row.try_get("blue_2")?,
        blue_3: row.try_get("blue_3")?,
        red_score: row.try_get("red_score")?,
        blue_score: row.try_get("blue_score")?,
        score_breakdown: row.try_get("score_breakdown")?,
    })
}

#[async_trait]
impl MatchRepository for PostgresMatchRepository {
    #[instrument(skip(self))]
    async fn find_by_event_key(&self, event_key: &str) -> Result<Vec<MatchModel>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches WHERE event_key = $1"
        ))
        .bind(event_key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, event_key, "Failed to load matches for event");
            RepositoryError::from(e)
        })?;

        let mut matches = rows
            .iter()
            .map(match_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        matches.sort_by(|a, b| a.canonical_cmp(b));

        debug!(event_key, count = matches.len(), "Loaded matches from database");
        Ok(matches)
    }

    #[instrument(skip(self))]
    async fn find_by_match_key(
        &self,
        match_key: &str,
    ) -> Result<Option<MatchModel>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches WHERE match_key = $1"
        ))
        .bind(match_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, match_key, "Failed to load match");
            RepositoryError::from(e)
        })?;

        row.as_ref().map(match_from_row).transpose()
    }
}
