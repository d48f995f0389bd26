use async_trait::async_trait;
use sqlx::{postgres::PgRow, Executor, PgPool, Postgres, Row};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::{EloHistoryEntry, LeaderboardEntry, ScouterRating, UpdateRatingParams};
use crate::shared::RepositoryError;
use crate::validation::{ValidationOutcome, ValidationStrategyType};

/// Persistence for scouter ratings and their history
#[async_trait]
pub trait ScouterEloRepository: Send + Sync {
    /// Returns `None` for a scouter that has never been rated in the season
    async fn get_current_rating(
        &self,
        scouter_id: &str,
        season_year: i32,
    ) -> Result<Option<ScouterRating>, RepositoryError>;

    /// Compare-and-swap write of a single rating change
    async fn update_rating(
        &self,
        params: &UpdateRatingParams,
    ) -> Result<ScouterRating, RepositoryError>;

    async fn create_history_entries(&self, entries: &[EloHistoryEntry])
        -> Result<(), RepositoryError>;

    /// Compare-and-swap rating write together with its history entry; either
    /// both are stored or neither is
    async fn apply_update(
        &self,
        params: &UpdateRatingParams,
        entry: &EloHistoryEntry,
    ) -> Result<ScouterRating, RepositoryError>;

    /// Chronological history; with a limit, the most recent entries
    async fn get_rating_history(
        &self,
        scouter_id: &str,
        season_year: i32,
        limit: Option<usize>,
    ) -> Result<Vec<EloHistoryEntry>, RepositoryError>;

    async fn get_event_leaderboard(
        &self,
        event_key: &str,
        limit: Option<usize>,
    ) -> Result<Vec<LeaderboardEntry>, RepositoryError>;

    async fn get_season_leaderboard(
        &self,
        season_year: i32,
        limit: Option<usize>,
    ) -> Result<Vec<LeaderboardEntry>, RepositoryError>;
}

type RatingKey = (String, i32);

/// In-memory implementation of ScouterEloRepository for development and testing
#[derive(Debug, Default)]
pub struct InMemoryScouterEloRepository {
    ratings: RwLock<HashMap<RatingKey, ScouterRating>>,
    history: RwLock<Vec<EloHistoryEntry>>,
}

impl InMemoryScouterEloRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }
}

fn rank(mut entries: Vec<LeaderboardEntry>, limit: Option<usize>) -> Vec<LeaderboardEntry> {
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    for (idx, entry) in entries.iter_mut().enumerate() {
        entry.rank = idx + 1;
    }
    entries
}

#[async_trait]
impl ScouterEloRepository for InMemoryScouterEloRepository {
    #[instrument(skip(self))]
    async fn get_current_rating(
        &self,
        scouter_id: &str,
        season_year: i32,
    ) -> Result<Option<ScouterRating>, RepositoryError> {
        let ratings = self.ratings.read().await;
        Ok(ratings.get(&(scouter_id.to_string(), season_year)).cloned())
    }

    #[instrument(skip(self, params), fields(scouter_id = %params.scouter_id))]
    async fn update_rating(
        &self,
        params: &UpdateRatingParams,
    ) -> Result<ScouterRating, RepositoryError> {
        let mut ratings = self.ratings.write().await;
        let key = (params.scouter_id.clone(), params.season_year);

        let rating = ratings.entry(key).or_insert_with(|| {
            ScouterRating::initial(&params.scouter_id, params.season_year, params.previous_elo)
        });

        if rating.current_elo != params.previous_elo {
            warn!(
                stored = rating.current_elo,
                expected = params.previous_elo,
                "Stale rating update rejected"
            );
            return Err(RepositoryError::Conflict(format!(
                "rating for {} changed from {} to {}",
                params.scouter_id, params.previous_elo, rating.current_elo
            )));
        }

        rating.apply(params);
        debug!(new_elo = rating.current_elo, "Rating updated in memory");
        Ok(rating.clone())
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn create_history_entries(
        &self,
        entries: &[EloHistoryEntry],
    ) -> Result<(), RepositoryError> {
        self.history.write().await.extend_from_slice(entries);
        Ok(())
    }

    #[instrument(skip(self, params, entry), fields(scouter_id = %params.scouter_id))]
    async fn apply_update(
        &self,
        params: &UpdateRatingParams,
        entry: &EloHistoryEntry,
    ) -> Result<ScouterRating, RepositoryError> {
        // History lock first, matching the leaderboard readers
        let mut history = self.history.write().await;
        let rating = self.update_rating(params).await?;
        history.push(entry.clone());
        Ok(rating)
    }

    #[instrument(skip(self))]
    async fn get_rating_history(
        &self,
        scouter_id: &str,
        season_year: i32,
        limit: Option<usize>,
    ) -> Result<Vec<EloHistoryEntry>, RepositoryError> {
        let history = self.history.read().await;
        let entries: Vec<EloHistoryEntry> = history
            .iter()
            .filter(|e| e.scouter_id == scouter_id && e.season_year == season_year)
            .cloned()
            .collect();

        let skip = limit.map_or(0, |limit| entries.len().saturating_sub(limit));
        Ok(entries.into_iter().skip(skip).collect())
    }

    #[instrument(skip(self))]
    async fn get_event_leaderboard(
        &self,
        event_key: &str,
        limit: Option<usize>,
    ) -> Result<Vec<LeaderboardEntry>, RepositoryError> {
        let history = self.history.read().await;
        let ratings = self.ratings.read().await;

        let mut grouped: HashMap<RatingKey, Vec<&EloHistoryEntry>> = HashMap::new();
        for entry in history.iter().filter(|e| e.event_key == event_key) {
            grouped
                .entry((entry.scouter_id.clone(), entry.season_year))
                .or_default()
                .push(entry);
        }

        let mut entries: Vec<LeaderboardEntry> = grouped
            .into_iter()
            .map(|(key, items)| {
                let current_elo = ratings
                    .get(&key)
                    .map(|r| r.current_elo)
                    .or_else(|| items.last().map(|e| e.elo_after))
                    .unwrap_or_default();
                LeaderboardEntry {
                    rank: 0,
                    scouter_id: key.0,
                    season_year: key.1,
                    current_elo,
                    validations: items.len() as i64,
                    average_accuracy: items.iter().map(|e| e.accuracy_score).sum::<f64>()
                        / items.len() as f64,
                    elo_change: items.iter().map(|e| e.delta as i64).sum(),
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            b.elo_change
                .cmp(&a.elo_change)
                .then(b.current_elo.cmp(&a.current_elo))
                .then_with(|| a.scouter_id.cmp(&b.scouter_id))
        });

        Ok(rank(entries, limit))
    }

    #[instrument(skip(self))]
    async fn get_season_leaderboard(
        &self,
        season_year: i32,
        limit: Option<usize>,
    ) -> Result<Vec<LeaderboardEntry>, RepositoryError> {
        let history = self.history.read().await;
        let ratings = self.ratings.read().await;

        let mut entries: Vec<LeaderboardEntry> = ratings
            .values()
            .filter(|r| r.season_year == season_year)
            .map(|rating| {
                let items: Vec<&EloHistoryEntry> = history
                    .iter()
                    .filter(|e| e.scouter_id == rating.scouter_id && e.season_year == season_year)
                    .collect();
                let average_accuracy = if items.is_empty() {
                    0.0
                } else {
                    items.iter().map(|e| e.accuracy_score).sum::<f64>() / items.len() as f64
                };
                LeaderboardEntry {
                    rank: 0,
                    scouter_id: rating.scouter_id.clone(),
                    season_year,
                    current_elo: rating.current_elo,
                    validations: rating.total_validations as i64,
                    average_accuracy,
                    elo_change: items.iter().map(|e| e.delta as i64).sum(),
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            b.current_elo
                .cmp(&a.current_elo)
                .then(b.validations.cmp(&a.validations))
                .then_with(|| a.scouter_id.cmp(&b.scouter_id))
        });

        Ok(rank(entries, limit))
    }
}

/// PostgreSQL implementation of the scouter rating repository
pub struct PostgresScouterEloRepository {
    pool: PgPool,
}

impl PostgresScouterEloRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RATING_COLUMNS: &str = "scouter_id, season_year, current_elo, peak_elo, lowest_elo, \
     total_validations, successful_validations, failed_validations, updated_at";

const HISTORY_COLUMNS: &str = "id, scouter_id, season_year, execution_id, validation_id, \
     elo_before, elo_after, delta, outcome, accuracy_score, validation_type, event_key, \
     match_key, team_number, created_at";

fn rating_from_row(row: &PgRow) -> Result<ScouterRating, RepositoryError> {
    Ok(ScouterRating {
        scouter_id: row.try_get("scouter_id")?,
        season_year: row.try_get("season_year")?,
        current_elo: row.try_get("current_elo")?,
        peak_elo: row.try_get("peak_elo")?,
        lowest_elo: row.try_get("lowest_elo")?,
        total_validations: row.try_get("total_validations")?,
        successful_validations: row.try_get("successful_validations")?,
        failed_validations: row.try_get("failed_validations")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn history_from_row(row: &PgRow) -> Result<EloHistoryEntry, RepositoryError> {
    let outcome: String = row.try_get("outcome")?;
    let validation_type: String = row.try_get("validation_type")?;

    Ok(EloHistoryEntry {
        id: row.try_get("id")?,
        scouter_id: row.try_get("scouter_id")?,
        season_year: row.try_get("season_year")?,
        execution_id: row.try_get("execution_id")?,
        validation_id: row.try_get("validation_id")?,
        elo_before: row.try_get("elo_before")?,
        elo_after: row.try_get("elo_after")?,
        delta: row.try_get("delta")?,
        outcome: outcome
            .parse::<ValidationOutcome>()
            .map_err(|e| RepositoryError::Database(format!("invalid outcome {outcome}: {e}")))?,
        accuracy_score: row.try_get("accuracy_score")?,
        validation_type: validation_type.parse::<ValidationStrategyType>().map_err(|e| {
            RepositoryError::Database(format!("invalid validation_type {validation_type}: {e}"))
        })?,
        event_key: row.try_get("event_key")?,
        match_key: row.try_get("match_key")?,
        team_number: row.try_get("team_number")?,
        created_at: row.try_get("created_at")?,
    })
}

fn leaderboard_from_row(row: &PgRow) -> Result<LeaderboardEntry, RepositoryError> {
    Ok(LeaderboardEntry {
        rank: 0,
        scouter_id: row.try_get("scouter_id")?,
        season_year: row.try_get("season_year")?,
        current_elo: row.try_get("current_elo")?,
        validations: row.try_get("validations")?,
        average_accuracy: row.try_get("average_accuracy")?,
        elo_change: row.try_get("elo_change")?,
    })
}

fn sql_limit(limit: Option<usize>) -> Option<i64> {
    limit.map(|l| l as i64)
}

/// Conditional upsert; no row comes back when the stored rating moved
async fn upsert_rating<'e, E>(
    executor: E,
    params: &UpdateRatingParams,
) -> Result<Option<PgRow>, RepositoryError>
where
    E: Executor<'e, Database = Postgres>,
{
    let (success, failure) = if params.outcome.is_success() {
        (1, 0)
    } else {
        (0, 1)
    };

    // The WHERE clause on the conflict branch makes the upsert a compare-and-swap
    sqlx::query(&format!(
        "INSERT INTO scouter_elo_ratings ({RATING_COLUMNS}) \
         VALUES ($1, $2, $3, GREATEST($3, $4), LEAST($3, $4), 1, $5, $6, NOW()) \
         ON CONFLICT (scouter_id, season_year) DO UPDATE SET \
            current_elo = EXCLUDED.current_elo, \
            peak_elo = GREATEST(scouter_elo_ratings.peak_elo, EXCLUDED.current_elo), \
            lowest_elo = LEAST(scouter_elo_ratings.lowest_elo, EXCLUDED.current_elo), \
            total_validations = scouter_elo_ratings.total_validations + 1, \
            successful_validations = scouter_elo_ratings.successful_validations + EXCLUDED.successful_validations, \
            failed_validations = scouter_elo_ratings.failed_validations + EXCLUDED.failed_validations, \
            updated_at = NOW() \
         WHERE scouter_elo_ratings.current_elo = $4 \
         RETURNING {RATING_COLUMNS}"
    ))
    .bind(&params.scouter_id)
    .bind(params.season_year)
    .bind(params.new_elo)
    .bind(params.previous_elo)
    .bind(success)
    .bind(failure)
    .fetch_optional(executor)
    .await
    .map_err(|e| {
        warn!(error = %e, "Failed to update scouter rating");
        RepositoryError::from(e)
    })
}

fn checked_rating(
    row: Option<PgRow>,
    params: &UpdateRatingParams,
) -> Result<ScouterRating, RepositoryError> {
    match row {
        Some(row) => rating_from_row(&row),
        None => {
            warn!(expected = params.previous_elo, "Stale rating update rejected");
            Err(RepositoryError::Conflict(format!(
                "rating for {} no longer equals {}",
                params.scouter_id, params.previous_elo
            )))
        }
    }
}

async fn insert_history<'e, E>(executor: E, entry: &EloHistoryEntry) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(&format!(
        "INSERT INTO scouter_elo_history ({HISTORY_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
    ))
    .bind(entry.id)
    .bind(&entry.scouter_id)
    .bind(entry.season_year)
    .bind(entry.execution_id)
    .bind(entry.validation_id)
    .bind(entry.elo_before)
    .bind(entry.elo_after)
    .bind(entry.delta)
    .bind(entry.outcome.as_ref())
    .bind(entry.accuracy_score)
    .bind(entry.validation_type.as_ref())
    .bind(&entry.event_key)
    .bind(&entry.match_key)
    .bind(entry.team_number)
    .bind(entry.created_at)
    .execute(executor)
    .await
    .map_err(|e| {
        warn!(error = %e, "Failed to insert rating history entry");
        RepositoryError::from(e)
    })?;
    Ok(())
}

#[async_trait]
impl ScouterEloRepository for PostgresScouterEloRepository {
    #[instrument(skip(self))]
    async fn get_current_rating(
        &self,
        scouter_id: &str,
        season_year: i32,
    ) -> Result<Option<ScouterRating>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RATING_COLUMNS} FROM scouter_elo_ratings WHERE scouter_id = $1 AND season_year = $2"
        ))
        .bind(scouter_id)
        .bind(season_year)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, scouter_id, "Failed to fetch scouter rating");
            RepositoryError::from(e)
        })?;

        row.as_ref().map(rating_from_row).transpose()
    }

    #[instrument(skip(self, params), fields(scouter_id = %params.scouter_id))]
    async fn update_rating(
        &self,
        params: &UpdateRatingParams,
    ) -> Result<ScouterRating, RepositoryError> {
        let row = upsert_rating(&self.pool, params).await?;
        checked_rating(row, params)
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn create_history_entries(
        &self,
        entries: &[EloHistoryEntry],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            insert_history(&mut *tx, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, params, entry), fields(scouter_id = %params.scouter_id))]
    async fn apply_update(
        &self,
        params: &UpdateRatingParams,
        entry: &EloHistoryEntry,
    ) -> Result<ScouterRating, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // A rejected swap drops the transaction, so no history row is left behind
        let row = upsert_rating(&mut *tx, params).await?;
        let rating = checked_rating(row, params)?;
        insert_history(&mut *tx, entry).await?;

        tx.commit().await?;
        Ok(rating)
    }

    #[instrument(skip(self))]
    async fn get_rating_history(
        &self,
        scouter_id: &str,
        season_year: i32,
        limit: Option<usize>,
    ) -> Result<Vec<EloHistoryEntry>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM ( \
                SELECT {HISTORY_COLUMNS}, seq FROM scouter_elo_history \
                WHERE scouter_id = $1 AND season_year = $2 \
                ORDER BY seq DESC LIMIT $3 \
             ) recent ORDER BY seq ASC"
        ))
        .bind(scouter_id)
        .bind(season_year)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, scouter_id, "Failed to fetch rating history");
            RepositoryError::from(e)
        })?;

        rows.iter().map(history_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn get_event_leaderboard(
        &self,
        event_key: &str,
        limit: Option<usize>,
    ) -> Result<Vec<LeaderboardEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT h.scouter_id, h.season_year, r.current_elo, \
                COUNT(*)::bigint AS validations, \
                AVG(h.accuracy_score)::float8 AS average_accuracy, \
                SUM(h.delta)::bigint AS elo_change \
             FROM scouter_elo_history h \
             JOIN scouter_elo_ratings r \
               ON r.scouter_id = h.scouter_id AND r.season_year = h.season_year \
             WHERE h.event_key = $1 \
             GROUP BY h.scouter_id, h.season_year, r.current_elo \
             ORDER BY elo_change DESC, r.current_elo DESC, h.scouter_id ASC \
             LIMIT $2",
        )
        .bind(event_key)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, event_key, "Failed to fetch event leaderboard");
            RepositoryError::from(e)
        })?;

        let entries = rows
            .iter()
            .map(leaderboard_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rank(entries, None))
    }

    #[instrument(skip(self))]
    async fn get_season_leaderboard(
        &self,
        season_year: i32,
        limit: Option<usize>,
    ) -> Result<Vec<LeaderboardEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT r.scouter_id, r.season_year, r.current_elo, \
                r.total_validations::bigint AS validations, \
                COALESCE(AVG(h.accuracy_score), 0)::float8 AS average_accuracy, \
                COALESCE(SUM(h.delta), 0)::bigint AS elo_change \
             FROM scouter_elo_ratings r \
             LEFT JOIN scouter_elo_history h \
               ON h.scouter_id = r.scouter_id AND h.season_year = r.season_year \
             WHERE r.season_year = $1 \
             GROUP BY r.scouter_id, r.season_year, r.current_elo, r.total_validations \
             ORDER BY r.current_elo DESC, validations DESC, r.scouter_id ASC \
             LIMIT $2",
        )
        .bind(season_year)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, season_year, "Failed to fetch season leaderboard");
            RepositoryError::from(e)
        })?;

        let entries = rows
            .iter()
            .map(leaderboard_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rank(entries, None))
    }
}
