use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use scouter_validation::{
    elo::{
        EloHistoryEntry, InMemoryScouterEloRepository, LeaderboardEntry, ScouterEloRepository,
        ScouterRating, UpdateRatingParams,
    },
    scouting::{InMemoryScoutingRepository, ScoutingObservation, ScoutingRepository},
    RepositoryError,
};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Serves observations normally, except that every lookup for `failing_team`
/// after the first one fails, like a store dropping out mid-run
pub struct FlakyScoutingRepository {
    inner: InMemoryScoutingRepository,
    failing_team: i32,
    calls: Mutex<HashMap<i32, usize>>,
}

impl FlakyScoutingRepository {
    pub fn new(observations: Vec<ScoutingObservation>, failing_team: i32) -> Self {
        Self {
            inner: InMemoryScoutingRepository::with_observations(observations),
            failing_team,
            calls: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ScoutingRepository for FlakyScoutingRepository {
    async fn find_by_match_and_team(
        &self,
        match_key: &str,
        team_number: i32,
    ) -> Result<Vec<ScoutingObservation>, RepositoryError> {
        let mut calls = self.calls.lock().await;
        let count = calls.entry(team_number).or_insert(0);
        *count += 1;

        if team_number == self.failing_team && *count > 1 {
            return Err(RepositoryError::Database("connection reset by peer".to_string()));
        }
        drop(calls);

        self.inner.find_by_match_and_team(match_key, team_number).await
    }
}

/// Lets another writer bump `contested_scouter`'s rating right before this
/// process writes it, so the compare-and-swap sees a stale value
pub struct InterferingEloRepository {
    pub inner: Arc<InMemoryScouterEloRepository>,
    contested_scouter: String,
    interfered: Mutex<bool>,
}

impl InterferingEloRepository {
    pub fn new(inner: Arc<InMemoryScouterEloRepository>, contested_scouter: &str) -> Self {
        Self {
            inner,
            contested_scouter: contested_scouter.to_string(),
            interfered: Mutex::new(false),
        }
    }
}

#[async_trait]
impl ScouterEloRepository for InterferingEloRepository {
    async fn get_current_rating(
        &self,
        scouter_id: &str,
        season_year: i32,
    ) -> Result<Option<ScouterRating>, RepositoryError> {
        self.inner.get_current_rating(scouter_id, season_year).await
    }

    async fn update_rating(
        &self,
        params: &UpdateRatingParams,
    ) -> Result<ScouterRating, RepositoryError> {
        self.inner.update_rating(params).await
    }

    async fn create_history_entries(
        &self,
        entries: &[EloHistoryEntry],
    ) -> Result<(), RepositoryError> {
        self.inner.create_history_entries(entries).await
    }

    async fn apply_update(
        &self,
        params: &UpdateRatingParams,
        entry: &EloHistoryEntry,
    ) -> Result<ScouterRating, RepositoryError> {
        let mut interfered = self.interfered.lock().await;
        if params.scouter_id == self.contested_scouter && !*interfered {
            *interfered = true;
            let foreign = UpdateRatingParams {
                new_elo: params.previous_elo + 7,
                ..params.clone()
            };
            self.inner.update_rating(&foreign).await?;
        }
        drop(interfered);

        self.inner.apply_update(params, entry).await
    }

    async fn get_rating_history(
        &self,
        scouter_id: &str,
        season_year: i32,
        limit: Option<usize>,
    ) -> Result<Vec<EloHistoryEntry>, RepositoryError> {
        self.inner
            .get_rating_history(scouter_id, season_year, limit)
            .await
    }

    async fn get_event_leaderboard(
        &self,
        event_key: &str,
        limit: Option<usize>,
    ) -> Result<Vec<LeaderboardEntry>, RepositoryError> {
        self.inner.get_event_leaderboard(event_key, limit).await
    }

    async fn get_season_leaderboard(
        &self,
        season_year: i32,
        limit: Option<usize>,
    ) -> Result<Vec<LeaderboardEntry>, RepositoryError> {
        self.inner.get_season_leaderboard(season_year, limit).await
    }
}
