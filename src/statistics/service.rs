use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::opr::calculate_opr;
use super::{OprMetrics, StatisticsError};
use crate::matches::MatchRepository;

/// Event ratings, computed on first request and cached until recalculated
pub struct StatisticsService {
    matches: Arc<dyn MatchRepository>,
    cache: RwLock<HashMap<String, OprMetrics>>,
}

impl StatisticsService {
    pub fn new(matches: Arc<dyn MatchRepository>) -> Self {
        Self {
            matches,
            cache: RwLock::new(HashMap::new()),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_event_metrics(&self, event_key: &str) -> Result<OprMetrics, StatisticsError> {
        if let Some(cached) = self.cache.read().await.get(event_key) {
            debug!("Serving cached event metrics");
            return Ok(cached.clone());
        }

        self.compute(event_key).await
    }

    /// Drops the cached entry and computes fresh metrics
    #[instrument(skip(self))]
    pub async fn recalculate(&self, event_key: &str) -> Result<OprMetrics, StatisticsError> {
        self.clear_cache(event_key).await;
        self.compute(event_key).await
    }

    /// Returns whether an entry was cached
    pub async fn clear_cache(&self, event_key: &str) -> bool {
        self.cache.write().await.remove(event_key).is_some()
    }

    async fn compute(&self, event_key: &str) -> Result<OprMetrics, StatisticsError> {
        let matches = self.matches.find_by_event_key(event_key).await?;
        let metrics = calculate_opr(event_key, &matches)?;

        info!(
            teams = metrics.team_count,
            completed_matches = metrics.completed_matches,
            "Event metrics calculated"
        );
        self.cache
            .write()
            .await
            .insert(event_key.to_string(), metrics.clone());
        Ok(metrics)
    }
}
