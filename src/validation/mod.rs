pub mod comparison;
pub mod handlers;
pub mod repository;
pub mod service;
pub mod strategies;

mod errors;
pub mod models;

pub use comparison::{ComparisonSettings, ObservationComparison};
pub use errors::ValidationError;
pub use models::*;
pub use repository::{
    InMemoryValidationConsensusRepository, InMemoryValidationResultRepository,
    PostgresValidationConsensusRepository, PostgresValidationResultRepository,
    ValidationConsensusRepository, ValidationResultRepository,
};
pub use service::ScouterValidationService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Run-wide tuning for the validation service and its strategies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// Observations needed before a consensus is trusted
    pub min_scouts_required: usize,
    /// Matches per processing batch; only affects logging granularity
    pub batch_size: usize,
    pub comparison: ComparisonSettings,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            min_scouts_required: 3,
            batch_size: 10,
            comparison: ComparisonSettings::default(),
        }
    }
}

/// A source of truth that scouts' observations can be judged against.
///
/// `can_validate` must not fail: a strategy that cannot reach its ground truth
/// answers `false`. `validate` returns one result per scout it could judge,
/// which may be none.
#[async_trait]
pub trait ValidationStrategy: Send + Sync {
    fn strategy_type(&self) -> ValidationStrategyType;

    async fn can_validate(&self, context: &ValidationContext) -> bool;

    async fn validate(
        &self,
        context: &ValidationContext,
    ) -> Result<Vec<ValidationResult>, ValidationError>;

    /// Stores whatever `validate` staged for the team, once every strategy
    /// for that team has succeeded
    async fn commit(&self, _context: &ValidationContext) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Drops whatever `validate` staged for a team whose results are discarded
    async fn discard(&self, _context: &ValidationContext) {}
}

/// Strategies keyed by type, iterated in type order
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<ValidationStrategyType, Arc<dyn ValidationStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a strategy under its own type, replacing any previous one
    pub fn with_strategy(mut self, strategy: Arc<dyn ValidationStrategy>) -> Self {
        self.strategies.insert(strategy.strategy_type(), strategy);
        self
    }

    pub fn types(&self) -> Vec<ValidationStrategyType> {
        self.strategies.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Registered strategies in type order, optionally restricted to `filter`
    pub fn select(
        &self,
        filter: Option<&[ValidationStrategyType]>,
    ) -> Vec<Arc<dyn ValidationStrategy>> {
        self.strategies
            .iter()
            .filter(|(strategy_type, _)| filter.map_or(true, |wanted| wanted.contains(strategy_type)))
            .map(|(_, strategy)| Arc::clone(strategy))
            .collect()
    }
}
