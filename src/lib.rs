// Library crate for the scouter validation service
// This file exposes the public API for the binary and integration tests

pub mod config;
pub mod consolidation;
pub mod elo;
pub mod matches;
pub mod routes;
pub mod scouting;
pub mod shared;
pub mod statistics;
pub mod validation;

// Re-export commonly used types for easier access in tests
pub use config::AppConfig;
pub use elo::{EloCalculator, EloSettings};
pub use shared::{AppError, AppState, Repositories, RepositoryError};
pub use statistics::{StatisticsError, StatisticsService};
pub use validation::{
    ScouterValidationService, StrategyRegistry, ValidationError, ValidationSettings,
};
