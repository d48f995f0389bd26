pub mod calculator;
pub mod models;
pub mod repository;

pub use calculator::{EloCalculation, EloCalculator, EloSettings};
pub use models::{EloHistoryEntry, EloUpdateSummary, LeaderboardEntry, ScouterRating, UpdateRatingParams};
pub use repository::{InMemoryScouterEloRepository, PostgresScouterEloRepository, ScouterEloRepository};
