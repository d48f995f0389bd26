pub mod models;
pub mod repository;

pub use models::{season_from_event_key, Alliance, CompLevel, MatchModel};
pub use repository::{InMemoryMatchRepository, MatchRepository, PostgresMatchRepository};
