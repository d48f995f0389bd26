pub mod models;
pub mod repository;

pub use models::ScoutingObservation;
pub use repository::{InMemoryScoutingRepository, PostgresScoutingRepository, ScoutingRepository};
