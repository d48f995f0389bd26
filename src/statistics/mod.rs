pub mod handlers;
pub mod opr;
pub mod recommendations;
pub mod service;

mod errors;
pub mod models;

pub use errors::StatisticsError;
pub use models::*;
pub use opr::calculate_opr;
pub use recommendations::recommend_alliances;
pub use service::StatisticsService;
