pub mod builders;
pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
pub use builders::EventBuilder;
#[allow(unused_imports)]
pub use mocks::{FlakyScoutingRepository, InterferingEloRepository};
pub use setup::{TestSetup, TestSetupBuilder};
