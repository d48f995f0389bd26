#![allow(dead_code)] // Test utilities may not all be used in every test

use std::sync::Arc;

use scouter_validation::{
    elo::{EloCalculator, EloSettings, InMemoryScouterEloRepository, ScouterEloRepository},
    matches::InMemoryMatchRepository,
    scouting::{InMemoryScoutingRepository, ScoutingRepository},
    validation::{
        strategies::default_registry, InMemoryValidationConsensusRepository,
        InMemoryValidationResultRepository,
    },
    AppState, ScouterValidationService, StatisticsService, ValidationSettings,
};

use super::builders::EventBuilder;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub service: Arc<ScouterValidationService>,
    pub statistics: Arc<StatisticsService>,
    pub elo: Arc<InMemoryScouterEloRepository>,
    pub results: Arc<InMemoryValidationResultRepository>,
    pub truths: Arc<InMemoryValidationConsensusRepository>,
}

impl TestSetup {
    pub fn app_state(&self) -> AppState {
        AppState::new(self.service.clone(), self.statistics.clone())
    }
}

pub struct TestSetupBuilder {
    event: EventBuilder,
    settings: ValidationSettings,
    scouting: Option<Arc<dyn ScoutingRepository>>,
    elo: Option<Arc<dyn ScouterEloRepository>>,
    elo_backing: Option<Arc<InMemoryScouterEloRepository>>,
}

impl TestSetupBuilder {
    pub fn new(event: EventBuilder) -> Self {
        Self {
            event,
            settings: ValidationSettings::default(),
            scouting: None,
            elo: None,
            elo_backing: None,
        }
    }

    pub fn with_min_scouts(mut self, min_scouts_required: usize) -> Self {
        self.settings.min_scouts_required = min_scouts_required;
        self
    }

    /// Replaces the scouting store built from the event's observations
    pub fn with_scouting_repository(mut self, scouting: Arc<dyn ScoutingRepository>) -> Self {
        self.scouting = Some(scouting);
        self
    }

    /// Routes rating writes through `elo`; the setup's `elo` handle must be
    /// the store it wraps for assertions to see its writes
    pub fn with_elo_repository(
        mut self,
        elo: Arc<dyn ScouterEloRepository>,
        backing: Arc<InMemoryScouterEloRepository>,
    ) -> Self {
        self.elo = Some(elo);
        self.elo_backing = Some(backing);
        self
    }

    pub fn build(self) -> TestSetup {
        let (matches, observations) = self.event.build();

        let matches = Arc::new(InMemoryMatchRepository::with_matches(matches));
        let scouting: Arc<dyn ScoutingRepository> = match self.scouting {
            Some(scouting) => scouting,
            None => Arc::new(InMemoryScoutingRepository::with_observations(observations)),
        };
        let elo = self.elo_backing.unwrap_or_default();
        let elo_writer: Arc<dyn ScouterEloRepository> = match self.elo {
            Some(writer) => writer,
            None => elo.clone(),
        };
        let results = Arc::new(InMemoryValidationResultRepository::new());
        let truths = Arc::new(InMemoryValidationConsensusRepository::new());

        let registry = default_registry(
            matches.clone(),
            scouting,
            truths.clone(),
            self.settings.comparison,
        );
        let service = ScouterValidationService::new(
            matches.clone(),
            elo_writer,
            results.clone(),
            truths.clone(),
            registry,
            EloCalculator::new(EloSettings::default()),
            self.settings,
        );

        TestSetup {
            service: Arc::new(service),
            statistics: Arc::new(StatisticsService::new(matches)),
            elo,
            results,
            truths,
        }
    }
}
