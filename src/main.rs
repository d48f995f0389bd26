use scouter_validation::{
    routes, validation::strategies::default_registry, AppConfig, AppState, EloCalculator,
    Repositories, ScouterValidationService, StatisticsService,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scouter_validation=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting scouter validation service");
    let config = AppConfig::from_env()?;

    let repositories = match &config.database_url {
        Some(database_url) => {
            let pool = sqlx::PgPool::connect(database_url).await?;
            info!("Using PostgreSQL repositories");
            Repositories::postgres(pool)
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory repositories");
            Repositories::in_memory()
        }
    };

    let registry = default_registry(
        repositories.matches.clone(),
        repositories.scouting.clone(),
        repositories.truths.clone(),
        config.validation.comparison,
    );
    let validation_service = ScouterValidationService::new(
        repositories.matches.clone(),
        repositories.elo.clone(),
        repositories.results.clone(),
        repositories.truths.clone(),
        registry,
        EloCalculator::new(config.elo),
        config.validation,
    );
    let statistics_service = StatisticsService::new(repositories.matches.clone());

    let app_state = AppState::new(Arc::new(validation_service), Arc::new(statistics_service));
    let app = routes::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(bind_address = %config.bind_address, "Server running");
    axum::serve(listener, app).await?;
    Ok(())
}
