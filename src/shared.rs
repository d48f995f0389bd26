use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;

use crate::elo::{InMemoryScouterEloRepository, PostgresScouterEloRepository, ScouterEloRepository};
use crate::matches::{InMemoryMatchRepository, MatchRepository, PostgresMatchRepository};
use crate::scouting::{InMemoryScoutingRepository, PostgresScoutingRepository, ScoutingRepository};
use crate::statistics::{StatisticsError, StatisticsService};
use crate::validation::{
    InMemoryValidationConsensusRepository, InMemoryValidationResultRepository,
    PostgresValidationConsensusRepository, PostgresValidationResultRepository,
    ScouterValidationService, ValidationConsensusRepository, ValidationError,
    ValidationResultRepository,
};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub validation_service: Arc<ScouterValidationService>,
    pub statistics_service: Arc<StatisticsService>,
}

impl AppState {
    pub fn new(
        validation_service: Arc<ScouterValidationService>,
        statistics_service: Arc<StatisticsService>,
    ) -> Self {
        Self {
            validation_service,
            statistics_service,
        }
    }
}

/// Storage backends shared by the services
#[derive(Clone)]
pub struct Repositories {
    pub matches: Arc<dyn MatchRepository>,
    pub scouting: Arc<dyn ScoutingRepository>,
    pub elo: Arc<dyn ScouterEloRepository>,
    pub results: Arc<dyn ValidationResultRepository>,
    pub truths: Arc<dyn ValidationConsensusRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            matches: Arc::new(InMemoryMatchRepository::new()),
            scouting: Arc::new(InMemoryScoutingRepository::new()),
            elo: Arc::new(InMemoryScouterEloRepository::new()),
            results: Arc::new(InMemoryValidationResultRepository::new()),
            truths: Arc::new(InMemoryValidationConsensusRepository::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            matches: Arc::new(PostgresMatchRepository::new(pool.clone())),
            scouting: Arc::new(PostgresScoutingRepository::new(pool.clone())),
            elo: Arc::new(PostgresScouterEloRepository::new(pool.clone())),
            results: Arc::new(PostgresValidationResultRepository::new(pool.clone())),
            truths: Arc::new(PostgresValidationConsensusRepository::new(pool)),
        }
    }
}

/// Errors raised by repository implementations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A conditional write lost against a concurrent writer
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound(err.to_string()),
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Statistics(#[from] StatisticsError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, context) = match &self {
            AppError::Validation(err) => {
                let status = if err.is_not_found() {
                    StatusCode::NOT_FOUND
                } else if matches!(err, ValidationError::InvalidEventKey { .. }) {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, err.code(), err.to_string(), err.context())
            }
            AppError::Statistics(err) => {
                let status = if err.is_insufficient_data() {
                    StatusCode::UNPROCESSABLE_ENTITY
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, err.code(), err.to_string(), err.context())
            }
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                json!({}),
            ),
        };

        let body = Json(json!({
            "error": message,
            "code": code,
            "context": context,
        }));

        (status, body).into_response()
    }
}
