use std::str::FromStr;

use thiserror::Error;

use crate::elo::EloSettings;
use crate::validation::ValidationSettings;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {var}: {reason}")]
    InvalidEnvValue { var: String, reason: String },
}

/// Process-wide configuration, read once at startup and passed down explicitly
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    /// Postgres repositories are used when set, in-memory ones otherwise
    pub database_url: Option<String>,
    pub elo: EloSettings,
    pub validation: ValidationSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            database_url: None,
            elo: EloSettings::default(),
            validation: ValidationSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the config from an arbitrary variable source, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let elo = EloSettings {
            k_factor: parse_or("ELO_K_FACTOR", &lookup, defaults.elo.k_factor)?,
            initial_rating: parse_or("ELO_INITIAL_RATING", &lookup, defaults.elo.initial_rating)?,
            rating_floor: parse_or("ELO_RATING_FLOOR", &lookup, defaults.elo.rating_floor)?,
            ..defaults.elo
        };

        if !(elo.k_factor.is_finite() && elo.k_factor > 0.0) {
            return Err(ConfigError::InvalidEnvValue {
                var: "ELO_K_FACTOR".to_string(),
                reason: "must be a positive finite number".to_string(),
            });
        }

        let validation = ValidationSettings {
            min_scouts_required: parse_or(
                "VALIDATION_MIN_SCOUTS",
                &lookup,
                defaults.validation.min_scouts_required,
            )?,
            ..defaults.validation
        };

        Ok(Self {
            bind_address: lookup("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            elo,
            validation,
        })
    }
}

fn parse_or<T, F>(var: &str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvValue {
                var: var.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}
