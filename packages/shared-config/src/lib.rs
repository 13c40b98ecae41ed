//! Shared configuration types for the thermostat services
//!
//! This crate provides the configuration pieces used by both the controller
//! and the client: the deployment [`Environment`], the event namespace and
//! small helpers for reading typed environment variables.

mod error;

pub use error::{ConfigError, ConfigResult};

use std::env;

/// Default logical namespace for thermostat events on a shared connection
pub const DEFAULT_NAMESPACE: &str = "/thermostat";

/// Common configuration shared between the controller and clients
#[derive(Debug, Clone)]
pub struct CommonConfig {
    /// Environment mode (development, staging, production)
    pub environment: Environment,

    /// Logical namespace scoping thermostat events
    pub namespace: String,
}

/// Application environment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        })
    }
}

impl Environment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if this is a development environment
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl CommonConfig {
    /// Load common configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let namespace = get_env_or_default("THERMO_NAMESPACE", DEFAULT_NAMESPACE);
        if !namespace.starts_with('/') {
            return Err(ConfigError::InvalidValue(
                "THERMO_NAMESPACE".to_string(),
                format!("namespace must start with '/', got '{}'", namespace),
            ));
        }

        Ok(Self {
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse()
                .unwrap_or_default(),
            namespace,
        })
    }
}

/// Load a `.env` file from the working directory if one exists
///
/// Returns true when a file was found and applied.
pub fn load_dotenv() -> bool {
    dotenvy::dotenv().is_ok()
}

/// Helper function to get an optional environment variable with a default
pub fn get_env_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Helper function to parse an environment variable into a specific type
pub fn parse_env<T>(name: &str, default: T) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_env_opt(name)?.unwrap_or(default))
}

/// Parse an environment variable that has no default
///
/// Unset and empty variables both yield `None`.
pub fn parse_env_opt<T>(name: &str) -> ConfigResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        _ => Ok(None),
    }
}
