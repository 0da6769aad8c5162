//! Configuration management for the server.

use std::env;
use tether_engine::MergeSchema;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Upper bound on pooled database connections
    pub max_connections: u32,
    /// Optional MergeSchema JSON file used to validate incoming documents
    pub schema_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::InvalidMaxConnections)?;

        let schema_path = env::var("SCHEMA_PATH").ok().filter(|p| !p.is_empty());

        Ok(Self {
            host,
            port,
            database_url,
            max_connections,
            schema_path,
        })
    }

    /// Load the configured schema. Without one, every field overrides.
    pub fn load_schema(&self) -> Result<MergeSchema, ConfigError> {
        let Some(path) = &self.schema_path else {
            return Ok(MergeSchema::new());
        };

        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Schema(format!("{}: {}", path, e)))?;
        MergeSchema::from_json(&raw).map_err(|e| ConfigError::Schema(format!("{}: {}", path, e)))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid DATABASE_MAX_CONNECTIONS value")]
    InvalidMaxConnections,

    #[error("Invalid schema: {0}")]
    Schema(String),
}
