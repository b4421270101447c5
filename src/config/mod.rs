//! Configuration management for database and application settings

/// Database configuration and connection management
pub mod database;

/// Scoring and model tuning loaded from config.toml
pub mod tuning;

use crate::errors::Result;
use tracing::info;

/// Application configuration assembled at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database connection string
    pub database_url: String,
    /// Subsystem tuning
    pub tuning: tuning::Tuning,
}

/// Loads the full application configuration: database URL from the
/// environment, tuning from ./config.toml (defaults when absent).
///
/// # Errors
/// Returns an error if config.toml exists but cannot be parsed.
pub fn load_app_configuration() -> Result<AppConfig> {
    let database_url = database::get_database_url();
    let tuning = tuning::load_default_tuning()?;
    info!("Configuration loaded (database: {database_url})");

    Ok(AppConfig {
        database_url,
        tuning,
    })
}
