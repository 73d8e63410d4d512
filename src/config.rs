use std::env;
use std::path::PathBuf;

use directories::ProjectDirs;
use thiserror::Error;

/// Environment variable that names the SQLite database.
pub const DATABASE_VAR: &str = "RIMS_DATABASE";
/// Optional override for the log directory.
pub const LOG_DIR_VAR: &str = "RIMS_LOG_DIR";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("RIMS_DATABASE is not set; point it at the SQLite file to use (for example RIMS_DATABASE=inventory.sqlite).")]
    MissingDatabase,
    #[error("could not locate a data directory for log files; set RIMS_LOG_DIR")]
    NoDataDirectory,
}

/// Runtime settings resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is normal; only the variables matter.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve settings through an arbitrary lookup so parsing stays testable
    /// without touching the real environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database = lookup(DATABASE_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingDatabase)?;
        let database_path = PathBuf::from(strip_scheme(&database));

        let log_dir = match lookup(LOG_DIR_VAR).filter(|value| !value.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir.trim()),
            None => default_log_dir()?,
        };

        Ok(Self {
            database_path,
            log_dir,
        })
    }
}

/// Accept connection-string style values such as `sqlite://inventory.db`.
fn strip_scheme(location: &str) -> &str {
    location
        .strip_prefix("sqlite://")
        .or_else(|| location.strip_prefix("sqlite:"))
        .unwrap_or(location)
}

fn default_log_dir() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from("", "", "rims")
        .map(|dirs| dirs.data_local_dir().join("logs"))
        .ok_or(ConfigError::NoDataDirectory)
}
