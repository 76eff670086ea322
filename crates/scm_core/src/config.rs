//! Host-supplied runtime configuration.
//!
//! # Responsibility
//! - Parse the JSON settings block a host hands to the core.
//! - Normalize and check settings before anything is opened.
//!
//! # Invariants
//! - Missing keys fall back to [`CoreConfig::default`].
//! - `log_dir`, when set, is absolute.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::logging::{self, LoggingError};
use crate::search::query::PipeGuard;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Core settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub log_level: String,
    /// Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    /// In-memory database when unset.
    pub db_path: Option<PathBuf>,
    pub pipe_guard: PipeGuard,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: logging::default_log_level().to_string(),
            log_dir: None,
            db_path: None,
            pipe_guard: PipeGuard::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Logging(LoggingError),
    Db(DbError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Logging(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<LoggingError> for ConfigError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<DbError> for ConfigError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl CoreConfig {
    /// Parses and validates a JSON settings object.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()
    }

    /// Returns a copy with the level normalized; rejects bad levels and
    /// relative log directories.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.log_level = logging::normalize_level(&self.log_level)?.to_string();
        if let Some(dir) = &self.log_dir {
            logging::normalize_log_dir(&dir.to_string_lossy())?;
        }
        Ok(self)
    }

    /// Starts file logging when `log_dir` is set.
    pub fn init_logging(&self) -> Result<bool, ConfigError> {
        let Some(dir) = &self.log_dir else {
            return Ok(false);
        };
        logging::init_logging(&self.log_level, &dir.to_string_lossy())?;
        Ok(true)
    }

    /// Opens the configured database with migrations applied.
    pub fn open_database(&self) -> Result<Connection, ConfigError> {
        let conn = match &self.db_path {
            Some(path) => open_db(path)?,
            None => open_db_in_memory()?,
        };
        Ok(conn)
    }
}
