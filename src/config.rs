use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite:trusty_poll.db";
const DEFAULT_IDENTITY_FILE: &str = ".trusty_poll_identity.json";
const DEFAULT_REFRESH_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("POLL_STORE must be \"sqlite\" or \"memory\", got \"{0}\"")]
    UnknownStore(String),
    #[error("POLL_REFRESH_MS must be a positive number of milliseconds, got \"{0}\"")]
    InvalidRefreshInterval(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store: StoreKind,
    pub database_url: String,
    pub identity_file: PathBuf,
    pub refresh_interval: Duration,
}

impl Config {
    /// Reads the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store = match lookup("POLL_STORE").as_deref().map(str::trim) {
            None | Some("sqlite") => StoreKind::Sqlite,
            Some("memory") => StoreKind::Memory,
            Some(other) => return Err(ConfigError::UnknownStore(other.to_string())),
        };

        let refresh_ms = match lookup("POLL_REFRESH_MS") {
            None => DEFAULT_REFRESH_MS,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => return Err(ConfigError::InvalidRefreshInterval(raw)),
            },
        };

        Ok(Self {
            store,
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            identity_file: lookup("POLL_IDENTITY_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IDENTITY_FILE)),
            refresh_interval: Duration::from_millis(refresh_ms),
        })
    }
}
