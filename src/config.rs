use std::env;
use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_PATH: &str = ".sqlite3/todo.db";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port number: {0}")]
    InvalidPort(#[from] ParseIntError),
    #[error("Port must be between 1 and 65535")]
    PortOutOfRange,
    #[error("DB_PATH must not be empty")]
    EmptyDbPath,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
}

impl Config {
    /// Reads `PORT` and `DB_PATH`, falling back to defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().trim_start_matches(':').parse::<u16>()?,
            None => DEFAULT_PORT,
        };
        if port == 0 {
            return Err(ConfigError::PortOutOfRange);
        }

        let db_path = lookup("DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        if db_path.trim().is_empty() {
            return Err(ConfigError::EmptyDbPath);
        }

        Ok(Self {
            port,
            db_path: PathBuf::from(db_path),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from(".sqlite3/todo.db"));
    }

    #[test]
    fn reads_overrides() {
        let config =
            Config::from_lookup(lookup(&[("PORT", "9000"), ("DB_PATH", "/tmp/t.db")])).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.db_path, PathBuf::from("/tmp/t.db"));
    }

    #[test]
    fn accepts_colon_prefixed_port() {
        let config = Config::from_lookup(lookup(&[("PORT", ":8081")])).unwrap();
        assert_eq!(config.port, 8081);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("PORT", "http")])),
            Err(ConfigError::InvalidPort(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("PORT", "0")])),
            Err(ConfigError::PortOutOfRange)
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("DB_PATH", " ")])),
            Err(ConfigError::EmptyDbPath)
        ));
    }
}
