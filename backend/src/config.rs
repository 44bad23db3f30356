//! Runtime configuration.
//!
//! Read from the environment (and a `.env` file, if present). CLI flags
//! override these values.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `OCTAGON_DATA_DIR` | `data` |
//! | `OCTAGON_STORE_DIR` | `.octagon/store` |
//! | `OCTAGON_PORT` | `3000` |
//! | `OCTAGON_LOG_ERROR_LIMIT` | `5` |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::store::json_file::DEFAULT_STORE_DIR;
use crate::transform::loader::{LoaderOptions, DEFAULT_ERROR_LOG_LIMIT};

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding `fighters.csv`, `events.csv` and `fightstats.csv`
    pub data_dir: PathBuf,
    pub store_dir: PathBuf,
    pub port: u16,
    /// Row errors logged per extract
    pub error_log_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            port: DEFAULT_PORT,
            error_log_limit: DEFAULT_ERROR_LOG_LIMIT,
        }
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try loading .env file
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load from any variable lookup. Unset or blank variables keep their
    /// default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            data_dir: get("OCTAGON_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            store_dir: get("OCTAGON_STORE_DIR").map(PathBuf::from).unwrap_or(defaults.store_dir),
            port: parse_var("OCTAGON_PORT", get("OCTAGON_PORT"))?.unwrap_or(defaults.port),
            error_log_limit: parse_var("OCTAGON_LOG_ERROR_LIMIT", get("OCTAGON_LOG_ERROR_LIMIT"))?
                .unwrap_or(defaults.error_log_limit),
        })
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = dir.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            error_log_limit: self.error_log_limit,
        }
    }
}

fn parse_var<T: FromStr>(var: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidValue { var, value: v })
        })
        .transpose()
}
