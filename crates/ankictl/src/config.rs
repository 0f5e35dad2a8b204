//! Account configuration file.
//!
//! ```toml
//! email = "me@example.com"
//! password = "hunter2"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("unable to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or lacks a key.
    #[error("unable to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A required key is present but empty.
    #[error("{} is missing a value for `{key}`", .path.display())]
    Missing { path: PathBuf, key: &'static str },
}

/// AnkiWeb account credentials.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub email: String,
    pub password: String,
}

impl Config {
    /// Load and validate the config at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        for (key, value) in [("email", &config.email), ("password", &config.password)] {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing {
                    path: path.to_path_buf(),
                    key,
                });
            }
        }

        Ok(config)
    }
}
