//! Errors raised while loading, validating or saving the driver configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read configuration file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file '{path}' is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Cannot encode configuration: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Cannot write configuration file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A setting is outside the range the mount or driver accepts.
    #[error("Setting '{key}' {message}")]
    Invalid { key: String, message: String },

    /// An `LX90_MOUNT_*` override could not be parsed.
    #[error("Environment override {var}: {message}")]
    EnvOverride { var: String, message: String },

    #[error("Configuration was not loaded from a file; use save_to")]
    NoPath,
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn env_override(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EnvOverride {
            var: var.into(),
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
