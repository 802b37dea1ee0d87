// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HotrunnerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing configuration key: {0}")]
    MissingKey(String),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Unknown watcher type: {0}")]
    UnknownWatcherType(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("File watch error: {0}")]
    NotifyError(#[from] notify::Error),

    #[error("Glob pattern error: {0}")]
    GlobError(#[from] globset::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, HotrunnerError>;

/// Turn a `MissingKey` lookup failure into `Ok(None)`.
///
/// Every other error (wrong type, malformed duration, ...) is still
/// propagated, so optional keys are lenient about absence only.
pub trait MissingKeyExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> MissingKeyExt<T> for Result<T> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(HotrunnerError::MissingKey(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
