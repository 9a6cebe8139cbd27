//! Configuration errors

use thiserror::Error;

/// Errors raised while loading, reading or validating settings.
///
/// Messages name the offending key but never its value, since values may be
/// API keys.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required key is absent from every loaded source.
    #[error("Missing configuration key: {0}")]
    KeyNotFound(String),

    /// A source (file, `.env`) could not be read.
    #[error("Could not load configuration source: {0}")]
    LoadError(String),

    /// A source was read but is not valid JSON/TOML/.env.
    #[error("Malformed configuration source: {0}")]
    ParseError(String),

    /// A key is present but holds the wrong kind of value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Settings loaded but break a constraint (URL scheme, thresholds, ...).
    #[error("Invalid settings: {0}")]
    ValidationError(String),

    #[error("Could not encode value: {0}")]
    SerializationError(String),

    #[error("Could not decode settings: {0}")]
    DeserializationError(String),

    /// A single environment variable lookup failed.
    #[error("Environment variable {key}: {source}")]
    EnvError {
        key: String,
        #[source]
        source: std::env::VarError,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
