//! Error handling for the hostlink CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Hostlink error: {0}")]
    Hostlink(#[from] hostlink_core::HostlinkError),

    #[error("Decode error: {0}")]
    Decode(#[from] hostlink_core::DecodeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Replay failed: {0}")]
    Replay(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Config(format!("{err:#}"))
    }
}
