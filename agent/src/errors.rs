//! Error types for the netauto agent

use thiserror::Error;

/// Main error type for the netauto agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Device error: {0}")]
    DeviceError(#[from] bigip_client::BigipError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unsupported target kind: {0}")]
    UnsupportedTarget(String),

    #[error("Payload error: {0}")]
    PayloadError(String),

    #[error("Platform error: {0}")]
    PlatformError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Internal(err.to_string())
    }
}
