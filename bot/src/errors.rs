//! Error types for deploybot

use thiserror::Error;

/// Main error type for deploybot
#[derive(Error, Debug)]
pub enum BotError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Manifest error: {0}")]
    ManifestError(String),

    #[error("Payload error: {0}")]
    PayloadError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    /// One-line summary safe to post into a conversation. Response bodies
    /// and transport details stay in the logs.
    pub fn redacted(&self) -> String {
        match self {
            BotError::Upstream { service, status, .. } => {
                format!("{} request failed with status {}", service, status)
            }
            BotError::HttpError(e) => match e.status() {
                Some(status) => format!("upstream request failed with status {}", status.as_u16()),
                None if e.is_timeout() => "upstream request timed out".to_string(),
                None => "upstream request could not be completed".to_string(),
            },
            BotError::Conflict(_) => "the manifest was changed concurrently".to_string(),
            BotError::ManifestError(msg) | BotError::PayloadError(msg) | BotError::NotFound(msg) => {
                msg.clone()
            }
            BotError::JsonError(_) => "unexpected response format".to_string(),
            BotError::YamlError(_) => "manifest could not be parsed".to_string(),
            _ => "internal error".to_string(),
        }
    }

    /// Whether the error is a 404 from an upstream service
    pub fn is_not_found(&self) -> bool {
        matches!(self, BotError::Upstream { status: 404, .. } | BotError::NotFound(_))
    }
}

impl From<anyhow::Error> for BotError {
    fn from(err: anyhow::Error) -> Self {
        BotError::Internal(err.to_string())
    }
}
