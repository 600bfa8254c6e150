use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiftError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("robots.txt disallows {url} for user-agent {user_agent}")]
    PermissionDenied { url: String, user_agent: String },

    #[error("Circuit open for {source_id}, retry in {retry_in:?}")]
    CircuitOpen { source_id: String, retry_in: Duration },

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Browser error: {0}")]
    Driver(String),

    #[error("Invalid article: {0}")]
    InvalidArticle(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Daemon error: {0}")]
    Daemon(String),
}

impl RiftError {
    /// Whether a circuit breaker should count this error against the source.
    pub fn counts_as_source_failure(&self) -> bool {
        match self {
            RiftError::Http(_)
            | RiftError::HttpStatus { .. }
            | RiftError::Timeout { .. }
            | RiftError::FeedParse(_)
            | RiftError::Json(_)
            | RiftError::Driver(_) => true,
            RiftError::PermissionDenied { .. }
            | RiftError::CircuitOpen { .. }
            | RiftError::InvalidArticle(_)
            | RiftError::InvalidUrl(_)
            | RiftError::Database(_)
            | RiftError::Io(_)
            | RiftError::UnknownSource(_)
            | RiftError::Config(_)
            | RiftError::Daemon(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RiftError::HttpStatus { status, .. } => Some(*status),
            RiftError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RiftError>;
