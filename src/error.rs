//! Custom error types for awesome-index

use thiserror::Error;

/// Main error type for awesome-index operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Section not found: {0}")]
    SectionNotFound(String),

    #[error("Invalid repository: {0}")]
    InvalidRepository(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Timed out: {0}")]
    Timeout(String),
}

impl Error {
    /// True when the upstream reported the resource as absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Errors caused by malformed caller input rather than by a collaborator
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Error::InvalidRepository(_))
    }
}

/// Result type alias for awesome-index
pub type Result<T> = std::result::Result<T, Error>;
