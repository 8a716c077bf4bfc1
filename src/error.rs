//! Error types for Gigscout.

use thiserror::Error;

/// Library-level error type for Gigscout operations.
#[derive(Error, Debug)]
pub enum GigscoutError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("LLM API error: {0}")]
    Llm(String),

    #[error("Page fetch failed: {0}")]
    Fetch(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl GigscoutError {
    /// Whether this error is a rejected request rather than a runtime failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, GigscoutError::Validation(_))
    }
}

/// Result type alias for Gigscout operations.
pub type Result<T> = std::result::Result<T, GigscoutError>;
