//! Error types shared across the BOPS workspace

use thiserror::Error;

/// Result type alias for BOPS operations
pub type Result<T> = std::result::Result<T, BopsError>;

/// Main error type for BOPS
#[derive(Error, Debug)]
pub enum BopsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
