//! Error types for the controller

use thiserror::Error;

/// Controller-wide error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Malformed response: {0}")]
    Parse(String),

    #[error("Failed to change charging limit: {0}")]
    Actuation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Short machine-readable kind, used in the decision journal
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Auth(_) => "auth",
            Error::Network(_) => "network",
            Error::Timeout(_) => "timeout",
            Error::Parse(_) => "parse",
            Error::Actuation(_) => "actuation",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
        }
    }
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;
