//! Common error types for larder

use thiserror::Error;

/// Common result type for larder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the data engine and its persistence boundary
#[derive(Error, Debug)]
pub enum Error {
    /// Lookup of an invalid (<= 0) or absent identifier
    #[error("Not found: {table} #{id}")]
    NotFound { table: &'static str, id: i64 },

    /// Mutation refused because it would break a store invariant
    #[error("Illegal operation: {0}")]
    IllegalOperation(String),

    /// Invalid user input (amounts, portions, texts)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Malformed or referentially broken persisted document
    #[error("Load error: {0}")]
    Load(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML decoding error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// True for the failures a user can recover from (missing or unreadable files)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Load(_) | Error::Config(_))
    }
}
