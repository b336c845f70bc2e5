//! Error types for the voucher sweep service

use thiserror::Error;

/// Result type for sweep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Sweep errors
#[derive(Error, Debug)]
pub enum Error {
    /// Custody core error
    #[error("Custody error: {0}")]
    Custody(#[from] custody_core::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
