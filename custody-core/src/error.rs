//! Error types for the custody core

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for custody operations
pub type Result<T> = std::result::Result<T, Error>;

/// Custody errors
#[derive(Error, Debug)]
pub enum Error {
    /// Amount is zero, negative, or otherwise unusable
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Available balance cannot cover the requested amount
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        /// Amount the caller asked to move or reserve
        requested: Decimal,
        /// Spendable headroom at the time of the check
        available: Decimal,
    },

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Hold not found
    #[error("Hold not found: {0}")]
    HoldNotFound(String),

    /// Voucher not found
    #[error("Voucher not found: {0}")]
    VoucherNotFound(String),

    /// Operation is illegal for the row's current status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Voucher checksum does not match the code
    #[error("Checksum mismatch for code {0}")]
    ChecksumMismatch(String),

    /// Voucher is past its expiry
    #[error("Voucher expired: {0}")]
    Expired(String),

    /// Redeemer does not satisfy the voucher's eligibility restriction
    #[error("Not eligible: {0}")]
    NotEligible(String),

    /// Malformed limits payload or account configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
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
