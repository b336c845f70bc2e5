//! FieldVault Custody Core
//!
//! Custodial account ledger with hold-backed voucher payouts for field
//! agents and merchants.
//!
//! # Architecture
//!
//! - **Append-only entries**: balances derive from an immutable per-account log
//! - **Single writer**: one writer task serializes every mutation
//! - **Durable acks**: a response is sent only after the RocksDB commit
//! - **Idempotent money ops**: batch issuance and redemption replay by caller key
//!
//! # Invariants
//!
//! - Every balance change has an entry; folding the log reproduces the balance
//! - Available funds never go negative: spends check balance minus active holds
//! - A voucher's value is reserved under a hold from issuance until settlement
//! - Voucher settlement is exactly-once per code, replays return the stored result

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod actor;
pub mod codes;
pub mod config;
pub mod custody;
pub mod error;
pub mod holds;
pub mod ledger;
pub mod metrics;
pub mod redeem;
pub mod storage;
pub mod transfer;
pub mod types;
pub mod voucher;

// Re-exports
pub use actor::ExpiryReport;
pub use config::Config;
pub use custody::Custody;
pub use error::{Error, Result};
pub use storage::Storage;
pub use types::{
    Account, AccountStatus, Eligibility, Hold, HoldStatus, LedgerEntry, OwnerKind, OwnerRef,
    Redemption, Voucher, VoucherBatch, VoucherStatus,
};
