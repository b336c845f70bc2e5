//! Voucher expiry sweep service
//!
//! Companion service to `custody-core`: on a fixed cadence it asks the
//! custody writer to close vouchers and holds whose expiry has passed,
//! returning their reserved value to the issuing accounts.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use voucher_sweep::{Config, Sweeper};
//!
//! #[tokio::main]
//! async fn main() -> voucher_sweep::Result<()> {
//!     let config = Config::from_env()?;
//!     let custody = Arc::new(custody_core::Custody::open(config.custody_config()).await?);
//!
//!     let sweeper = Sweeper::new(custody, config.sweep.clone());
//!     let report = sweeper.sweep_once().await?;
//!     println!("closed {} vouchers", report.vouchers_expired);
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod sweeper;

// Re-exports
pub use config::{Config, SweepConfig};
pub use error::{Error, Result};
pub use sweeper::Sweeper;
