//! Configuration for the voucher sweep service

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sweep service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Custody data directory
    pub custody_data_dir: PathBuf,

    /// Secret keying the voucher code checksum MAC
    ///
    /// Must match the secret the issuing service runs with.
    pub code_secret: String,

    /// Sweep cadence configuration
    pub sweep: SweepConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "voucher-sweep".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            custody_data_dir: PathBuf::from("./data/custody"),
            code_secret: String::new(),
            sweep: SweepConfig::default(),
        }
    }
}

/// Sweep cadence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between passes
    pub interval_secs: u64,

    /// Most vouchers (and overdue holds) closed in one pass
    ///
    /// Bounds the writer time one pass can consume; a backlog larger than
    /// this drains across consecutive passes.
    pub batch_limit: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300, // 5 minutes
            batch_limit: 500,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(dir) = std::env::var("SWEEP_CUSTODY_DIR") {
            config.custody_data_dir = PathBuf::from(dir);
        }

        if let Ok(secret) = std::env::var("CUSTODY_CODE_SECRET") {
            config.code_secret = secret;
        }

        if let Ok(interval) = std::env::var("SWEEP_INTERVAL_SECS") {
            config.sweep.interval_secs = interval.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid SWEEP_INTERVAL_SECS: {}", e))
            })?;
        }

        if let Ok(limit) = std::env::var("SWEEP_BATCH_LIMIT") {
            config.sweep.batch_limit = limit
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid SWEEP_BATCH_LIMIT: {}", e)))?;
        }

        Ok(config)
    }

    /// Custody core configuration for the store this service sweeps
    pub fn custody_config(&self) -> custody_core::Config {
        let mut config = custody_core::Config::default();
        config.data_dir = self.custody_data_dir.clone();
        config.voucher.code_secret = self.code_secret.clone();
        config
    }
}
