//! Configuration for the custody core

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Custody core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Voucher configuration
    pub voucher: VoucherConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/custody"),
            service_name: "custody-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            rocksdb: RocksDBConfig::default(),
            voucher: VoucherConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Target file size (MB)
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Level 0 file num compaction trigger
    pub level0_file_num_compaction_trigger: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,       // 64 MB
            max_write_buffer_number: 4,
            target_file_size_mb: 64,        // 64 MB
            max_background_jobs: 4,
            level0_file_num_compaction_trigger: 4,
            enable_statistics: false,
        }
    }
}

/// Voucher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherConfig {
    /// Secret keying the code checksum MAC
    ///
    /// Must be set before vouchers can be issued or redeemed. Rotating it
    /// invalidates the checksum of every outstanding code.
    pub code_secret: String,

    /// Maximum vouchers per batch
    pub max_batch_count: u32,

    /// Attempts at drawing a fresh random code before giving up on a
    /// collision streak
    pub code_retry_limit: u32,
}

impl Default for VoucherConfig {
    fn default() -> Self {
        Self {
            code_secret: String::new(),
            max_batch_count: 1_000,
            code_retry_limit: 32,
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

        if let Ok(data_dir) = std::env::var("CUSTODY_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(secret) = std::env::var("CUSTODY_CODE_SECRET") {
            config.voucher.code_secret = secret;
        }

        Ok(config)
    }

    /// Check that the configuration is usable for voucher operations
    pub fn validate(&self) -> crate::Result<()> {
        if self.voucher.code_secret.is_empty() {
            return Err(crate::Error::Config(
                "voucher.code_secret must be set".to_string(),
            ));
        }
        if self.voucher.max_batch_count == 0 {
            return Err(crate::Error::Config(
                "voucher.max_batch_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
