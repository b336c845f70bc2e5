//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the custody core.
//! Collectors live on an instance-local registry so several stores can
//! coexist in one process.
//!
//! # Metrics
//!
//! - `custody_entries_total` - Total ledger entries written
//! - `custody_holds_reserved_total` - Total holds placed
//! - `custody_vouchers_issued_total` - Total vouchers issued
//! - `custody_vouchers_redeemed_total` - Total vouchers redeemed
//! - `custody_vouchers_expired_total` - Total vouchers expired
//! - `custody_commit_duration_seconds` - Histogram of mutation commit latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Total ledger entries written
    pub entries_total: IntCounter,

    /// Total holds placed
    pub holds_reserved_total: IntCounter,

    /// Total vouchers issued
    pub vouchers_issued_total: IntCounter,

    /// Total vouchers redeemed
    pub vouchers_redeemed_total: IntCounter,

    /// Total vouchers expired
    pub vouchers_expired_total: IntCounter,

    /// Commit latency histogram
    pub commit_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let entries_total = IntCounter::with_opts(Opts::new(
            "custody_entries_total",
            "Total ledger entries written",
        ))?;
        registry.register(Box::new(entries_total.clone()))?;

        let holds_reserved_total = IntCounter::with_opts(Opts::new(
            "custody_holds_reserved_total",
            "Total holds placed",
        ))?;
        registry.register(Box::new(holds_reserved_total.clone()))?;

        let vouchers_issued_total = IntCounter::with_opts(Opts::new(
            "custody_vouchers_issued_total",
            "Total vouchers issued",
        ))?;
        registry.register(Box::new(vouchers_issued_total.clone()))?;

        let vouchers_redeemed_total = IntCounter::with_opts(Opts::new(
            "custody_vouchers_redeemed_total",
            "Total vouchers redeemed",
        ))?;
        registry.register(Box::new(vouchers_redeemed_total.clone()))?;

        let vouchers_expired_total = IntCounter::with_opts(Opts::new(
            "custody_vouchers_expired_total",
            "Total vouchers expired",
        ))?;
        registry.register(Box::new(vouchers_expired_total.clone()))?;

        let commit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "custody_commit_duration_seconds",
                "Histogram of mutation commit latencies",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250,
            ]),
        )?;
        registry.register(Box::new(commit_duration.clone()))?;

        Ok(Self {
            entries_total,
            holds_reserved_total,
            vouchers_issued_total,
            vouchers_redeemed_total,
            vouchers_expired_total,
            commit_duration,
            registry,
        })
    }

    /// Record ledger entries written
    pub fn record_entries(&self, count: u64) {
        self.entries_total.inc_by(count);
    }

    /// Record a hold placement
    pub fn record_hold_reserved(&self) {
        self.holds_reserved_total.inc();
    }

    /// Record vouchers issued
    pub fn record_vouchers_issued(&self, count: u64) {
        self.vouchers_issued_total.inc_by(count);
    }

    /// Record a voucher redemption
    pub fn record_voucher_redeemed(&self) {
        self.vouchers_redeemed_total.inc();
    }

    /// Record vouchers expired
    pub fn record_vouchers_expired(&self, count: u64) {
        self.vouchers_expired_total.inc_by(count);
    }

    /// Record a mutation commit latency
    pub fn record_commit_duration(&self, duration_seconds: f64) {
        self.commit_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.entries_total.get(), 0);
        assert_eq!(metrics.vouchers_redeemed_total.get(), 0);
    }

    #[test]
    fn test_instances_do_not_collide() {
        // Each instance registers on its own registry
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();

        a.record_voucher_redeemed();
        assert_eq!(a.vouchers_redeemed_total.get(), 1);
        assert_eq!(b.vouchers_redeemed_total.get(), 0);
    }

    #[test]
    fn test_record_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.record_entries(2);
        metrics.record_entries(3);
        assert_eq!(metrics.entries_total.get(), 5);

        metrics.record_vouchers_issued(10);
        assert_eq!(metrics.vouchers_issued_total.get(), 10);
    }

    #[test]
    fn test_registry_gathers_families() {
        let metrics = Metrics::new().unwrap();
        metrics.record_hold_reserved();
        metrics.record_commit_duration(0.002);

        let families = metrics.registry().gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "custody_holds_reserved_total"));
        assert!(families
            .iter()
            .any(|f| f.get_name() == "custody_commit_duration_seconds"));
    }
}
