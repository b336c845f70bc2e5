//! Periodic expiry sweep over the custody store
//!
//! Redemption closes an overdue voucher lazily when someone presents it, but
//! codes nobody presents again would stay reserved forever. The sweep walks
//! the expiry indices on a fixed cadence and returns that value to the
//! issuers' available funds.
//!
//! Each pass is bounded by `batch_limit`, so a large backlog drains across
//! passes instead of monopolizing the custody writer.

use crate::{config::SweepConfig, Result};
use chrono::Utc;
use custody_core::{Custody, ExpiryReport};
use std::sync::Arc;
use tracing::{info, warn};

/// Periodic sweep worker
pub struct Sweeper {
    custody: Arc<Custody>,
    config: SweepConfig,
}

impl Sweeper {
    /// Create new sweeper
    pub fn new(custody: Arc<Custody>, config: SweepConfig) -> Self {
        Self { custody, config }
    }

    /// Run one bounded pass
    pub async fn sweep_once(&self) -> Result<ExpiryReport> {
        let report = self
            .custody
            .expire_due(Utc::now(), self.config.batch_limit)
            .await?;

        if report.vouchers_expired > 0 || report.holds_released > 0 {
            info!(
                vouchers_expired = report.vouchers_expired,
                holds_released = report.holds_released,
                value_released = %report.value_released,
                "Sweep pass closed overdue reservations"
            );
        }

        Ok(report)
    }

    /// Run passes on the configured cadence until the task is aborted
    pub async fn run(self) {
        info!(
            interval_secs = self.config.interval_secs,
            batch_limit = self.config.batch_limit,
            "Starting voucher sweep loop"
        );

        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(self.config.interval_secs));

        loop {
            interval.tick().await;

            loop {
                match self.sweep_once().await {
                    // A saturated pass means more work is waiting; go again now
                    Ok(report) if report.vouchers_expired >= self.config.batch_limit as u64 => {}
                    Ok(_) => break,
                    Err(e) => {
                        warn!("Sweep pass failed: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use custody_core::{voucher::CreateVouchersParams, Eligibility, OwnerKind, VoucherStatus};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    async fn open_test_custody() -> (Arc<Custody>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = custody_core::Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.voucher.code_secret = "sweep-secret".to_string();

        (Arc::new(Custody::open(config).await.unwrap()), temp_dir)
    }

    #[tokio::test]
    async fn test_sweep_once_on_idle_store() {
        let (custody, _temp) = open_test_custody().await;
        let sweeper = Sweeper::new(custody, SweepConfig::default());

        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.vouchers_expired, 0);
        assert_eq!(report.holds_released, 0);
        assert_eq!(report.value_released, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_sweep_once_closes_overdue_codes() {
        let (custody, _temp) = open_test_custody().await;

        let agent = custody
            .ensure_account(OwnerKind::Agent, Uuid::new_v4())
            .await
            .unwrap();
        custody
            .credit(agent.id, Decimal::from(100), "seed".into(), "tester".into())
            .await
            .unwrap();

        let batch = custody
            .create_vouchers(CreateVouchersParams {
                issuer_account_id: agent.id,
                count: 2,
                amount_each: Decimal::from(40),
                purpose: "payout".to_string(),
                eligibility: Eligibility::Any,
                expires_at: Some(Utc::now() + Duration::milliseconds(200)),
                idempotency_key: "sweep-test".to_string(),
                created_by: "agent-app".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(custody.get_available(agent.id).unwrap(), Decimal::from(20));

        // Let the short-dated batch lapse, then sweep it up
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;

        let sweeper = Sweeper::new(custody.clone(), SweepConfig::default());
        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.vouchers_expired, 2);
        assert_eq!(report.value_released, Decimal::from(80));

        for v in &batch.vouchers {
            assert_eq!(
                custody.get_voucher(v.id).unwrap().status,
                VoucherStatus::Expired
            );
        }
        assert_eq!(custody.get_available(agent.id).unwrap(), Decimal::from(100));

        // The next pass finds nothing left
        let quiet = sweeper.sweep_once().await.unwrap();
        assert_eq!(quiet.vouchers_expired, 0);
    }
}
