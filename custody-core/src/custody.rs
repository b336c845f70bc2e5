//! Main custody orchestration layer
//!
//! This module ties together storage, voucher codes, and the writer actor
//! into a high-level API for account, hold, and voucher operations.
//!
//! # Example
//!
//! ```no_run
//! use custody_core::{Config, Custody, OwnerKind};
//! use rust_decimal::Decimal;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> custody_core::Result<()> {
//!     let mut config = Config::default();
//!     config.voucher.code_secret = "change-me".to_string();
//!
//!     let custody = Custody::open(config).await?;
//!
//!     let agent = custody.ensure_account(OwnerKind::Agent, Uuid::new_v4()).await?;
//!     custody
//!         .credit(agent.id, Decimal::from(500), "cash in".into(), "teller-7".into())
//!         .await?;
//!
//!     custody.shutdown().await?;
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_custody_actor, CustodyHandle, ExpiryReport},
    codes::{normalize_code, CodeSigner},
    holds::ReserveParams,
    ledger::{self, AppendParams, LedgerAudit},
    metrics::Metrics,
    redeem::{RedeemOutcome, RedeemParams},
    storage::StorageStats,
    transfer::TransferOutcome,
    types::{
        Account, AccountFilter, AccountLimits, AccountStatus, Hold, LedgerEntry, OwnerKind,
        Redemption, Voucher, VoucherBatch, VoucherFilter,
    },
    voucher::{self, BatchOutcome, BatchPreview, CreateVouchersParams},
    Config, Error, Result, Storage,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Main custody interface
///
/// Mutations flow through the single writer; reads go straight to storage.
pub struct Custody {
    /// Actor handle for mutations
    handle: CustodyHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Metrics collector
    metrics: Arc<Metrics>,

    /// Configuration
    config: Config,
}

impl Custody {
    /// Open custody core with configuration
    ///
    /// Validates the configuration, opens storage, makes sure the treasury
    /// account exists, and spawns the writer task.
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let metrics =
            Arc::new(Metrics::new().map_err(|e| Error::Config(format!("metrics: {}", e)))?);

        let storage = Arc::new(Storage::open(&config)?);

        // Writer is not running yet, so a direct write is safe here
        let treasury =
            ledger::ensure_account(&storage, OwnerKind::System, Uuid::nil(), Utc::now())?;
        tracing::info!(account_id = %treasury.id, "Treasury account ready");

        let handle = spawn_custody_actor(
            storage.clone(),
            CodeSigner::new(&config.voucher.code_secret),
            config.voucher.clone(),
            metrics.clone(),
        );

        Ok(Self {
            handle,
            storage,
            metrics,
            config,
        })
    }

    // ---- Accounts ----

    /// Get or create the account for an owner
    pub async fn ensure_account(&self, kind: OwnerKind, owner_id: Uuid) -> Result<Account> {
        self.handle.ensure_account(kind, owner_id).await
    }

    /// Replace account limits, optionally changing status in the same write
    pub async fn update_limits(
        &self,
        account_id: Uuid,
        limits: AccountLimits,
        status: Option<AccountStatus>,
    ) -> Result<Account> {
        self.handle.update_limits(account_id, limits, status).await
    }

    /// Get account by ID
    pub fn get_account(&self, account_id: Uuid) -> Result<Account> {
        self.storage.get_account(account_id)
    }

    /// Find the account owned by a specific principal
    pub fn find_account_by_owner(
        &self,
        kind: OwnerKind,
        owner_id: Uuid,
    ) -> Result<Option<Account>> {
        self.storage.find_account_by_owner(kind, owner_id)
    }

    /// Get the treasury account
    pub fn treasury_account(&self) -> Result<Account> {
        self.storage
            .find_account_by_owner(OwnerKind::System, Uuid::nil())?
            .ok_or_else(|| Error::AccountNotFound("treasury".to_string()))
    }

    /// List accounts matching a filter
    pub fn list_accounts(&self, filter: &AccountFilter) -> Result<Vec<Account>> {
        self.storage.list_accounts(filter)
    }

    // ---- Ledger ----

    /// Append a raw audit entry
    pub async fn append(&self, params: AppendParams) -> Result<LedgerEntry> {
        self.handle.append(params).await
    }

    /// Credit an account
    pub async fn credit(
        &self,
        account_id: Uuid,
        amount: Decimal,
        reason: String,
        created_by: String,
    ) -> Result<LedgerEntry> {
        self.handle.credit(account_id, amount, reason, created_by).await
    }

    /// Debit an account
    pub async fn debit(
        &self,
        account_id: Uuid,
        amount: Decimal,
        reason: String,
        created_by: String,
    ) -> Result<LedgerEntry> {
        self.handle.debit(account_id, amount, reason, created_by).await
    }

    /// Move float from a funding account to an agent, addressed by owner id
    pub async fn assign_float(
        &self,
        agent_owner_id: Uuid,
        amount: Decimal,
        source_account_id: Uuid,
        reason: String,
        created_by: String,
    ) -> Result<TransferOutcome> {
        self.handle
            .assign_float(agent_owner_id, amount, source_account_id, reason, created_by)
            .await
    }

    /// Get entry by ID
    pub fn get_entry(&self, entry_id: Uuid) -> Result<LedgerEntry> {
        self.storage.get_entry(entry_id)
    }

    /// Get the full entry log for an account, oldest first
    pub fn get_entries(&self, account_id: Uuid) -> Result<Vec<LedgerEntry>> {
        self.storage.get_account_entries(account_id)
    }

    /// Get an account's most recent entries, newest first
    pub fn get_ledger(&self, account_id: Uuid, limit: usize) -> Result<Vec<LedgerEntry>> {
        self.storage.get_account_entries_desc(account_id, limit)
    }

    /// Balance derived by folding the entry log
    pub fn get_balance(&self, account_id: Uuid) -> Result<Decimal> {
        ledger::balance_from_log(&self.storage, account_id)
    }

    /// Balance minus active hold reservations
    pub fn get_available(&self, account_id: Uuid) -> Result<Decimal> {
        let balance = ledger::balance_from_log(&self.storage, account_id)?;
        let held = ledger::active_hold_total(&self.storage, account_id)?;
        Ok(balance - held)
    }

    /// Replay an account's log and cross-check the materialized row
    pub fn verify_account(&self, account_id: Uuid) -> Result<LedgerAudit> {
        ledger::verify_account(&self.storage, account_id)
    }

    // ---- Holds ----

    /// Place a hold
    pub async fn reserve_hold(&self, params: ReserveParams) -> Result<Hold> {
        self.handle.reserve_hold(params).await
    }

    /// Release a hold's remaining reservation
    pub async fn release_hold(&self, hold_id: Uuid) -> Result<Hold> {
        self.handle.release_hold(hold_id).await
    }

    /// Consume a hold's remaining reservation
    pub async fn consume_hold(&self, hold_id: Uuid) -> Result<Hold> {
        self.handle.consume_hold(hold_id).await
    }

    /// Get hold by ID
    pub fn get_hold(&self, hold_id: Uuid) -> Result<Hold> {
        self.storage.get_hold(hold_id)
    }

    /// Get all holds for an account
    pub fn get_account_holds(&self, account_id: Uuid) -> Result<Vec<Hold>> {
        self.storage.get_account_holds(account_id)
    }

    /// Sum of active hold reservations for an account
    pub fn active_hold_total(&self, account_id: Uuid) -> Result<Decimal> {
        ledger::active_hold_total(&self.storage, account_id)
    }

    // ---- Vouchers ----

    /// Create a voucher batch (idempotent)
    pub async fn create_vouchers(&self, params: CreateVouchersParams) -> Result<BatchOutcome> {
        self.handle.create_vouchers(params).await
    }

    /// Dry-run a batch creation without reserving anything
    pub fn preview_vouchers(
        &self,
        issuer_account_id: Uuid,
        count: u32,
        amount_each: Decimal,
    ) -> Result<BatchPreview> {
        voucher::preview(
            &self.storage,
            &self.config.voucher,
            issuer_account_id,
            count,
            amount_each,
        )
    }

    /// Void a voucher, recording the reason verbatim
    pub async fn void_voucher(&self, voucher_id: Uuid, reason: String) -> Result<Voucher> {
        self.handle.void_voucher(voucher_id, reason).await
    }

    /// Close one voucher that passed its expiry
    pub async fn expire_voucher(&self, voucher_id: Uuid, now: DateTime<Utc>) -> Result<Voucher> {
        self.handle.expire_voucher(voucher_id, now).await
    }

    /// Redeem a voucher (idempotent)
    pub async fn redeem(&self, params: RedeemParams) -> Result<RedeemOutcome> {
        self.handle.redeem(params).await
    }

    /// Get voucher by ID
    pub fn get_voucher(&self, voucher_id: Uuid) -> Result<Voucher> {
        self.storage.get_voucher(voucher_id)
    }

    /// Look up a voucher by its printed code
    ///
    /// Input is normalized first, so lowercase or dashless codes work.
    pub fn find_voucher_by_code(&self, code: &str) -> Result<Option<Voucher>> {
        self.storage.find_voucher_by_code(&normalize_code(code))
    }

    /// Get all vouchers issued under a hold
    pub fn get_hold_vouchers(&self, hold_id: Uuid) -> Result<Vec<Voucher>> {
        self.storage.get_hold_vouchers(hold_id)
    }

    /// List vouchers matching a filter
    pub fn list_vouchers(&self, filter: &VoucherFilter) -> Result<Vec<Voucher>> {
        self.storage.list_vouchers(filter)
    }

    /// Find a voucher batch by its idempotency key
    pub fn find_batch_by_key(&self, idempotency_key: &str) -> Result<Option<VoucherBatch>> {
        self.storage.get_batch_by_key(idempotency_key)
    }

    /// Load the vouchers recorded in a batch
    pub fn get_batch_vouchers(&self, batch: &VoucherBatch) -> Result<Vec<Voucher>> {
        voucher::load_batch_vouchers(&self.storage, batch)
    }

    // ---- Redemptions ----

    /// Get redemption by ID
    pub fn get_redemption(&self, redemption_id: Uuid) -> Result<Redemption> {
        self.storage.get_redemption(redemption_id)
    }

    /// Find a redemption by its idempotency key
    pub fn find_redemption_by_key(&self, idempotency_key: &str) -> Result<Option<Redemption>> {
        self.storage.find_redemption_by_key(idempotency_key)
    }

    /// Find the redemption that settled a voucher
    pub fn find_redemption_for_voucher(&self, voucher_id: Uuid) -> Result<Option<Redemption>> {
        self.storage.find_redemption_for_voucher(voucher_id)
    }

    // ---- Maintenance ----

    /// Close overdue vouchers and holds
    pub async fn expire_due(&self, now: DateTime<Utc>, limit: usize) -> Result<ExpiryReport> {
        self.handle.expire_due(now, limit).await
    }

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration in effect
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shutdown custody core
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}
