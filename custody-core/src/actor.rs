//! Actor-based concurrency for the custody core
//!
//! All mutations flow through one writer task. A check and its write happen
//! inside a single message turn, so two spends can never both observe the
//! same available balance, and an idempotency lookup can never race the
//! commit that records its marker.
//!
//! Responses are sent only after the storage write returns: an acknowledged
//! money movement is a durable one. Reads do not pass through here; RocksDB
//! reads are safe from any thread.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              CustodyHandle (Clone)                    │
//! │         Sends messages to the writer mailbox          │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │             CustodyActor (single task)                │
//! │   check → mutate → WriteBatch commit → respond        │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::{
    codes::CodeSigner,
    config::VoucherConfig,
    holds::{self, ReserveParams},
    ledger::{self, AppendParams},
    metrics::Metrics,
    redeem::{self, RedeemOutcome, RedeemParams},
    storage::Storage,
    transfer::{self, TransferOutcome},
    types::{Account, AccountLimits, AccountStatus, Hold, LedgerEntry, OwnerKind, Voucher},
    voucher::{self, BatchOutcome, CreateVouchersParams},
    Error, Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Result of one expiry sweep pass
#[derive(Debug, Clone, Default)]
pub struct ExpiryReport {
    /// Vouchers closed as expired
    pub vouchers_expired: u64,
    /// Holds released by expiry
    pub holds_released: u64,
    /// Total value returned to available funds
    pub value_released: Decimal,
}

/// Message sent to the custody actor
pub enum CustodyMessage {
    /// Get or create the account for an owner
    EnsureAccount {
        kind: OwnerKind,
        owner_id: Uuid,
        response: oneshot::Sender<Result<Account>>,
    },

    /// Replace account limits, optionally changing status
    UpdateLimits {
        account_id: Uuid,
        limits: AccountLimits,
        status: Option<AccountStatus>,
        response: oneshot::Sender<Result<Account>>,
    },

    /// Append a raw audit entry
    Append {
        params: AppendParams,
        response: oneshot::Sender<Result<LedgerEntry>>,
    },

    /// Credit an account
    Credit {
        account_id: Uuid,
        amount: Decimal,
        reason: String,
        created_by: String,
        response: oneshot::Sender<Result<LedgerEntry>>,
    },

    /// Debit an account
    Debit {
        account_id: Uuid,
        amount: Decimal,
        reason: String,
        created_by: String,
        response: oneshot::Sender<Result<LedgerEntry>>,
    },

    /// Move float from a funding account to an agent
    AssignFloat {
        agent_owner_id: Uuid,
        amount: Decimal,
        source_account_id: Uuid,
        reason: String,
        created_by: String,
        response: oneshot::Sender<Result<TransferOutcome>>,
    },

    /// Place a hold
    ReserveHold {
        params: ReserveParams,
        response: oneshot::Sender<Result<Hold>>,
    },

    /// Release a hold's remaining reservation
    ReleaseHold {
        hold_id: Uuid,
        response: oneshot::Sender<Result<Hold>>,
    },

    /// Consume a hold's remaining reservation
    ConsumeHold {
        hold_id: Uuid,
        response: oneshot::Sender<Result<Hold>>,
    },

    /// Create a voucher batch (idempotent)
    CreateVouchers {
        params: CreateVouchersParams,
        response: oneshot::Sender<Result<BatchOutcome>>,
    },

    /// Void a voucher
    VoidVoucher {
        voucher_id: Uuid,
        reason: String,
        response: oneshot::Sender<Result<Voucher>>,
    },

    /// Close one overdue voucher
    ExpireVoucher {
        voucher_id: Uuid,
        now: DateTime<Utc>,
        response: oneshot::Sender<Result<Voucher>>,
    },

    /// Redeem a voucher (idempotent)
    Redeem {
        params: RedeemParams,
        response: oneshot::Sender<Result<RedeemOutcome>>,
    },

    /// Close overdue vouchers and holds
    ExpireDue {
        now: DateTime<Utc>,
        limit: usize,
        response: oneshot::Sender<Result<ExpiryReport>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that executes all custody mutations
pub struct CustodyActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Code checksum signer
    signer: CodeSigner,

    /// Voucher configuration
    voucher_config: VoucherConfig,

    /// Metrics collector
    metrics: Arc<Metrics>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<CustodyMessage>,
}

impl CustodyActor {
    /// Create new actor
    pub fn new(
        storage: Arc<Storage>,
        signer: CodeSigner,
        voucher_config: VoucherConfig,
        metrics: Arc<Metrics>,
        mailbox: mpsc::Receiver<CustodyMessage>,
    ) -> Self {
        Self {
            storage,
            signer,
            voucher_config,
            metrics,
            mailbox,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if matches!(msg, CustodyMessage::Shutdown) {
                break;
            }
            self.handle_message(msg);
        }
        tracing::info!("Custody writer stopped");
    }

    /// Handle a single message: the full check-mutate-commit happens here,
    /// and the response is sent only after the commit
    fn handle_message(&mut self, msg: CustodyMessage) {
        let started = Instant::now();

        match msg {
            CustodyMessage::EnsureAccount {
                kind,
                owner_id,
                response,
            } => {
                let result = ledger::ensure_account(&self.storage, kind, owner_id, Utc::now());
                let _ = response.send(result);
            }

            CustodyMessage::UpdateLimits {
                account_id,
                limits,
                status,
                response,
            } => {
                let result =
                    ledger::update_limits(&self.storage, account_id, limits, status, Utc::now());
                let _ = response.send(result);
            }

            CustodyMessage::Append { params, response } => {
                let result = ledger::append(&self.storage, params, Utc::now());
                if result.is_ok() {
                    self.metrics.record_entries(1);
                }
                let _ = response.send(result);
            }

            CustodyMessage::Credit {
                account_id,
                amount,
                reason,
                created_by,
                response,
            } => {
                let result = transfer::credit(
                    &self.storage,
                    account_id,
                    amount,
                    reason,
                    created_by,
                    Utc::now(),
                );
                if result.is_ok() {
                    self.metrics.record_entries(1);
                }
                let _ = response.send(result);
            }

            CustodyMessage::Debit {
                account_id,
                amount,
                reason,
                created_by,
                response,
            } => {
                let result = transfer::debit(
                    &self.storage,
                    account_id,
                    amount,
                    reason,
                    created_by,
                    Utc::now(),
                );
                if result.is_ok() {
                    self.metrics.record_entries(1);
                }
                let _ = response.send(result);
            }

            CustodyMessage::AssignFloat {
                agent_owner_id,
                amount,
                source_account_id,
                reason,
                created_by,
                response,
            } => {
                let result = transfer::assign_float(
                    &self.storage,
                    agent_owner_id,
                    amount,
                    source_account_id,
                    reason,
                    created_by,
                    Utc::now(),
                );
                if result.is_ok() {
                    self.metrics.record_entries(2);
                }
                let _ = response.send(result);
            }

            CustodyMessage::ReserveHold { params, response } => {
                let result = holds::reserve(&self.storage, params, Utc::now());
                if result.is_ok() {
                    self.metrics.record_hold_reserved();
                }
                let _ = response.send(result);
            }

            CustodyMessage::ReleaseHold { hold_id, response } => {
                let result = holds::release(&self.storage, hold_id);
                let _ = response.send(result);
            }

            CustodyMessage::ConsumeHold { hold_id, response } => {
                let result = holds::consume(&self.storage, hold_id);
                let _ = response.send(result);
            }

            CustodyMessage::CreateVouchers { params, response } => {
                let result = voucher::create_batch(
                    &self.storage,
                    &self.signer,
                    &self.voucher_config,
                    params,
                    Utc::now(),
                );
                if let Ok(outcome) = &result {
                    if !outcome.reused {
                        self.metrics.record_hold_reserved();
                        self.metrics
                            .record_vouchers_issued(outcome.vouchers.len() as u64);
                    }
                }
                let _ = response.send(result);
            }

            CustodyMessage::VoidVoucher {
                voucher_id,
                reason,
                response,
            } => {
                let result = voucher::void(&self.storage, voucher_id, reason);
                let _ = response.send(result);
            }

            CustodyMessage::ExpireVoucher {
                voucher_id,
                now,
                response,
            } => {
                let result = self.expire_one(voucher_id, now);
                if result.is_ok() {
                    self.metrics.record_vouchers_expired(1);
                }
                let _ = response.send(result);
            }

            CustodyMessage::Redeem { params, response } => {
                let result = redeem::redeem(&self.storage, &self.signer, params, Utc::now());
                if let Ok(outcome) = &result {
                    if !outcome.reused {
                        self.metrics.record_voucher_redeemed();
                        self.metrics.record_entries(2);
                    }
                }
                let _ = response.send(result);
            }

            CustodyMessage::ExpireDue {
                now,
                limit,
                response,
            } => {
                let result = self.expire_due(now, limit);
                if let Ok(report) = &result {
                    self.metrics.record_vouchers_expired(report.vouchers_expired);
                }
                let _ = response.send(result);
            }

            CustodyMessage::Shutdown => {
                // Handled in main loop
            }
        }

        self.metrics
            .record_commit_duration(started.elapsed().as_secs_f64());
    }

    /// Close one voucher that passed its expiry
    fn expire_one(&self, voucher_id: Uuid, now: DateTime<Utc>) -> Result<Voucher> {
        let due = self.storage.get_voucher(voucher_id)?;
        if !due.is_expired(now) {
            return Err(Error::InvalidState(format!(
                "voucher {} has not reached its expiry",
                voucher_id
            )));
        }
        voucher::expire_voucher(&self.storage, &due)
    }

    /// One expiry pass: close overdue vouchers first, then overdue holds
    ///
    /// Vouchers go first so a hold whose codes all lapsed settles through
    /// its shares rather than being force-released under live codes.
    fn expire_due(&self, now: DateTime<Utc>, limit: usize) -> Result<ExpiryReport> {
        let mut report = ExpiryReport::default();

        for due in self.storage.list_expired_active_vouchers(now, limit)? {
            let expired = voucher::expire_voucher(&self.storage, &due)?;
            report.vouchers_expired += 1;
            report.value_released += expired.amount;
        }

        for due in self.storage.list_expired_active_holds(now, limit)? {
            let remaining = due.remaining();
            if holds::expire_if_due(&self.storage, &due, now)?.is_some() {
                report.holds_released += 1;
                report.value_released += remaining;
            }
        }

        Ok(report)
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct CustodyHandle {
    sender: mpsc::Sender<CustodyMessage>,
}

impl CustodyHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<CustodyMessage>) -> Self {
        Self { sender }
    }

    async fn call<T>(
        &self,
        msg: CustodyMessage,
        rx: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Get or create the account for an owner
    pub async fn ensure_account(&self, kind: OwnerKind, owner_id: Uuid) -> Result<Account> {
        let (tx, rx) = oneshot::channel();
        self.call(
            CustodyMessage::EnsureAccount {
                kind,
                owner_id,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Replace account limits, optionally changing status
    pub async fn update_limits(
        &self,
        account_id: Uuid,
        limits: AccountLimits,
        status: Option<AccountStatus>,
    ) -> Result<Account> {
        let (tx, rx) = oneshot::channel();
        self.call(
            CustodyMessage::UpdateLimits {
                account_id,
                limits,
                status,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Append a raw audit entry
    pub async fn append(&self, params: AppendParams) -> Result<LedgerEntry> {
        let (tx, rx) = oneshot::channel();
        self.call(CustodyMessage::Append { params, response: tx }, rx)
            .await
    }

    /// Credit an account
    pub async fn credit(
        &self,
        account_id: Uuid,
        amount: Decimal,
        reason: String,
        created_by: String,
    ) -> Result<LedgerEntry> {
        let (tx, rx) = oneshot::channel();
        self.call(
            CustodyMessage::Credit {
                account_id,
                amount,
                reason,
                created_by,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Debit an account
    pub async fn debit(
        &self,
        account_id: Uuid,
        amount: Decimal,
        reason: String,
        created_by: String,
    ) -> Result<LedgerEntry> {
        let (tx, rx) = oneshot::channel();
        self.call(
            CustodyMessage::Debit {
                account_id,
                amount,
                reason,
                created_by,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Move float from a funding account to an agent
    pub async fn assign_float(
        &self,
        agent_owner_id: Uuid,
        amount: Decimal,
        source_account_id: Uuid,
        reason: String,
        created_by: String,
    ) -> Result<TransferOutcome> {
        let (tx, rx) = oneshot::channel();
        self.call(
            CustodyMessage::AssignFloat {
                agent_owner_id,
                amount,
                source_account_id,
                reason,
                created_by,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Place a hold
    pub async fn reserve_hold(&self, params: ReserveParams) -> Result<Hold> {
        let (tx, rx) = oneshot::channel();
        self.call(CustodyMessage::ReserveHold { params, response: tx }, rx)
            .await
    }

    /// Release a hold's remaining reservation
    pub async fn release_hold(&self, hold_id: Uuid) -> Result<Hold> {
        let (tx, rx) = oneshot::channel();
        self.call(CustodyMessage::ReleaseHold { hold_id, response: tx }, rx)
            .await
    }

    /// Consume a hold's remaining reservation
    pub async fn consume_hold(&self, hold_id: Uuid) -> Result<Hold> {
        let (tx, rx) = oneshot::channel();
        self.call(CustodyMessage::ConsumeHold { hold_id, response: tx }, rx)
            .await
    }

    /// Create a voucher batch (idempotent)
    pub async fn create_vouchers(&self, params: CreateVouchersParams) -> Result<BatchOutcome> {
        let (tx, rx) = oneshot::channel();
        self.call(CustodyMessage::CreateVouchers { params, response: tx }, rx)
            .await
    }

    /// Void a voucher
    pub async fn void_voucher(&self, voucher_id: Uuid, reason: String) -> Result<Voucher> {
        let (tx, rx) = oneshot::channel();
        self.call(
            CustodyMessage::VoidVoucher {
                voucher_id,
                reason,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Close one voucher that passed its expiry
    pub async fn expire_voucher(&self, voucher_id: Uuid, now: DateTime<Utc>) -> Result<Voucher> {
        let (tx, rx) = oneshot::channel();
        self.call(
            CustodyMessage::ExpireVoucher {
                voucher_id,
                now,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Redeem a voucher (idempotent)
    pub async fn redeem(&self, params: RedeemParams) -> Result<RedeemOutcome> {
        let (tx, rx) = oneshot::channel();
        self.call(CustodyMessage::Redeem { params, response: tx }, rx)
            .await
    }

    /// Close overdue vouchers and holds
    pub async fn expire_due(&self, now: DateTime<Utc>, limit: usize) -> Result<ExpiryReport> {
        let (tx, rx) = oneshot::channel();
        self.call(
            CustodyMessage::ExpireDue {
                now,
                limit,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(CustodyMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the custody actor
pub fn spawn_custody_actor(
    storage: Arc<Storage>,
    signer: CodeSigner,
    voucher_config: VoucherConfig,
    metrics: Arc<Metrics>,
) -> CustodyHandle {
    let (tx, rx) = mpsc::channel(1000); // Bounded channel for backpressure
    let actor = CustodyActor::new(storage, signer, voucher_config, metrics, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    CustodyHandle::new(tx)
}
