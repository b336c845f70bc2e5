//! Voucher issuer: batch creation, voiding, expiry
//!
//! Creation is idempotent on a caller-supplied key and runs in two phases:
//! reserve a hold for the batch's full value, then commit every voucher row,
//! code index, and the batch record in one write. If the second phase fails
//! the hold is released, so no reservation outlives a failed batch.

use crate::{
    codes::{self, CodeSigner},
    config::VoucherConfig,
    holds, ledger,
    storage::Storage,
    types::{
        Eligibility, Hold, HoldReference, ReferenceKind, ReleaseCause, Voucher, VoucherBatch,
        VoucherStatus,
    },
    Error, Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use uuid::Uuid;

/// Parameters for creating a voucher batch
#[derive(Debug, Clone)]
pub struct CreateVouchersParams {
    /// Account whose funds back the batch
    pub issuer_account_id: Uuid,
    /// Number of vouchers to issue
    pub count: u32,
    /// Face amount of each voucher
    pub amount_each: Decimal,
    /// Purpose recorded verbatim on the hold and each voucher
    pub purpose: String,
    /// Who may redeem
    pub eligibility: Eligibility,
    /// Optional expiry shared by the batch
    pub expires_at: Option<DateTime<Utc>>,
    /// Caller-supplied idempotency key
    pub idempotency_key: String,
    /// Caller identity
    pub created_by: String,
}

/// Result of a batch creation
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// The stored batch record
    pub batch: VoucherBatch,
    /// The batch's vouchers
    pub vouchers: Vec<Voucher>,
    /// True when an earlier creation with the same key was returned
    pub reused: bool,
}

/// What a batch creation would reserve, and whether it would be accepted
#[derive(Debug, Clone)]
pub struct BatchPreview {
    /// Funds the batch's hold would reserve
    pub total_amount: Decimal,
    /// Issuer's spendable funds at the time of the preview
    pub available_balance: Decimal,
    /// The creation would be accepted as previewed
    pub can_create: bool,
    /// Problems a caller can surface before committing
    pub warnings: Vec<String>,
}

/// Dry-run a batch creation
///
/// Read-only, so the answer can go stale the moment another mutation
/// commits; `create_batch` re-checks everything.
pub fn preview(
    storage: &Storage,
    config: &VoucherConfig,
    issuer_account_id: Uuid,
    count: u32,
    amount_each: Decimal,
) -> Result<BatchPreview> {
    let account = storage.get_account(issuer_account_id)?;
    let available = ledger::available_of(storage, &account)?;
    let total = amount_each * Decimal::from(count);

    let mut warnings = Vec::new();
    if count == 0 {
        warnings.push("count must be at least 1".to_string());
    }
    if count > config.max_batch_count {
        warnings.push(format!(
            "count {} exceeds the per-batch ceiling {}",
            count, config.max_batch_count
        ));
    }
    if amount_each <= Decimal::ZERO {
        warnings.push(format!("amount_each must be positive, got {}", amount_each));
    }
    if !account.may_spend() {
        warnings.push(format!("account {} cannot reserve funds", account.id));
    }
    if total > available {
        warnings.push(format!(
            "batch needs {} but only {} is available",
            total, available
        ));
    }

    Ok(BatchPreview {
        total_amount: total,
        available_balance: available,
        can_create: warnings.is_empty(),
        warnings,
    })
}

/// Create a voucher batch, or return the stored result of an earlier
/// creation with the same idempotency key
pub fn create_batch(
    storage: &Storage,
    signer: &CodeSigner,
    config: &VoucherConfig,
    params: CreateVouchersParams,
    now: DateTime<Utc>,
) -> Result<BatchOutcome> {
    if params.idempotency_key.is_empty() {
        return Err(Error::InvalidConfiguration(
            "idempotency_key must not be empty".to_string(),
        ));
    }

    // Replay: hand back the stored batch regardless of the other params
    if let Some(batch) = storage.get_batch_by_key(&params.idempotency_key)? {
        let vouchers = load_batch_vouchers(storage, &batch)?;
        tracing::info!(
            batch_id = %batch.batch_id,
            idempotency_key = %batch.idempotency_key,
            "Voucher batch replayed"
        );
        return Ok(BatchOutcome {
            batch,
            vouchers,
            reused: true,
        });
    }

    if params.count == 0 || params.count > config.max_batch_count {
        return Err(Error::InvalidConfiguration(format!(
            "count must be between 1 and {}, got {}",
            config.max_batch_count, params.count
        )));
    }
    if params.amount_each <= Decimal::ZERO {
        return Err(Error::InvalidAmount(format!(
            "amount_each must be positive, got {}",
            params.amount_each
        )));
    }

    let total = params.amount_each * Decimal::from(params.count);
    let batch_id = Uuid::new_v4();

    // Phase 1: reserve the batch's full value
    let hold = holds::reserve(
        storage,
        holds::ReserveParams {
            account_id: params.issuer_account_id,
            amount: total,
            purpose: params.purpose.clone(),
            reference: HoldReference {
                kind: ReferenceKind::VoucherBatch,
                id: batch_id,
            },
            expires_at: params.expires_at,
            created_by: params.created_by.clone(),
        },
        now,
    )?;

    // Phase 2: mint codes and commit rows; release the hold on any failure
    match mint_and_commit(storage, signer, config, &params, batch_id, &hold, now) {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            if let Err(release_err) = holds::release(storage, hold.id) {
                tracing::error!(
                    hold_id = %hold.id,
                    error = %release_err,
                    "Failed to release hold after batch creation failure"
                );
            }
            Err(e)
        }
    }
}

fn mint_and_commit(
    storage: &Storage,
    signer: &CodeSigner,
    config: &VoucherConfig,
    params: &CreateVouchersParams,
    batch_id: Uuid,
    hold: &Hold,
    now: DateTime<Utc>,
) -> Result<BatchOutcome> {
    let mut rng = rand::thread_rng();
    let mut taken: HashSet<String> = HashSet::with_capacity(params.count as usize);
    let mut vouchers = Vec::with_capacity(params.count as usize);

    for _ in 0..params.count {
        let code = draw_unique_code(storage, config, &mut rng, &mut taken)?;
        let checksum = signer.checksum(&code);
        vouchers.push(Voucher {
            id: Uuid::new_v4(),
            code,
            checksum,
            issuer_account_id: params.issuer_account_id,
            hold_id: hold.id,
            amount: params.amount_each,
            purpose: params.purpose.clone(),
            eligibility: params.eligibility,
            status: VoucherStatus::Active,
            expires_at: params.expires_at,
            batch_id,
            batch_key: params.idempotency_key.clone(),
            voided_reason: None,
            created_by: params.created_by.clone(),
            created_at: now,
        });
    }

    let batch = VoucherBatch {
        batch_id,
        idempotency_key: params.idempotency_key.clone(),
        issuer_account_id: params.issuer_account_id,
        hold_id: hold.id,
        voucher_ids: vouchers.iter().map(|v| v.id).collect(),
        count: params.count,
        amount_each: params.amount_each,
        created_at: now,
    };

    storage.create_voucher_batch_atomic(&batch, &vouchers)?;

    tracing::info!(
        batch_id = %batch_id,
        issuer = %params.issuer_account_id,
        count = params.count,
        amount_each = %params.amount_each,
        "Voucher batch created"
    );

    Ok(BatchOutcome {
        batch,
        vouchers,
        reused: false,
    })
}

/// Draw a code colliding with neither the store nor this batch
fn draw_unique_code(
    storage: &Storage,
    config: &VoucherConfig,
    rng: &mut impl rand::Rng,
    taken: &mut HashSet<String>,
) -> Result<String> {
    for _ in 0..config.code_retry_limit {
        let code = codes::generate_code(rng);
        if taken.contains(&code) || storage.find_voucher_by_code(&code)?.is_some() {
            continue;
        }
        taken.insert(code.clone());
        return Ok(code);
    }
    Err(Error::Other(format!(
        "no unused code found in {} attempts",
        config.code_retry_limit
    )))
}

/// Void an active voucher, returning its hold share to available funds
///
/// The reason is stored verbatim on the voucher. Only active vouchers can
/// be voided; every terminal status fails `InvalidState`.
pub fn void(storage: &Storage, voucher_id: Uuid, reason: String) -> Result<Voucher> {
    let mut voucher = storage.get_voucher(voucher_id)?;

    if voucher.status != VoucherStatus::Active {
        return Err(Error::InvalidState(format!(
            "voucher {} is {:?}, cannot void",
            voucher_id, voucher.status
        )));
    }

    let mut hold = storage.get_hold(voucher.hold_id)?;
    voucher.status = VoucherStatus::Voided;
    voucher.voided_reason = Some(reason.clone());
    hold.release_share(voucher.amount, ReleaseCause::Void)?;
    storage.close_voucher_atomic(&voucher, &hold)?;

    tracing::info!(
        voucher_id = %voucher_id,
        amount = %voucher.amount,
        reason = %reason,
        "Voucher voided"
    );

    Ok(voucher)
}

/// Close an active voucher that passed its expiry
///
/// Shared by the redemption path (lazy expiry on presentation) and the
/// sweep. The voucher row and the hold's released share move in one write.
pub fn expire_voucher(storage: &Storage, voucher: &Voucher) -> Result<Voucher> {
    if voucher.status != VoucherStatus::Active {
        return Err(Error::InvalidState(format!(
            "voucher {} is {:?}, cannot expire",
            voucher.id, voucher.status
        )));
    }

    let mut voucher = voucher.clone();
    let mut hold = storage.get_hold(voucher.hold_id)?;
    voucher.status = VoucherStatus::Expired;
    hold.release_share(voucher.amount, ReleaseCause::Expiry)?;
    storage.close_voucher_atomic(&voucher, &hold)?;

    tracing::info!(voucher_id = %voucher.id, amount = %voucher.amount, "Voucher expired");

    Ok(voucher)
}

pub(crate) fn load_batch_vouchers(storage: &Storage, batch: &VoucherBatch) -> Result<Vec<Voucher>> {
    batch
        .voucher_ids
        .iter()
        .map(|id| storage.get_voucher(*id))
        .collect()
}
