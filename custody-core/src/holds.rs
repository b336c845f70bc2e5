//! Hold manager: reservations against available funds
//!
//! A hold removes funds from an account's available amount without writing a
//! ledger entry; the balance is untouched until the reserved purpose settles.
//! Voucher batches settle their holds share by share as codes are redeemed,
//! voided, or expire. Manual holds settle whole.

use crate::{
    ledger,
    storage::Storage,
    types::{Hold, HoldReference, HoldStatus, ReferenceKind, ReleaseCause, VoucherStatus},
    Error, Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Parameters for placing a hold
#[derive(Debug, Clone)]
pub struct ReserveParams {
    /// Account whose funds are reserved
    pub account_id: Uuid,
    /// Amount to reserve
    pub amount: Decimal,
    /// Purpose recorded verbatim
    pub purpose: String,
    /// What the hold backs
    pub reference: HoldReference,
    /// Optional expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// Caller identity
    pub created_by: String,
}

/// Place a hold on an account's available funds
pub fn reserve(storage: &Storage, params: ReserveParams, now: DateTime<Utc>) -> Result<Hold> {
    if params.amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(format!(
            "hold amount must be positive, got {}",
            params.amount
        )));
    }
    if let Some(expires_at) = params.expires_at {
        if expires_at <= now {
            return Err(Error::InvalidConfiguration(format!(
                "expires_at {} is not in the future",
                expires_at
            )));
        }
    }

    let account = storage.get_account(params.account_id)?;
    if !account.may_spend() {
        return Err(Error::InvalidState(format!(
            "account {} cannot reserve funds",
            account.id
        )));
    }

    let available = ledger::available_of(storage, &account)?;
    if params.amount > available {
        return Err(Error::InsufficientFunds {
            requested: params.amount,
            available,
        });
    }

    let hold = Hold {
        id: Uuid::new_v4(),
        account_id: params.account_id,
        amount: params.amount,
        consumed_amount: Decimal::ZERO,
        released_amount: Decimal::ZERO,
        purpose: params.purpose,
        reference: params.reference,
        status: HoldStatus::Active,
        expires_at: params.expires_at,
        created_by: params.created_by,
        created_at: now,
    };
    storage.create_hold_atomic(&hold)?;

    tracing::info!(
        hold_id = %hold.id,
        account_id = %hold.account_id,
        amount = %hold.amount,
        "Hold reserved"
    );

    Ok(hold)
}

/// Release the remaining reservation back to available funds
///
/// Releasing an already released or expired hold is a no-op; releasing a
/// consumed hold is an error.
pub fn release(storage: &Storage, hold_id: Uuid) -> Result<Hold> {
    let mut hold = storage.get_hold(hold_id)?;

    match hold.status {
        HoldStatus::Released | HoldStatus::Expired => return Ok(hold),
        HoldStatus::Consumed => {
            return Err(Error::InvalidState(format!(
                "hold {} is consumed, nothing to release",
                hold_id
            )));
        }
        HoldStatus::Active => {}
    }

    check_no_active_vouchers(storage, &hold)?;

    let remaining = hold.remaining();
    hold.release_share(remaining, ReleaseCause::Void)?;
    storage.put_hold(&hold)?;

    tracing::info!(hold_id = %hold_id, released = %remaining, "Hold released");

    Ok(hold)
}

/// Consume the remaining reservation (the reserved purpose settled)
///
/// Consuming an already consumed hold is a no-op; consuming a released or
/// expired hold is an error.
pub fn consume(storage: &Storage, hold_id: Uuid) -> Result<Hold> {
    let mut hold = storage.get_hold(hold_id)?;

    match hold.status {
        HoldStatus::Consumed => return Ok(hold),
        HoldStatus::Released | HoldStatus::Expired => {
            return Err(Error::InvalidState(format!(
                "hold {} is {:?}, nothing left to consume",
                hold_id, hold.status
            )));
        }
        HoldStatus::Active => {}
    }

    check_no_active_vouchers(storage, &hold)?;

    let remaining = hold.remaining();
    hold.consume_share(remaining)?;
    storage.put_hold(&hold)?;

    tracing::info!(hold_id = %hold_id, consumed = %remaining, "Hold consumed");

    Ok(hold)
}

/// Expire an overdue hold, returning the updated row, or `None` when the
/// hold was skipped
///
/// A voucher-batch hold still backing active vouchers is skipped: expiring
/// it would strand redeemable codes. The voucher sweep closes those codes
/// first, which settles the hold share by share.
pub fn expire_if_due(storage: &Storage, hold: &Hold, now: DateTime<Utc>) -> Result<Option<Hold>> {
    if hold.status != HoldStatus::Active || !hold.is_expired(now) {
        return Ok(None);
    }
    if check_no_active_vouchers(storage, hold).is_err() {
        tracing::warn!(
            hold_id = %hold.id,
            "Hold past expiry still backs active vouchers, skipping"
        );
        return Ok(None);
    }

    let mut hold = hold.clone();
    let remaining = hold.remaining();
    hold.release_share(remaining, ReleaseCause::Expiry)?;
    storage.put_hold(&hold)?;

    tracing::info!(hold_id = %hold.id, released = %remaining, "Hold expired");

    Ok(Some(hold))
}

/// Whole-hold settlement must not pull funds out from under live vouchers
fn check_no_active_vouchers(storage: &Storage, hold: &Hold) -> Result<()> {
    if hold.reference.kind != ReferenceKind::VoucherBatch {
        return Ok(());
    }
    let active = storage
        .get_hold_vouchers(hold.id)?
        .into_iter()
        .filter(|v| v.status == VoucherStatus::Active)
        .count();
    if active > 0 {
        return Err(Error::InvalidState(format!(
            "hold {} still backs {} active vouchers",
            hold.id, active
        )));
    }
    Ok(())
}
