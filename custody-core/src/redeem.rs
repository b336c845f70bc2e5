//! Voucher redeemer: exactly-once settlement of codes
//!
//! Redemption is idempotent on a caller-supplied key. The stored result is
//! checked and recorded on the writer task, and the idempotency marker
//! commits in the same write as the money movement, so a retry after a crash
//! either finds the marker or finds nothing happened.
//!
//! A presented code is checked cheapest-first: checksum (no lookup), then
//! lookup, then status, then eligibility, then funds.

use crate::{
    codes::{self, CodeSigner},
    ledger,
    storage::Storage,
    types::{EntryKind, EntryMeta, GeoPoint, Redemption, Voucher, VoucherStatus},
    voucher, Error, Result,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Parameters for redeeming a voucher
#[derive(Debug, Clone)]
pub struct RedeemParams {
    /// Presented code (normalized before lookup)
    pub code: String,
    /// Presented checksum
    pub checksum: String,
    /// Account to credit with the face amount
    pub redeemer_account_id: Uuid,
    /// Where the redemption was captured, if reported
    pub location: Option<GeoPoint>,
    /// Caller-supplied idempotency key
    pub idempotency_key: String,
    /// Caller identity
    pub redeemed_by: String,
}

/// Result of a redemption
#[derive(Debug, Clone)]
pub struct RedeemOutcome {
    /// The stored redemption record
    pub redemption: Redemption,
    /// The voucher after settlement
    pub voucher: Voucher,
    /// True when an earlier redemption with the same key was returned
    pub reused: bool,
}

/// Redeem a voucher, or return the stored result of an earlier redemption
/// with the same idempotency key
pub fn redeem(
    storage: &Storage,
    signer: &CodeSigner,
    params: RedeemParams,
    now: DateTime<Utc>,
) -> Result<RedeemOutcome> {
    if params.idempotency_key.is_empty() {
        return Err(Error::InvalidConfiguration(
            "idempotency_key must not be empty".to_string(),
        ));
    }

    // Replay: hand back the stored redemption regardless of the other params
    if let Some(redemption) = storage.find_redemption_by_key(&params.idempotency_key)? {
        let voucher = storage.get_voucher(redemption.voucher_id)?;
        tracing::info!(
            redemption_id = %redemption.id,
            idempotency_key = %params.idempotency_key,
            "Redemption replayed"
        );
        return Ok(RedeemOutcome {
            redemption,
            voucher,
            reused: true,
        });
    }

    let code = codes::normalize_code(&params.code);
    if !signer.verify(&code, &params.checksum) {
        return Err(Error::ChecksumMismatch(code));
    }

    let voucher = storage
        .find_voucher_by_code(&code)?
        .ok_or_else(|| Error::VoucherNotFound(code.clone()))?;

    match voucher.status {
        VoucherStatus::Active => {}
        VoucherStatus::Redeemed => {
            return Err(Error::InvalidState(format!(
                "voucher {} already redeemed",
                code
            )));
        }
        VoucherStatus::Voided => {
            return Err(Error::InvalidState(format!("voucher {} is voided", code)));
        }
        VoucherStatus::Expired => return Err(Error::Expired(code)),
    }

    // Lazy expiry: close the overdue voucher before reporting it
    if voucher.is_expired(now) {
        voucher::expire_voucher(storage, &voucher)?;
        return Err(Error::Expired(code));
    }

    let mut redeemer = storage.get_account(params.redeemer_account_id)?;
    if !redeemer.may_spend() {
        return Err(Error::InvalidState(format!(
            "account {} cannot redeem vouchers",
            redeemer.id
        )));
    }
    if redeemer.id == voucher.issuer_account_id {
        return Err(Error::InvalidState(format!(
            "voucher {} cannot be redeemed into its issuing account",
            code
        )));
    }
    if !voucher.eligibility.permits(&redeemer.owner) {
        return Err(Error::NotEligible(format!(
            "account {} is not eligible for voucher {}",
            redeemer.id, code
        )));
    }
    ledger::check_max_balance(&redeemer, voucher.amount)?;

    // Settle: consume the hold share and move the face amount. The issuer's
    // status is not re-checked; its funds were committed at reservation.
    let mut hold = storage.get_hold(voucher.hold_id)?;
    hold.consume_share(voucher.amount)?;

    let mut issuer = storage.get_account(voucher.issuer_account_id)?;
    let redemption_id = Uuid::new_v4();
    let reason = format!("voucher {} redeemed", code);

    let mut issuer_entry = ledger::next_entry(
        &mut issuer,
        EntryKind::Redeem,
        -voucher.amount,
        reason.clone(),
        EntryMeta {
            hold: Some(hold.id),
            voucher: Some(voucher.id),
            redemption: Some(redemption_id),
            ..Default::default()
        },
        params.redeemed_by.clone(),
        now,
    );
    let mut redeemer_entry = ledger::next_entry(
        &mut redeemer,
        EntryKind::Credit,
        voucher.amount,
        reason,
        EntryMeta {
            voucher: Some(voucher.id),
            redemption: Some(redemption_id),
            ..Default::default()
        },
        params.redeemed_by.clone(),
        now,
    );
    issuer_entry.meta.counter_entry = Some(redeemer_entry.id);
    redeemer_entry.meta.counter_entry = Some(issuer_entry.id);

    let mut voucher = voucher;
    voucher.status = VoucherStatus::Redeemed;

    let redemption = Redemption {
        id: redemption_id,
        voucher_id: voucher.id,
        redeemer_account_id: params.redeemer_account_id,
        amount: voucher.amount,
        location: params.location,
        redeemed_by: params.redeemed_by,
        idempotency_key: params.idempotency_key,
        created_at: now,
    };

    storage.commit_redemption_atomic(
        &voucher,
        &hold,
        &redemption,
        &issuer_entry,
        &redeemer_entry,
        &issuer,
        &redeemer,
    )?;

    tracing::info!(
        redemption_id = %redemption_id,
        voucher_id = %voucher.id,
        redeemer = %params.redeemer_account_id,
        amount = %voucher.amount,
        "Voucher redeemed"
    );

    Ok(RedeemOutcome {
        redemption,
        voucher,
        reused: false,
    })
}
