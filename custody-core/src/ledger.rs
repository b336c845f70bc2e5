//! Account ledger: account lifecycle, raw appends, derived balances
//!
//! Every money movement lands here as an immutable entry. The materialized
//! `Account::balance` is bumped in the same write as each entry; the fold of
//! the log is authoritative and `verify_account` checks the two agree.
//!
//! Mutating functions in this module are called from the writer task only,
//! so a read-check-write sequence inside one call is serializable.

use crate::{
    storage::Storage,
    types::{
        Account, AccountLimits, AccountStatus, EntryKind, EntryMeta, HoldStatus, LedgerEntry,
        OwnerKind, OwnerRef,
    },
    Error, Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Parameters for a raw audit append
#[derive(Debug, Clone)]
pub struct AppendParams {
    /// Target account
    pub account_id: Uuid,
    /// Movement kind
    pub kind: EntryKind,
    /// Signed amount (sign must match the kind)
    pub amount: Decimal,
    /// Reason recorded verbatim
    pub reason: String,
    /// Links to related rows
    pub meta: EntryMeta,
    /// Caller identity
    pub created_by: String,
}

/// Result of auditing one account's log
#[derive(Debug, Clone)]
pub struct LedgerAudit {
    /// Audited account
    pub account_id: Uuid,
    /// Entries in the log
    pub entry_count: u64,
    /// Balance folded from the log
    pub computed_balance: Decimal,
    /// Balance on the materialized account row
    pub materialized_balance: Decimal,
    /// Log and materialized row agree, and the running chain is unbroken
    pub consistent: bool,
    /// First sequence number where the chain broke, if any
    pub broken_at: Option<u64>,
}

/// Get the account owned by an entity, creating it if absent
///
/// Repeat calls for the same owner return the same account.
pub fn ensure_account(
    storage: &Storage,
    kind: OwnerKind,
    owner_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Account> {
    if let Some(existing) = storage.find_account_by_owner(kind, owner_id)? {
        return Ok(existing);
    }

    let account = Account::new(OwnerRef::new(kind, owner_id), now);
    storage.create_account_atomic(&account)?;

    tracing::info!(
        account_id = %account.id,
        owner_kind = %kind,
        owner_id = %owner_id,
        "Account created"
    );

    Ok(account)
}

/// Replace account limits, optionally moving status in the same write
///
/// `Closed` is terminal: nothing on a closed account may change, and closing
/// requires a zero balance with no active holds.
pub fn update_limits(
    storage: &Storage,
    account_id: Uuid,
    limits: AccountLimits,
    status: Option<AccountStatus>,
    now: DateTime<Utc>,
) -> Result<Account> {
    limits.validate()?;

    let mut account = storage.get_account(account_id)?;
    if account.status == AccountStatus::Closed {
        return Err(Error::InvalidState(format!(
            "account {} is closed",
            account_id
        )));
    }

    if let Some(next) = status {
        if next != account.status {
            if next == AccountStatus::Closed {
                if account.balance != Decimal::ZERO {
                    return Err(Error::InvalidState(format!(
                        "account {} has balance {}, cannot close",
                        account_id, account.balance
                    )));
                }
                let held = active_hold_total(storage, account_id)?;
                if held != Decimal::ZERO {
                    return Err(Error::InvalidState(format!(
                        "account {} has {} reserved under active holds, cannot close",
                        account_id, held
                    )));
                }
            }
            tracing::info!(account_id = %account_id, status = ?next, "Account status changed");
            account.status = next;
        }
    }

    account.limits = limits;
    account.updated_at = now;
    storage.put_account(&account)?;

    Ok(account)
}

/// Append a raw audit entry
///
/// Adjustments and hold markers enter the log through here. Balance-bearing
/// kinds move the materialized balance; marker kinds record an amount without
/// touching it.
pub fn append(storage: &Storage, params: AppendParams, now: DateTime<Utc>) -> Result<LedgerEntry> {
    validate_amount(params.kind, params.amount)?;

    let mut account = storage.get_account(params.account_id)?;

    match params.kind {
        EntryKind::Credit => {
            if !account.accepts_credits() {
                return Err(Error::InvalidState(format!(
                    "account {} does not accept credits",
                    account.id
                )));
            }
            check_max_balance(&account, params.amount)?;
        }
        EntryKind::Debit | EntryKind::Redeem => {
            if !account.may_spend() {
                return Err(Error::InvalidState(format!(
                    "account {} cannot be debited",
                    account.id
                )));
            }
            let available = available_of(storage, &account)?;
            let requested = -params.amount;
            if requested > available {
                return Err(Error::InsufficientFunds {
                    requested,
                    available,
                });
            }
        }
        EntryKind::HoldReserve | EntryKind::HoldRelease => {
            if account.status == AccountStatus::Closed {
                return Err(Error::InvalidState(format!(
                    "account {} is closed",
                    account.id
                )));
            }
        }
    }

    let entry = next_entry(
        &mut account,
        params.kind,
        params.amount,
        params.reason,
        params.meta,
        params.created_by,
        now,
    );
    storage.commit_entries_atomic(&[&entry], &[&account])?;

    Ok(entry)
}

/// Fold the entry log into a balance
///
/// This is the authoritative read; the materialized row is an optimization.
pub fn balance_from_log(storage: &Storage, account_id: Uuid) -> Result<Decimal> {
    // Missing accounts surface as AccountNotFound, not a zero balance
    storage.get_account(account_id)?;

    let mut balance = Decimal::ZERO;
    for entry in storage.get_account_entries(account_id)? {
        balance += entry_delta(entry.kind, entry.amount);
    }
    Ok(balance)
}

/// Total still reserved under the account's active holds
pub fn active_hold_total(storage: &Storage, account_id: Uuid) -> Result<Decimal> {
    let mut total = Decimal::ZERO;
    for hold in storage.get_account_holds(account_id)? {
        if hold.status == HoldStatus::Active {
            total += hold.remaining();
        }
    }
    Ok(total)
}

/// Spendable amount: materialized balance minus active reservations
pub(crate) fn available_of(storage: &Storage, account: &Account) -> Result<Decimal> {
    Ok(account.balance - active_hold_total(storage, account.id)?)
}

/// Audit one account: refold the log and walk the running chain
pub fn verify_account(storage: &Storage, account_id: Uuid) -> Result<LedgerAudit> {
    let account = storage.get_account(account_id)?;
    let entries = storage.get_account_entries(account_id)?;

    let mut running = Decimal::ZERO;
    let mut broken_at = None;
    for (i, entry) in entries.iter().enumerate() {
        running += entry_delta(entry.kind, entry.amount);
        if broken_at.is_none() && (entry.seq != i as u64 || entry.balance_after != running) {
            broken_at = Some(entry.seq);
        }
    }

    let consistent = broken_at.is_none()
        && running == account.balance
        && account.entry_seq == entries.len() as u64;

    if !consistent {
        tracing::warn!(
            account_id = %account_id,
            computed = %running,
            materialized = %account.balance,
            broken_at = ?broken_at,
            "Ledger audit found divergence"
        );
    }

    Ok(LedgerAudit {
        account_id,
        entry_count: entries.len() as u64,
        computed_balance: running,
        materialized_balance: account.balance,
        consistent,
        broken_at,
    })
}

/// Build the next entry and roll the account row forward
///
/// The single place where seq, balance, and balance_after are advanced.
pub(crate) fn next_entry(
    account: &mut Account,
    kind: EntryKind,
    amount: Decimal,
    reason: String,
    meta: EntryMeta,
    created_by: String,
    now: DateTime<Utc>,
) -> LedgerEntry {
    let balance_after = account.balance + entry_delta(kind, amount);
    let entry = LedgerEntry {
        id: Uuid::now_v7(),
        account_id: account.id,
        seq: account.entry_seq,
        kind,
        amount,
        reason,
        meta,
        balance_after,
        created_by,
        created_at: now,
    };

    account.balance = balance_after;
    account.entry_seq += 1;
    account.updated_at = now;

    entry
}

/// Balance effect of an entry
fn entry_delta(kind: EntryKind, amount: Decimal) -> Decimal {
    match kind {
        EntryKind::Credit | EntryKind::Debit | EntryKind::Redeem => amount,
        // Markers record the reserved amount without moving balance
        EntryKind::HoldReserve | EntryKind::HoldRelease => Decimal::ZERO,
    }
}

/// Check the signed amount is coherent with the kind
pub(crate) fn validate_amount(kind: EntryKind, amount: Decimal) -> Result<()> {
    let ok = match kind {
        EntryKind::Credit | EntryKind::HoldReserve | EntryKind::HoldRelease => {
            amount > Decimal::ZERO
        }
        EntryKind::Debit | EntryKind::Redeem => amount < Decimal::ZERO,
    };
    if !ok {
        return Err(Error::InvalidAmount(format!(
            "{:?} entry cannot carry amount {}",
            kind, amount
        )));
    }
    Ok(())
}

/// Check a credit would not push balance over the limit
pub(crate) fn check_max_balance(account: &Account, amount: Decimal) -> Result<()> {
    if let Some(max) = account.limits.max_balance {
        let resulting = account.balance + amount;
        if resulting > max {
            return Err(Error::InvalidState(format!(
                "credit would take account {} to {}, over its max_balance {}",
                account.id, resulting, max
            )));
        }
    }
    Ok(())
}
