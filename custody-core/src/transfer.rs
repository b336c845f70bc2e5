//! Transfer engine: credits, debits, and float assignment
//!
//! Credits and debits move money across the system boundary (cash handed to
//! or by a teller); each writes one entry. Float assignment moves money from
//! a funding account, usually the treasury, to a field agent and writes a
//! balanced pair of entries that reference each other, committed in one
//! write.
//!
//! All checks and the commit run on the writer task, so an available-funds
//! check cannot race another spend.

use crate::{
    ledger,
    storage::Storage,
    types::{Account, EntryKind, EntryMeta, LedgerEntry, OwnerKind},
    Error, Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// The two legs of a completed float assignment
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Shared id linking both legs
    pub transfer_id: Uuid,
    /// Source-side debit
    pub debit: LedgerEntry,
    /// Agent-side credit
    pub credit: LedgerEntry,
}

/// Credit an account (money entering the system)
pub fn credit(
    storage: &Storage,
    account_id: Uuid,
    amount: Decimal,
    reason: String,
    created_by: String,
    now: DateTime<Utc>,
) -> Result<LedgerEntry> {
    require_positive(amount)?;

    let mut account = storage.get_account(account_id)?;
    if !account.accepts_credits() {
        return Err(Error::InvalidState(format!(
            "account {} does not accept credits",
            account_id
        )));
    }
    ledger::check_max_balance(&account, amount)?;

    let entry = ledger::next_entry(
        &mut account,
        EntryKind::Credit,
        amount,
        reason,
        EntryMeta::default(),
        created_by,
        now,
    );
    storage.commit_entries_atomic(&[&entry], &[&account])?;

    tracing::info!(
        account_id = %account_id,
        entry_id = %entry.id,
        amount = %amount,
        "Credit applied"
    );

    Ok(entry)
}

/// Debit an account (money leaving the system)
///
/// Fails with `InsufficientFunds` when the amount exceeds available funds,
/// which excludes anything reserved under active holds.
pub fn debit(
    storage: &Storage,
    account_id: Uuid,
    amount: Decimal,
    reason: String,
    created_by: String,
    now: DateTime<Utc>,
) -> Result<LedgerEntry> {
    require_positive(amount)?;

    let mut account = storage.get_account(account_id)?;
    check_spend(storage, &account, amount)?;

    let entry = ledger::next_entry(
        &mut account,
        EntryKind::Debit,
        -amount,
        reason,
        EntryMeta::default(),
        created_by,
        now,
    );
    storage.commit_entries_atomic(&[&entry], &[&account])?;

    tracing::info!(
        account_id = %account_id,
        entry_id = %entry.id,
        amount = %amount,
        "Debit applied"
    );

    Ok(entry)
}

/// Move float from a funding account to an agent's account
///
/// The agent is addressed by owner id; the source by account id, so a
/// super-agent's own account can fund a downstream agent as readily as the
/// treasury. Writes a balanced debit/credit pair sharing one transfer id,
/// each leg linking the other through its meta, in a single atomic write.
pub fn assign_float(
    storage: &Storage,
    agent_owner_id: Uuid,
    amount: Decimal,
    source_account_id: Uuid,
    reason: String,
    created_by: String,
    now: DateTime<Utc>,
) -> Result<TransferOutcome> {
    require_positive(amount)?;

    let mut source = storage.get_account(source_account_id)?;
    let mut agent = storage
        .find_account_by_owner(OwnerKind::Agent, agent_owner_id)?
        .ok_or_else(|| {
            Error::AccountNotFound(format!("no agent account for owner {}", agent_owner_id))
        })?;

    if source.id == agent.id {
        return Err(Error::InvalidState(format!(
            "account {} cannot fund its own float",
            source.id
        )));
    }
    if !agent.accepts_credits() {
        return Err(Error::InvalidState(format!(
            "agent account {} does not accept credits",
            agent.id
        )));
    }
    ledger::check_max_balance(&agent, amount)?;
    check_spend(storage, &source, amount)?;

    let transfer_id = Uuid::new_v4();
    let base_meta = EntryMeta {
        transfer: Some(transfer_id),
        ..Default::default()
    };

    let mut debit_entry = ledger::next_entry(
        &mut source,
        EntryKind::Debit,
        -amount,
        reason.clone(),
        base_meta.clone(),
        created_by.clone(),
        now,
    );
    let mut credit_entry = ledger::next_entry(
        &mut agent,
        EntryKind::Credit,
        amount,
        reason,
        base_meta,
        created_by,
        now,
    );
    debit_entry.meta.counter_entry = Some(credit_entry.id);
    credit_entry.meta.counter_entry = Some(debit_entry.id);

    storage.commit_entries_atomic(&[&debit_entry, &credit_entry], &[&source, &agent])?;

    tracing::info!(
        transfer_id = %transfer_id,
        agent_owner_id = %agent_owner_id,
        source_account_id = %source_account_id,
        amount = %amount,
        "Float assigned"
    );

    Ok(TransferOutcome {
        transfer_id,
        debit: debit_entry,
        credit: credit_entry,
    })
}

/// Shared spend checks: status, per-debit limit, available funds
fn check_spend(storage: &Storage, account: &Account, amount: Decimal) -> Result<()> {
    if !account.may_spend() {
        return Err(Error::InvalidState(format!(
            "account {} cannot be debited",
            account.id
        )));
    }
    if let Some(max) = account.limits.max_debit {
        if amount > max {
            return Err(Error::InvalidAmount(format!(
                "debit {} exceeds the account's max_debit {}",
                amount, max
            )));
        }
    }
    let available = ledger::available_of(storage, account)?;
    if amount > available {
        return Err(Error::InsufficientFunds {
            requested: amount,
            available,
        });
    }
    Ok(())
}

fn require_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}
