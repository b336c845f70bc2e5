//! Core types for the custody ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for money)
//!
//! Balance and available funds are derived quantities. The entry log is the
//! source of truth; `Account::balance` and `LedgerEntry::balance_after` are
//! materialized optimization columns maintained in the same atomic write.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of entity that owns a custodial account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OwnerKind {
    /// Issuer-side treasury and operational accounts
    System = 1,
    /// Merchant wallet
    Merchant = 2,
    /// Field agent float wallet
    Agent = 3,
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OwnerKind::System => "system",
            OwnerKind::Merchant => "merchant",
            OwnerKind::Agent => "agent",
        };
        write!(f, "{}", s)
    }
}

/// Owner of an account: kind plus the owning entity's id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    /// Owner kind
    pub kind: OwnerKind,
    /// Id of the owning entity (nil for shared system accounts)
    pub id: Uuid,
}

impl OwnerRef {
    /// Create a new owner reference
    pub fn new(kind: OwnerKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    /// Shared system owner (treasury)
    pub fn system() -> Self {
        Self {
            kind: OwnerKind::System,
            id: Uuid::nil(),
        }
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AccountStatus {
    /// Fully operational
    Active = 1,
    /// Debits, reservations, and redemptions blocked; credits still land
    Suspended = 2,
    /// Terminal; no operations accepted
    Closed = 3,
}

/// Per-account limits configuration
///
/// `None` means unlimited. Limits are validated on update and enforced by the
/// transfer engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLimits {
    /// Ceiling on the materialized balance after a credit
    pub max_balance: Option<Decimal>,
    /// Ceiling on a single debit amount
    pub max_debit: Option<Decimal>,
}

impl AccountLimits {
    /// Validate the payload
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(max) = self.max_balance {
            if max < Decimal::ZERO {
                return Err(crate::Error::InvalidConfiguration(format!(
                    "max_balance must be non-negative, got {}",
                    max
                )));
            }
        }
        if let Some(max) = self.max_debit {
            if max <= Decimal::ZERO {
                return Err(crate::Error::InvalidConfiguration(format!(
                    "max_debit must be positive, got {}",
                    max
                )));
            }
        }
        Ok(())
    }
}

/// Custodial wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique account id
    pub id: Uuid,

    /// Owning entity
    pub owner: OwnerRef,

    /// Current status
    pub status: AccountStatus,

    /// Limits configuration
    pub limits: AccountLimits,

    /// Materialized running balance (optimization column; the entry log is
    /// authoritative)
    pub balance: Decimal,

    /// Sequence number the next entry on this account will take
    pub entry_seq: u64,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new active account with zero balance
    pub fn new(owner: OwnerRef, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            status: AccountStatus::Active,
            limits: AccountLimits::default(),
            balance: Decimal::ZERO,
            entry_seq: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Account accepts incoming credits
    pub fn accepts_credits(&self) -> bool {
        matches!(self.status, AccountStatus::Active | AccountStatus::Suspended)
    }

    /// Account may spend (debit, reserve, redeem as redeemer)
    pub fn may_spend(&self) -> bool {
        matches!(self.status, AccountStatus::Active)
    }
}

/// Ledger entry kind
///
/// `HoldReserve` and `HoldRelease` are audit vocabulary reachable through the
/// raw append operation; holds do not move balance, so the built-in flows
/// never write them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryKind {
    /// Money in
    Credit = 1,
    /// Money out
    Debit = 2,
    /// Reservation marker (audit only)
    HoldReserve = 3,
    /// Reservation release marker (audit only)
    HoldRelease = 4,
    /// Issuer-side debit backing a voucher redemption
    Redeem = 5,
}

/// Structured links from an entry to related rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// The paired entry on the other account of a transfer/redemption
    pub counter_entry: Option<Uuid>,
    /// Shared id linking both legs of one transfer
    pub transfer: Option<Uuid>,
    /// Hold this entry settles against
    pub hold: Option<Uuid>,
    /// Voucher this entry settles
    pub voucher: Option<Uuid>,
    /// Redemption row recording this settlement
    pub redemption: Option<Uuid>,
}

/// One immutable money-movement record on one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry id (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Account this entry belongs to
    pub account_id: Uuid,

    /// Position in the account's entry log (dense, starting at 0)
    pub seq: u64,

    /// Movement kind
    pub kind: EntryKind,

    /// Signed amount (credits positive, debits negative)
    pub amount: Decimal,

    /// Human-readable reason, stored verbatim for audit
    pub reason: String,

    /// Structured links to counter-entry/hold/voucher/redemption rows
    pub meta: EntryMeta,

    /// Materialized balance after applying this entry (optimization column)
    pub balance_after: Decimal,

    /// Caller identity recorded for audit
    pub created_by: String,

    /// Entry timestamp
    pub created_at: DateTime<Utc>,
}

/// Hold status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum HoldStatus {
    /// Reservation in force; reduces available
    Active = 1,
    /// Closed with at least one share redeemed
    Consumed = 2,
    /// Closed by void/release before any redemption
    Released = 3,
    /// Closed by expiry before any redemption
    Expired = 4,
}

impl HoldStatus {
    /// Terminal statuses never transition again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, HoldStatus::Active)
    }
}

/// What a hold reserves funds for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReferenceKind {
    /// A voucher batch draws down this hold as codes settle
    VoucherBatch = 1,
    /// Operator-placed reservation with no batch behind it
    Manual = 2,
}

/// Reference from a hold to the thing it backs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldReference {
    /// Reference kind
    pub kind: ReferenceKind,
    /// Referenced id (batch id for voucher batches)
    pub id: Uuid,
}

/// Why a hold share is being released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseCause {
    /// Administrator voided the voucher (or released the hold)
    Void,
    /// The voucher passed its expiry
    Expiry,
}

/// Reservation removing funds from available without leaving balance
///
/// Shares are settled per voucher: redemptions consume, voids and expiries
/// release. The hold closes when no share remains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    /// Unique hold id
    pub id: Uuid,

    /// Account whose funds are reserved
    pub account_id: Uuid,

    /// Total reserved amount
    pub amount: Decimal,

    /// Portion settled by redemptions
    pub consumed_amount: Decimal,

    /// Portion returned by voids/expiries
    pub released_amount: Decimal,

    /// Human-readable purpose, stored verbatim for audit
    pub purpose: String,

    /// What this hold backs
    pub reference: HoldReference,

    /// Current status
    pub status: HoldStatus,

    /// Optional expiry
    pub expires_at: Option<DateTime<Utc>>,

    /// Caller identity recorded for audit
    pub created_by: String,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Hold {
    /// Reserved amount still outstanding
    pub fn remaining(&self) -> Decimal {
        self.amount - self.consumed_amount - self.released_amount
    }

    /// Consume a share of the reservation (redemption settled)
    ///
    /// Closes the hold as `Consumed` when nothing remains.
    pub fn consume_share(&mut self, share: Decimal) -> crate::Result<()> {
        if self.status != HoldStatus::Active {
            return Err(crate::Error::InvalidState(format!(
                "hold {} is {:?}, cannot consume",
                self.id, self.status
            )));
        }
        if share <= Decimal::ZERO || share > self.remaining() {
            return Err(crate::Error::InvalidAmount(format!(
                "share {} outside remaining reservation {}",
                share,
                self.remaining()
            )));
        }
        self.consumed_amount += share;
        if self.remaining() == Decimal::ZERO {
            self.status = HoldStatus::Consumed;
        }
        Ok(())
    }

    /// Release a share of the reservation (voucher voided or expired)
    ///
    /// When nothing remains the hold closes as `Consumed` if any share was
    /// redeemed, otherwise `Released` or `Expired` per the final cause.
    pub fn release_share(&mut self, share: Decimal, cause: ReleaseCause) -> crate::Result<()> {
        if self.status != HoldStatus::Active {
            return Err(crate::Error::InvalidState(format!(
                "hold {} is {:?}, cannot release",
                self.id, self.status
            )));
        }
        if share <= Decimal::ZERO || share > self.remaining() {
            return Err(crate::Error::InvalidAmount(format!(
                "share {} outside remaining reservation {}",
                share,
                self.remaining()
            )));
        }
        self.released_amount += share;
        if self.remaining() == Decimal::ZERO {
            self.status = if self.consumed_amount > Decimal::ZERO {
                HoldStatus::Consumed
            } else {
                match cause {
                    ReleaseCause::Void => HoldStatus::Released,
                    ReleaseCause::Expiry => HoldStatus::Expired,
                }
            };
        }
        Ok(())
    }

    /// Hold is past its expiry at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }
}

/// Restriction on who may redeem a voucher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Eligibility {
    /// Any active account
    Any,
    /// Only the account owned by this agent
    Agent(Uuid),
    /// Only the account owned by this merchant
    Merchant(Uuid),
}

impl Eligibility {
    /// Whether an account owner satisfies the restriction
    pub fn permits(&self, owner: &OwnerRef) -> bool {
        match self {
            Eligibility::Any => true,
            Eligibility::Agent(id) => owner.kind == OwnerKind::Agent && owner.id == *id,
            Eligibility::Merchant(id) => owner.kind == OwnerKind::Merchant && owner.id == *id,
        }
    }
}

/// Voucher status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum VoucherStatus {
    /// Redeemable
    Active = 1,
    /// Settled exactly once
    Redeemed = 2,
    /// Cancelled by an administrator
    Voided = 3,
    /// Passed expiry before redemption
    Expired = 4,
}

impl VoucherStatus {
    /// Terminal statuses never transition again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VoucherStatus::Active)
    }
}

/// One single-use, checksum-protected redeemable code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    /// Unique voucher id
    pub id: Uuid,

    /// Redeemable code (`FS-XXXX-YYYY`)
    pub code: String,

    /// Keyed MAC of the code, 8 chars base-36
    pub checksum: String,

    /// Account whose reserved funds back this voucher
    pub issuer_account_id: Uuid,

    /// Hold backing this voucher's face amount
    pub hold_id: Uuid,

    /// Face amount
    pub amount: Decimal,

    /// Human-readable purpose, stored verbatim for audit
    pub purpose: String,

    /// Who may redeem
    pub eligibility: Eligibility,

    /// Current status
    pub status: VoucherStatus,

    /// Optional expiry (checked at redemption and by the sweep)
    pub expires_at: Option<DateTime<Utc>>,

    /// Batch this voucher was issued under
    pub batch_id: Uuid,

    /// Caller-supplied idempotency key of the batch
    pub batch_key: String,

    /// Why the voucher was voided, stored verbatim for audit
    pub voided_reason: Option<String>,

    /// Caller identity recorded for audit
    pub created_by: String,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Voucher {
    /// Voucher is past its expiry at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }
}

/// Stored result of an idempotent batch creation
///
/// A retried `create` with the same key returns this batch's vouchers and
/// hold unchanged, with no new money movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherBatch {
    /// Unique batch id
    pub batch_id: Uuid,

    /// Caller-supplied idempotency key
    pub idempotency_key: String,

    /// Issuing account
    pub issuer_account_id: Uuid,

    /// Hold reserving the batch's total value
    pub hold_id: Uuid,

    /// Vouchers issued under this batch
    pub voucher_ids: Vec<Uuid>,

    /// Number of vouchers
    pub count: u32,

    /// Face amount of each voucher
    pub amount_each: Decimal,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// Optional capture location of a redemption
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lng: f64,
}

/// One successful redemption
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redemption {
    /// Unique redemption id
    pub id: Uuid,

    /// Redeemed voucher
    pub voucher_id: Uuid,

    /// Account credited with the face amount
    pub redeemer_account_id: Uuid,

    /// Face amount moved
    pub amount: Decimal,

    /// Where the redemption was captured, if reported
    pub location: Option<GeoPoint>,

    /// Caller identity recorded for audit
    pub redeemed_by: String,

    /// Caller-supplied idempotency key
    pub idempotency_key: String,

    /// Redemption timestamp
    pub created_at: DateTime<Utc>,
}

/// Filter for account listings
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountFilter {
    /// Restrict to one owner kind
    pub owner_kind: Option<OwnerKind>,
    /// Restrict to one status
    pub status: Option<AccountStatus>,
}

impl AccountFilter {
    /// Whether an account passes this filter
    pub fn matches(&self, account: &Account) -> bool {
        self.owner_kind.is_none_or(|k| account.owner.kind == k)
            && self.status.is_none_or(|s| account.status == s)
    }
}

/// Filter for voucher listings
#[derive(Debug, Clone, Default)]
pub struct VoucherFilter {
    /// Restrict to one issuer account
    pub issuer_account_id: Option<Uuid>,
    /// Restrict to one status
    pub status: Option<VoucherStatus>,
    /// Restrict to one batch key
    pub batch_key: Option<String>,
}

impl VoucherFilter {
    /// Whether a voucher passes this filter
    pub fn matches(&self, voucher: &Voucher) -> bool {
        self.issuer_account_id
            .is_none_or(|id| voucher.issuer_account_id == id)
            && self.status.is_none_or(|s| voucher.status == s)
            && self
                .batch_key
                .as_deref()
                .is_none_or(|k| voucher.batch_key == k)
    }
}
