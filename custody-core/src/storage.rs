//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Account rows (key: account_id)
//! - `entries` - Append-only entry log (key: entry_id)
//! - `holds` - Reservations (key: hold_id)
//! - `vouchers` - Issued vouchers (key: voucher_id)
//! - `redemptions` - Redemption records (key: redemption_id)
//! - `indices` - Secondary indices for fast lookups
//!
//! # Index key layout (all in `indices`)
//!
//! - `ae:` || account_id || seq_be       -> entry_id     (account entry log, ordered)
//! - `ah:` || account_id || hold_id      -> []           (account holds)
//! - `hv:` || hold_id || voucher_id      -> []           (vouchers drawing on a hold)
//! - `vc:` || code                       -> voucher_id   (unique code lookup)
//! - `ow:` || owner_kind || owner_id     -> account_id   (unique owner lookup)
//! - `bk:` || batch_key                  -> VoucherBatch (batch idempotency record)
//! - `rk:` || redemption_key             -> redemption_id (redemption idempotency)
//! - `vr:` || voucher_id                 -> redemption_id (at most one per voucher)
//!
//! Every multi-row mutation goes through a single `WriteBatch` so a crash can
//! never leave a partial money movement behind.

use crate::{
    error::{Error, Result},
    types::{
        Account, AccountFilter, Hold, HoldStatus, LedgerEntry, OwnerKind, Redemption, Voucher,
        VoucherBatch, VoucherFilter, VoucherStatus,
    },
    Config,
};
use chrono::{DateTime, Utc};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_ENTRIES: &str = "entries";
const CF_HOLDS: &str = "holds";
const CF_VOUCHERS: &str = "vouchers";
const CF_REDEMPTIONS: &str = "redemptions";
const CF_INDICES: &str = "indices";

/// Index key prefixes
const IDX_ACCOUNT_ENTRY: &[u8] = b"ae:";
const IDX_ACCOUNT_HOLD: &[u8] = b"ah:";
const IDX_HOLD_VOUCHER: &[u8] = b"hv:";
const IDX_CODE: &[u8] = b"vc:";
const IDX_OWNER: &[u8] = b"ow:";
const IDX_BATCH_KEY: &[u8] = b"bk:";
const IDX_REDEEM_KEY: &[u8] = b"rk:";
const IDX_VOUCHER_REDEMPTION: &[u8] = b"vr:";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
    // Column family handles are stored in DB, accessed by name
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_level_zero_file_num_compaction_trigger(
            config.rocksdb.level0_file_num_compaction_trigger,
        );

        // Universal compaction for write-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        // Column family descriptors
        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_ENTRIES, Self::cf_options_entries()),
            ColumnFamilyDescriptor::new(CF_HOLDS, Self::cf_options_holds()),
            ColumnFamilyDescriptor::new(CF_VOUCHERS, Self::cf_options_vouchers()),
            ColumnFamilyDescriptor::new(CF_REDEMPTIONS, Self::cf_options_redemptions()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        // Open database
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_accounts() -> Options {
        let mut opts = Options::default();
        // Account rows are frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_entries() -> Options {
        let mut opts = Options::default();
        // Append-only audit log, favor compression ratio
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_holds() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_vouchers() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_redemptions() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Indices benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Iterate keys under a prefix, stopping at the first key outside it
    fn scan_prefix(&self, cf: &ColumnFamily, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut out = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    // Account operations

    /// Create account with its owner index (atomic)
    pub fn create_account_atomic(&self, account: &Account) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        batch.put_cf(cf_accounts, account.id.as_bytes(), bincode::serialize(account)?);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx_owner = Self::index_key_owner(account.owner.kind, &account.owner.id);
        batch.put_cf(cf_indices, &idx_owner, account.id.as_bytes());

        self.db.write(batch)?;

        tracing::debug!(
            account_id = %account.id,
            owner_kind = %account.owner.kind,
            owner_id = %account.owner.id,
            "Account created"
        );

        Ok(())
    }

    /// Put account row (status/limits updates)
    pub fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        self.db
            .put_cf(cf, account.id.as_bytes(), bincode::serialize(account)?)?;
        Ok(())
    }

    /// Get account by ID
    pub fn get_account(&self, account_id: Uuid) -> Result<Account> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;

        let value = self
            .db
            .get_cf(cf, account_id.as_bytes())?
            .ok_or_else(|| Error::AccountNotFound(account_id.to_string()))?;

        let account: Account = bincode::deserialize(&value)?;
        Ok(account)
    }

    /// Find the account owned by an entity, if one exists
    pub fn find_account_by_owner(
        &self,
        kind: OwnerKind,
        owner_id: Uuid,
    ) -> Result<Option<Account>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let key = Self::index_key_owner(kind, &owner_id);

        match self.db.get_cf(cf_indices, &key)? {
            Some(value) => {
                let account_id = Self::uuid_from_slice(&value)?;
                Ok(Some(self.get_account(account_id)?))
            }
            None => Ok(None),
        }
    }

    /// List accounts matching a filter (full scan)
    pub fn list_accounts(&self, filter: &AccountFilter) -> Result<Vec<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;

        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            let account: Account = bincode::deserialize(&value)?;
            if filter.matches(&account) {
                accounts.push(account);
            }
        }
        Ok(accounts)
    }

    // Entry operations

    /// Get entry by ID
    pub fn get_entry(&self, entry_id: Uuid) -> Result<LedgerEntry> {
        let cf = self.cf_handle(CF_ENTRIES)?;

        let value = self
            .db
            .get_cf(cf, entry_id.as_bytes())?
            .ok_or_else(|| Error::Storage(format!("Entry {} not found", entry_id)))?;

        let entry: LedgerEntry = bincode::deserialize(&value)?;
        Ok(entry)
    }

    /// Get an account's entries in log order (via index)
    pub fn get_account_entries(&self, account_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let prefix = Self::index_key_account_entry(&account_id, None);

        let mut entries = Vec::new();
        for (_, value) in self.scan_prefix(cf_indices, &prefix)? {
            let entry_id = Self::uuid_from_slice(&value)?;
            entries.push(self.get_entry(entry_id)?);
        }
        Ok(entries)
    }

    /// Get an account's most recent entries, newest first
    pub fn get_account_entries_desc(
        &self,
        account_id: Uuid,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let prefix = Self::index_key_account_entry(&account_id, None);

        // Seek to the account's highest sequence and walk backwards
        let mut upper = prefix.clone();
        upper.extend_from_slice(&u64::MAX.to_be_bytes());
        let iter = self
            .db
            .iterator_cf(cf_indices, IteratorMode::From(&upper, Direction::Reverse));

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) || entries.len() >= limit {
                break;
            }
            let entry_id = Self::uuid_from_slice(&value)?;
            entries.push(self.get_entry(entry_id)?);
        }
        Ok(entries)
    }

    /// Commit entries with their updated account rows (atomic)
    ///
    /// Used for raw appends (one entry) and transfers (a balanced pair). Each
    /// entry lands in the log, its account-log index, and the materialized
    /// account row in one write.
    pub fn commit_entries_atomic(
        &self,
        entries: &[&LedgerEntry],
        accounts: &[&Account],
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;

        for entry in entries {
            batch.put_cf(cf_entries, entry.id.as_bytes(), bincode::serialize(entry)?);

            let idx = Self::index_key_account_entry(&entry.account_id, Some(entry.seq));
            batch.put_cf(cf_indices, &idx, entry.id.as_bytes());
        }

        for account in accounts {
            batch.put_cf(cf_accounts, account.id.as_bytes(), bincode::serialize(account)?);
        }

        self.db.write(batch)?;
        Ok(())
    }

    // Hold operations

    /// Create hold with its account index (atomic)
    pub fn create_hold_atomic(&self, hold: &Hold) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_holds = self.cf_handle(CF_HOLDS)?;
        batch.put_cf(cf_holds, hold.id.as_bytes(), bincode::serialize(hold)?);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx = Self::index_key_account_hold(&hold.account_id, Some(hold.id));
        batch.put_cf(cf_indices, &idx, &[]);

        self.db.write(batch)?;

        tracing::debug!(
            hold_id = %hold.id,
            account_id = %hold.account_id,
            amount = %hold.amount,
            "Hold created"
        );

        Ok(())
    }

    /// Put hold row (transitions that touch no other row)
    pub fn put_hold(&self, hold: &Hold) -> Result<()> {
        let cf = self.cf_handle(CF_HOLDS)?;
        self.db
            .put_cf(cf, hold.id.as_bytes(), bincode::serialize(hold)?)?;
        Ok(())
    }

    /// Get hold by ID
    pub fn get_hold(&self, hold_id: Uuid) -> Result<Hold> {
        let cf = self.cf_handle(CF_HOLDS)?;

        let value = self
            .db
            .get_cf(cf, hold_id.as_bytes())?
            .ok_or_else(|| Error::HoldNotFound(hold_id.to_string()))?;

        let hold: Hold = bincode::deserialize(&value)?;
        Ok(hold)
    }

    /// Get an account's holds (via index)
    pub fn get_account_holds(&self, account_id: Uuid) -> Result<Vec<Hold>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let prefix = Self::index_key_account_hold(&account_id, None);

        let mut holds = Vec::new();
        for (key, _) in self.scan_prefix(cf_indices, &prefix)? {
            let hold_id = Self::uuid_from_slice(&key[prefix.len()..])?;
            holds.push(self.get_hold(hold_id)?);
        }
        Ok(holds)
    }

    /// Active holds past their expiry at `now` (full scan, bounded)
    pub fn list_expired_active_holds(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Hold>> {
        let cf = self.cf_handle(CF_HOLDS)?;

        let mut holds = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            let hold: Hold = bincode::deserialize(&value)?;
            if hold.status == HoldStatus::Active && hold.is_expired(now) {
                holds.push(hold);
                if holds.len() >= limit {
                    break;
                }
            }
        }
        Ok(holds)
    }

    // Voucher operations

    /// Commit a voucher batch: batch record, voucher rows, code and hold
    /// indices (atomic)
    pub fn create_voucher_batch_atomic(
        &self,
        batch_record: &VoucherBatch,
        vouchers: &[Voucher],
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_vouchers = self.cf_handle(CF_VOUCHERS)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        for voucher in vouchers {
            batch.put_cf(cf_vouchers, voucher.id.as_bytes(), bincode::serialize(voucher)?);

            let idx_code = Self::index_key_code(&voucher.code);
            batch.put_cf(cf_indices, &idx_code, voucher.id.as_bytes());

            let idx_hold = Self::index_key_hold_voucher(&voucher.hold_id, Some(voucher.id));
            batch.put_cf(cf_indices, &idx_hold, &[]);
        }

        let idx_batch = Self::index_key_batch(&batch_record.idempotency_key);
        batch.put_cf(cf_indices, &idx_batch, bincode::serialize(batch_record)?);

        self.db.write(batch)?;

        tracing::debug!(
            batch_id = %batch_record.batch_id,
            hold_id = %batch_record.hold_id,
            count = batch_record.count,
            "Voucher batch committed"
        );

        Ok(())
    }

    /// Get voucher by ID
    pub fn get_voucher(&self, voucher_id: Uuid) -> Result<Voucher> {
        let cf = self.cf_handle(CF_VOUCHERS)?;

        let value = self
            .db
            .get_cf(cf, voucher_id.as_bytes())?
            .ok_or_else(|| Error::VoucherNotFound(voucher_id.to_string()))?;

        let voucher: Voucher = bincode::deserialize(&value)?;
        Ok(voucher)
    }

    /// Find a voucher by canonical code, if one exists
    pub fn find_voucher_by_code(&self, code: &str) -> Result<Option<Voucher>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let key = Self::index_key_code(code);

        match self.db.get_cf(cf_indices, &key)? {
            Some(value) => {
                let voucher_id = Self::uuid_from_slice(&value)?;
                Ok(Some(self.get_voucher(voucher_id)?))
            }
            None => Ok(None),
        }
    }

    /// Get the vouchers drawing on a hold (via index)
    pub fn get_hold_vouchers(&self, hold_id: Uuid) -> Result<Vec<Voucher>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let prefix = Self::index_key_hold_voucher(&hold_id, None);

        let mut vouchers = Vec::new();
        for (key, _) in self.scan_prefix(cf_indices, &prefix)? {
            let voucher_id = Self::uuid_from_slice(&key[prefix.len()..])?;
            vouchers.push(self.get_voucher(voucher_id)?);
        }
        Ok(vouchers)
    }

    /// List vouchers matching a filter (full scan)
    pub fn list_vouchers(&self, filter: &VoucherFilter) -> Result<Vec<Voucher>> {
        let cf = self.cf_handle(CF_VOUCHERS)?;

        let mut vouchers = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            let voucher: Voucher = bincode::deserialize(&value)?;
            if filter.matches(&voucher) {
                vouchers.push(voucher);
            }
        }
        Ok(vouchers)
    }

    /// Active vouchers past their expiry at `now` (full scan, bounded)
    pub fn list_expired_active_vouchers(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Voucher>> {
        let cf = self.cf_handle(CF_VOUCHERS)?;

        let mut vouchers = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            let voucher: Voucher = bincode::deserialize(&value)?;
            if voucher.status == VoucherStatus::Active && voucher.is_expired(now) {
                vouchers.push(voucher);
                if vouchers.len() >= limit {
                    break;
                }
            }
        }
        Ok(vouchers)
    }

    /// Close a voucher together with its hold share (atomic)
    ///
    /// Used for voids and expiries, which move no money but must keep the
    /// voucher row and the hold's released share consistent.
    pub fn close_voucher_atomic(&self, voucher: &Voucher, hold: &Hold) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_vouchers = self.cf_handle(CF_VOUCHERS)?;
        batch.put_cf(cf_vouchers, voucher.id.as_bytes(), bincode::serialize(voucher)?);

        let cf_holds = self.cf_handle(CF_HOLDS)?;
        batch.put_cf(cf_holds, hold.id.as_bytes(), bincode::serialize(hold)?);

        self.db.write(batch)?;
        Ok(())
    }

    /// Look up a stored batch by idempotency key
    pub fn get_batch_by_key(&self, idempotency_key: &str) -> Result<Option<VoucherBatch>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let key = Self::index_key_batch(idempotency_key);

        match self.db.get_cf(cf_indices, &key)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    // Redemption operations

    /// Commit a redemption (atomic)
    ///
    /// One write covers the voucher transition, the hold's consumed share,
    /// the redemption record, both ledger legs with their updated account
    /// rows, and both idempotency markers. Either the redemption happened
    /// entirely or not at all.
    #[allow(clippy::too_many_arguments)]
    pub fn commit_redemption_atomic(
        &self,
        voucher: &Voucher,
        hold: &Hold,
        redemption: &Redemption,
        issuer_entry: &LedgerEntry,
        redeemer_entry: &LedgerEntry,
        issuer_account: &Account,
        redeemer_account: &Account,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_vouchers = self.cf_handle(CF_VOUCHERS)?;
        batch.put_cf(cf_vouchers, voucher.id.as_bytes(), bincode::serialize(voucher)?);

        let cf_holds = self.cf_handle(CF_HOLDS)?;
        batch.put_cf(cf_holds, hold.id.as_bytes(), bincode::serialize(hold)?);

        let cf_redemptions = self.cf_handle(CF_REDEMPTIONS)?;
        batch.put_cf(
            cf_redemptions,
            redemption.id.as_bytes(),
            bincode::serialize(redemption)?,
        );

        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;
        for entry in [issuer_entry, redeemer_entry] {
            batch.put_cf(cf_entries, entry.id.as_bytes(), bincode::serialize(entry)?);
            let idx = Self::index_key_account_entry(&entry.account_id, Some(entry.seq));
            batch.put_cf(cf_indices, &idx, entry.id.as_bytes());
        }

        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        for account in [issuer_account, redeemer_account] {
            batch.put_cf(cf_accounts, account.id.as_bytes(), bincode::serialize(account)?);
        }

        let idx_key = Self::index_key_redeem(&redemption.idempotency_key);
        batch.put_cf(cf_indices, &idx_key, redemption.id.as_bytes());

        let idx_voucher = Self::index_key_voucher_redemption(&voucher.id);
        batch.put_cf(cf_indices, &idx_voucher, redemption.id.as_bytes());

        self.db.write(batch)?;

        tracing::debug!(
            redemption_id = %redemption.id,
            voucher_id = %voucher.id,
            redeemer = %redemption.redeemer_account_id,
            amount = %redemption.amount,
            "Redemption committed"
        );

        Ok(())
    }

    /// Get redemption by ID
    pub fn get_redemption(&self, redemption_id: Uuid) -> Result<Redemption> {
        let cf = self.cf_handle(CF_REDEMPTIONS)?;

        let value = self
            .db
            .get_cf(cf, redemption_id.as_bytes())?
            .ok_or_else(|| Error::Storage(format!("Redemption {} not found", redemption_id)))?;

        let redemption: Redemption = bincode::deserialize(&value)?;
        Ok(redemption)
    }

    /// Resolve a redemption idempotency key to its stored redemption
    pub fn find_redemption_by_key(&self, idempotency_key: &str) -> Result<Option<Redemption>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let key = Self::index_key_redeem(idempotency_key);

        match self.db.get_cf(cf_indices, &key)? {
            Some(value) => {
                let redemption_id = Self::uuid_from_slice(&value)?;
                Ok(Some(self.get_redemption(redemption_id)?))
            }
            None => Ok(None),
        }
    }

    /// Resolve the at-most-one redemption of a voucher
    pub fn find_redemption_for_voucher(&self, voucher_id: Uuid) -> Result<Option<Redemption>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let key = Self::index_key_voucher_redemption(&voucher_id);

        match self.db.get_cf(cf_indices, &key)? {
            Some(value) => {
                let redemption_id = Self::uuid_from_slice(&value)?;
                Ok(Some(self.get_redemption(redemption_id)?))
            }
            None => Ok(None),
        }
    }

    // Index key helpers

    fn index_key_account_entry(account_id: &Uuid, seq: Option<u64>) -> Vec<u8> {
        let mut key = IDX_ACCOUNT_ENTRY.to_vec();
        key.extend_from_slice(account_id.as_bytes());
        if let Some(seq) = seq {
            key.extend_from_slice(&seq.to_be_bytes());
        }
        key
    }

    fn index_key_account_hold(account_id: &Uuid, hold_id: Option<Uuid>) -> Vec<u8> {
        let mut key = IDX_ACCOUNT_HOLD.to_vec();
        key.extend_from_slice(account_id.as_bytes());
        if let Some(hid) = hold_id {
            key.extend_from_slice(hid.as_bytes());
        }
        key
    }

    fn index_key_hold_voucher(hold_id: &Uuid, voucher_id: Option<Uuid>) -> Vec<u8> {
        let mut key = IDX_HOLD_VOUCHER.to_vec();
        key.extend_from_slice(hold_id.as_bytes());
        if let Some(vid) = voucher_id {
            key.extend_from_slice(vid.as_bytes());
        }
        key
    }

    fn index_key_code(code: &str) -> Vec<u8> {
        let mut key = IDX_CODE.to_vec();
        key.extend_from_slice(code.as_bytes());
        key
    }

    fn index_key_owner(kind: OwnerKind, owner_id: &Uuid) -> Vec<u8> {
        let mut key = IDX_OWNER.to_vec();
        key.push(kind as u8);
        key.extend_from_slice(owner_id.as_bytes());
        key
    }

    fn index_key_batch(idempotency_key: &str) -> Vec<u8> {
        let mut key = IDX_BATCH_KEY.to_vec();
        key.extend_from_slice(idempotency_key.as_bytes());
        key
    }

    fn index_key_redeem(idempotency_key: &str) -> Vec<u8> {
        let mut key = IDX_REDEEM_KEY.to_vec();
        key.extend_from_slice(idempotency_key.as_bytes());
        key
    }

    fn index_key_voucher_redemption(voucher_id: &Uuid) -> Vec<u8> {
        let mut key = IDX_VOUCHER_REDEMPTION.to_vec();
        key.extend_from_slice(voucher_id.as_bytes());
        key
    }

    fn uuid_from_slice(bytes: &[u8]) -> Result<Uuid> {
        Uuid::from_slice(bytes)
            .map_err(|e| Error::Storage(format!("Malformed uuid in index: {}", e)))
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_accounts: self.approximate_count(self.cf_handle(CF_ACCOUNTS)?)?,
            total_entries: self.approximate_count(self.cf_handle(CF_ENTRIES)?)?,
            total_holds: self.approximate_count(self.cf_handle(CF_HOLDS)?)?,
            total_vouchers: self.approximate_count(self.cf_handle(CF_VOUCHERS)?)?,
            total_redemptions: self.approximate_count(self.cf_handle(CF_REDEMPTIONS)?)?,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        // RocksDB property for approximate count
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub total_accounts: u64,
    pub total_entries: u64,
    pub total_holds: u64,
    pub total_vouchers: u64,
    pub total_redemptions: u64,
}
