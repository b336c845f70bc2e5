//! End-to-end scenarios across the custody API
//!
//! These tests exercise the public `Custody` surface and verify the core
//! invariants:
//! - Conservation: account balances always equal the folded entry logs
//! - No overdraw: concurrent spends never push available funds negative
//! - Exactly-once: a voucher settles once; replays return the stored result
//! - Reservation: voucher value stays held from issuance to settlement

use custody_core::{
    holds::ReserveParams,
    redeem::RedeemParams,
    types::{AccountFilter, HoldReference, ReferenceKind},
    voucher::CreateVouchersParams,
    Config, Custody, Eligibility, Error, HoldStatus, OwnerKind, VoucherStatus,
};
use chrono::{Duration, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Create custody core over a temp directory
async fn create_test_custody() -> (Custody, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    config.voucher.code_secret = "scenario-secret".to_string();

    (Custody::open(config).await.unwrap(), temp_dir)
}

fn manual_reference() -> HoldReference {
    HoldReference {
        kind: ReferenceKind::Manual,
        id: Uuid::new_v4(),
    }
}

#[tokio::test]
async fn test_field_payout_day() {
    let (custody, _temp) = create_test_custody().await;
    let now = Utc::now();

    // Treasury funding and agent float
    let treasury = custody.treasury_account().unwrap();
    custody
        .credit(treasury.id, Decimal::from(10_000), "program funding".into(), "ops".into())
        .await
        .unwrap();

    let agent = custody
        .ensure_account(OwnerKind::Agent, Uuid::new_v4())
        .await
        .unwrap();
    custody
        .assign_float(
            agent.owner.id,
            Decimal::from(1_000),
            treasury.id,
            "weekly float".into(),
            "ops".into(),
        )
        .await
        .unwrap();

    let merchant = custody
        .ensure_account(OwnerKind::Merchant, Uuid::new_v4())
        .await
        .unwrap();

    // Agent pre-issues three vouchers against their float
    let batch = custody
        .create_vouchers(CreateVouchersParams {
            issuer_account_id: agent.id,
            count: 3,
            amount_each: Decimal::from(100),
            purpose: "relief payout".to_string(),
            eligibility: Eligibility::Any,
            expires_at: Some(now + Duration::days(7)),
            idempotency_key: "day1-batch".to_string(),
            created_by: "agent-app".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(batch.vouchers.len(), 3);
    assert_eq!(custody.get_available(agent.id).unwrap(), Decimal::from(700));

    // One voucher is redeemed at a merchant
    custody
        .redeem(RedeemParams {
            code: batch.vouchers[0].code.clone(),
            checksum: batch.vouchers[0].checksum.clone(),
            redeemer_account_id: merchant.id,
            location: None,
            idempotency_key: "day1-r1".to_string(),
            redeemed_by: "merchant-app".to_string(),
        })
        .await
        .unwrap();

    // One is voided before it leaves the office
    custody
        .void_voucher(batch.vouchers[1].id, "printed twice".to_string())
        .await
        .unwrap();
    assert!(matches!(
        custody
            .redeem(RedeemParams {
                code: batch.vouchers[1].code.clone(),
                checksum: batch.vouchers[1].checksum.clone(),
                redeemer_account_id: merchant.id,
                location: None,
                idempotency_key: "day1-r2".to_string(),
                redeemed_by: "merchant-app".to_string(),
            })
            .await,
        Err(Error::InvalidState(_))
    ));

    // The last one lapses and the sweep picks it up
    let report = custody
        .expire_due(now + Duration::days(8), 100)
        .await
        .unwrap();
    assert_eq!(report.vouchers_expired, 1);
    assert_eq!(report.value_released, Decimal::from(100));

    let lapsed = custody.get_voucher(batch.vouchers[2].id).unwrap();
    assert_eq!(lapsed.status, VoucherStatus::Expired);
    assert!(matches!(
        custody
            .redeem(RedeemParams {
                code: batch.vouchers[2].code.clone(),
                checksum: batch.vouchers[2].checksum.clone(),
                redeemer_account_id: merchant.id,
                location: None,
                idempotency_key: "day1-r3".to_string(),
                redeemed_by: "merchant-app".to_string(),
            })
            .await,
        Err(Error::Expired(_))
    ));

    // Hold settled mixed: one share consumed, two returned
    let hold = custody.get_hold(batch.batch.hold_id).unwrap();
    assert_eq!(hold.status, HoldStatus::Consumed);
    assert_eq!(hold.consumed_amount, Decimal::from(100));
    assert_eq!(hold.released_amount, Decimal::from(200));
    assert_eq!(hold.remaining(), Decimal::ZERO);

    // Money is conserved across the whole book
    assert_eq!(custody.get_balance(treasury.id).unwrap(), Decimal::from(9_000));
    assert_eq!(custody.get_balance(agent.id).unwrap(), Decimal::from(900));
    assert_eq!(custody.get_balance(merchant.id).unwrap(), Decimal::from(100));
    assert_eq!(custody.get_available(agent.id).unwrap(), Decimal::from(900));

    for account in custody.list_accounts(&AccountFilter::default()).unwrap() {
        let audit = custody.verify_account(account.id).unwrap();
        assert!(audit.consistent, "log mismatch for account {}", account.id);
    }

    // Counters saw the same story
    let metrics = custody.metrics();
    assert_eq!(metrics.vouchers_issued_total.get(), 3);
    assert_eq!(metrics.vouchers_redeemed_total.get(), 1);
    assert_eq!(metrics.vouchers_expired_total.get(), 1);

    custody.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_batch_creation_replays_without_new_reservation() {
    let (custody, _temp) = create_test_custody().await;

    let agent = custody
        .ensure_account(OwnerKind::Agent, Uuid::new_v4())
        .await
        .unwrap();
    custody
        .credit(agent.id, Decimal::from(500), "seed".into(), "tester".into())
        .await
        .unwrap();

    let params = CreateVouchersParams {
        issuer_account_id: agent.id,
        count: 2,
        amount_each: Decimal::from(100),
        purpose: "payout".to_string(),
        eligibility: Eligibility::Any,
        expires_at: None,
        idempotency_key: "retry-1".to_string(),
        created_by: "agent-app".to_string(),
    };

    let first = custody.create_vouchers(params.clone()).await.unwrap();
    assert!(!first.reused);
    assert_eq!(custody.get_available(agent.id).unwrap(), Decimal::from(300));

    // The retry returns the stored batch, reserving nothing further
    let replay = custody.create_vouchers(params).await.unwrap();
    assert!(replay.reused);
    assert_eq!(replay.batch.batch_id, first.batch.batch_id);
    let mut original: Vec<_> = first.vouchers.iter().map(|v| v.code.clone()).collect();
    let mut replayed: Vec<_> = replay.vouchers.iter().map(|v| v.code.clone()).collect();
    original.sort();
    replayed.sort();
    assert_eq!(original, replayed);

    assert_eq!(custody.get_available(agent.id).unwrap(), Decimal::from(300));
    assert_eq!(custody.get_account_holds(agent.id).unwrap().len(), 1);

    // A different key is a different batch
    let second = custody
        .create_vouchers(CreateVouchersParams {
            issuer_account_id: agent.id,
            count: 2,
            amount_each: Decimal::from(100),
            purpose: "payout".to_string(),
            eligibility: Eligibility::Any,
            expires_at: None,
            idempotency_key: "retry-2".to_string(),
            created_by: "agent-app".to_string(),
        })
        .await
        .unwrap();
    assert!(!second.reused);
    assert_eq!(custody.get_available(agent.id).unwrap(), Decimal::from(100));

    custody.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cash_out_to_zero_then_overdraft_refused() {
    let (custody, _temp) = create_test_custody().await;

    let merchant = custody
        .ensure_account(OwnerKind::Merchant, Uuid::new_v4())
        .await
        .unwrap();
    custody
        .credit(merchant.id, Decimal::from(80), "sales".into(), "teller".into())
        .await
        .unwrap();
    custody
        .debit(merchant.id, Decimal::from(80), "cash out".into(), "teller".into())
        .await
        .unwrap();
    assert_eq!(custody.get_balance(merchant.id).unwrap(), Decimal::ZERO);

    let err = custody
        .debit(merchant.id, Decimal::from(1), "cash out".into(), "teller".into())
        .await
        .unwrap_err();
    match err {
        Error::InsufficientFunds {
            requested,
            available,
        } => {
            assert_eq!(requested, Decimal::from(1));
            assert_eq!(available, Decimal::ZERO);
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }

    // The refused debit left no trace in the log
    assert_eq!(custody.get_entries(merchant.id).unwrap().len(), 2);

    custody.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_hold_gates_spending_until_released() {
    let (custody, _temp) = create_test_custody().await;

    let agent = custody
        .ensure_account(OwnerKind::Agent, Uuid::new_v4())
        .await
        .unwrap();
    custody
        .credit(agent.id, Decimal::from(500), "seed".into(), "teller".into())
        .await
        .unwrap();

    let hold = custody
        .reserve_hold(ReserveParams {
            account_id: agent.id,
            amount: Decimal::from(300),
            purpose: "cash escort".to_string(),
            reference: manual_reference(),
            expires_at: None,
            created_by: "ops".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(custody.get_balance(agent.id).unwrap(), Decimal::from(500));
    assert_eq!(custody.get_available(agent.id).unwrap(), Decimal::from(200));

    // 250 fits the balance but not the available funds
    let err = custody
        .debit(agent.id, Decimal::from(250), "cash out".into(), "teller".into())
        .await
        .unwrap_err();
    match err {
        Error::InsufficientFunds {
            requested,
            available,
        } => {
            assert_eq!(requested, Decimal::from(250));
            assert_eq!(available, Decimal::from(200));
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }

    custody.release_hold(hold.id).await.unwrap();
    custody
        .debit(agent.id, Decimal::from(250), "cash out".into(), "teller".into())
        .await
        .unwrap();
    assert_eq!(custody.get_balance(agent.id).unwrap(), Decimal::from(250));

    custody.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_voucher_settles_exactly_once() {
    let (custody, _temp) = create_test_custody().await;

    let agent = custody
        .ensure_account(OwnerKind::Agent, Uuid::new_v4())
        .await
        .unwrap();
    custody
        .credit(agent.id, Decimal::from(200), "seed".into(), "tester".into())
        .await
        .unwrap();
    let first_merchant = custody
        .ensure_account(OwnerKind::Merchant, Uuid::new_v4())
        .await
        .unwrap();
    let second_merchant = custody
        .ensure_account(OwnerKind::Merchant, Uuid::new_v4())
        .await
        .unwrap();

    let batch = custody
        .create_vouchers(CreateVouchersParams {
            issuer_account_id: agent.id,
            count: 1,
            amount_each: Decimal::from(150),
            purpose: "payout".to_string(),
            eligibility: Eligibility::Any,
            expires_at: None,
            idempotency_key: "race-batch".to_string(),
            created_by: "agent-app".to_string(),
        })
        .await
        .unwrap();
    let voucher = &batch.vouchers[0];

    custody
        .redeem(RedeemParams {
            code: voucher.code.clone(),
            checksum: voucher.checksum.clone(),
            redeemer_account_id: first_merchant.id,
            location: None,
            idempotency_key: "first-claim".to_string(),
            redeemed_by: "merchant-1".to_string(),
        })
        .await
        .unwrap();

    // A second merchant presenting the same code under a fresh key loses
    let err = custody
        .redeem(RedeemParams {
            code: voucher.code.clone(),
            checksum: voucher.checksum.clone(),
            redeemer_account_id: second_merchant.id,
            location: None,
            idempotency_key: "second-claim".to_string(),
            redeemed_by: "merchant-2".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));

    let settled = custody
        .find_redemption_for_voucher(voucher.id)
        .unwrap()
        .unwrap();
    assert_eq!(settled.redeemer_account_id, first_merchant.id);
    assert_eq!(custody.get_balance(first_merchant.id).unwrap(), Decimal::from(150));
    assert_eq!(custody.get_balance(second_merchant.id).unwrap(), Decimal::ZERO);

    custody.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_wrong_checksum_changes_nothing() {
    let (custody, _temp) = create_test_custody().await;

    let agent = custody
        .ensure_account(OwnerKind::Agent, Uuid::new_v4())
        .await
        .unwrap();
    custody
        .credit(agent.id, Decimal::from(100), "seed".into(), "tester".into())
        .await
        .unwrap();
    let merchant = custody
        .ensure_account(OwnerKind::Merchant, Uuid::new_v4())
        .await
        .unwrap();

    let batch = custody
        .create_vouchers(CreateVouchersParams {
            issuer_account_id: agent.id,
            count: 1,
            amount_each: Decimal::from(40),
            purpose: "payout".to_string(),
            eligibility: Eligibility::Any,
            expires_at: None,
            idempotency_key: "guarded".to_string(),
            created_by: "agent-app".to_string(),
        })
        .await
        .unwrap();
    let voucher = &batch.vouchers[0];

    let err = custody
        .redeem(RedeemParams {
            code: voucher.code.clone(),
            checksum: "00000000".to_string(),
            redeemer_account_id: merchant.id,
            location: None,
            idempotency_key: "tampered".to_string(),
            redeemed_by: "merchant-app".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch(_)));

    // Nothing moved, nothing settled, nothing recorded
    assert_eq!(
        custody.get_voucher(voucher.id).unwrap().status,
        VoucherStatus::Active
    );
    assert_eq!(custody.get_balance(merchant.id).unwrap(), Decimal::ZERO);
    assert_eq!(custody.get_available(agent.id).unwrap(), Decimal::from(60));
    assert!(custody.find_redemption_by_key("tampered").unwrap().is_none());
    assert!(custody
        .find_redemption_for_voucher(voucher.id)
        .unwrap()
        .is_none());

    custody.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_batch_hold_cannot_be_released_under_live_codes() {
    let (custody, _temp) = create_test_custody().await;

    let agent = custody
        .ensure_account(OwnerKind::Agent, Uuid::new_v4())
        .await
        .unwrap();
    custody
        .credit(agent.id, Decimal::from(300), "seed".into(), "tester".into())
        .await
        .unwrap();

    let batch = custody
        .create_vouchers(CreateVouchersParams {
            issuer_account_id: agent.id,
            count: 2,
            amount_each: Decimal::from(100),
            purpose: "payout".to_string(),
            eligibility: Eligibility::Any,
            expires_at: None,
            idempotency_key: "protected".to_string(),
            created_by: "agent-app".to_string(),
        })
        .await
        .unwrap();

    let err = custody.release_hold(batch.batch.hold_id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));

    // Voiding every code settles the hold through its shares
    custody
        .void_voucher(batch.vouchers[0].id, "campaign cancelled".to_string())
        .await
        .unwrap();
    custody
        .void_voucher(batch.vouchers[1].id, "campaign cancelled".to_string())
        .await
        .unwrap();

    let hold = custody.get_hold(batch.batch.hold_id).unwrap();
    assert_eq!(hold.status, HoldStatus::Released);
    assert_eq!(custody.get_available(agent.id).unwrap(), Decimal::from(300));

    // Releasing an already-settled hold is a no-op
    let again = custody.release_hold(batch.batch.hold_id).await.unwrap();
    assert_eq!(again.status, HoldStatus::Released);

    custody.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_expiry_sweep_respects_limit() {
    let (custody, _temp) = create_test_custody().await;
    let now = Utc::now();

    let agent = custody
        .ensure_account(OwnerKind::Agent, Uuid::new_v4())
        .await
        .unwrap();
    custody
        .credit(agent.id, Decimal::from(500), "seed".into(), "tester".into())
        .await
        .unwrap();

    custody
        .create_vouchers(CreateVouchersParams {
            issuer_account_id: agent.id,
            count: 3,
            amount_each: Decimal::from(50),
            purpose: "payout".to_string(),
            eligibility: Eligibility::Any,
            expires_at: Some(now + Duration::hours(1)),
            idempotency_key: "sweep-batch".to_string(),
            created_by: "agent-app".to_string(),
        })
        .await
        .unwrap();

    // A manual hold lapses on the same horizon
    custody
        .reserve_hold(ReserveParams {
            account_id: agent.id,
            amount: Decimal::from(75),
            purpose: "cash escort".to_string(),
            reference: manual_reference(),
            expires_at: Some(now + Duration::hours(1)),
            created_by: "ops".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(custody.get_available(agent.id).unwrap(), Decimal::from(275));

    let later = now + Duration::hours(2);

    // Limit 2 leaves one voucher for the next pass. The manual hold lapses
    // now; the batch hold is skipped while one of its codes is still live.
    let first_pass = custody.expire_due(later, 2).await.unwrap();
    assert_eq!(first_pass.vouchers_expired, 2);
    assert_eq!(first_pass.holds_released, 1);
    assert_eq!(first_pass.value_released, Decimal::from(175));

    // The last voucher settles the batch hold through its share
    let second_pass = custody.expire_due(later, 100).await.unwrap();
    assert_eq!(second_pass.vouchers_expired, 1);
    assert_eq!(second_pass.holds_released, 0);
    assert_eq!(second_pass.value_released, Decimal::from(50));

    let third_pass = custody.expire_due(later, 100).await.unwrap();
    assert_eq!(third_pass.vouchers_expired, 0);
    assert_eq!(third_pass.holds_released, 0);

    // Everything reserved came back
    assert_eq!(custody.get_available(agent.id).unwrap(), Decimal::from(500));

    custody.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_targeted_expiry_of_one_voucher() {
    let (custody, _temp) = create_test_custody().await;
    let now = Utc::now();

    let agent = custody
        .ensure_account(OwnerKind::Agent, Uuid::new_v4())
        .await
        .unwrap();
    custody
        .credit(agent.id, Decimal::from(200), "seed".into(), "tester".into())
        .await
        .unwrap();

    let batch = custody
        .create_vouchers(CreateVouchersParams {
            issuer_account_id: agent.id,
            count: 2,
            amount_each: Decimal::from(50),
            purpose: "payout".to_string(),
            eligibility: Eligibility::Any,
            expires_at: Some(now + Duration::days(1)),
            idempotency_key: "targeted".to_string(),
            created_by: "agent-app".to_string(),
        })
        .await
        .unwrap();

    // Before the deadline the voucher cannot be forced out
    let err = custody
        .expire_voucher(batch.vouchers[0].id, now)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));

    let expired = custody
        .expire_voucher(batch.vouchers[0].id, now + Duration::days(2))
        .await
        .unwrap();
    assert_eq!(expired.status, VoucherStatus::Expired);

    // Its share came back; the sibling stays live and reserved
    assert_eq!(custody.get_available(agent.id).unwrap(), Decimal::from(150));
    assert_eq!(
        custody.get_voucher(batch.vouchers[1].id).unwrap().status,
        VoucherStatus::Active
    );

    custody.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_debits_never_overdraw() {
    let (custody, _temp) = create_test_custody().await;

    let agent = custody
        .ensure_account(OwnerKind::Agent, Uuid::new_v4())
        .await
        .unwrap();
    custody
        .credit(agent.id, Decimal::from(100), "seed".into(), "tester".into())
        .await
        .unwrap();

    let custody = Arc::new(custody);
    let mut handles = Vec::new();
    for i in 0..25 {
        let custody = custody.clone();
        let account_id = agent.id;
        handles.push(tokio::spawn(async move {
            custody
                .debit(
                    account_id,
                    Decimal::from(10),
                    format!("payout {}", i),
                    "teller".to_string(),
                )
                .await
                .is_ok()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    // 100 buys exactly ten debits of 10, no matter the interleaving
    assert_eq!(successes, 10);
    assert_eq!(custody.get_balance(agent.id).unwrap(), Decimal::ZERO);

    for entry in custody.get_entries(agent.id).unwrap() {
        assert!(entry.balance_after >= Decimal::ZERO);
    }
    assert!(custody.verify_account(agent.id).unwrap().consistent);

    let custody = Arc::into_inner(custody).unwrap();
    custody.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_eligibility_restricted_voucher() {
    let (custody, _temp) = create_test_custody().await;

    let agent = custody
        .ensure_account(OwnerKind::Agent, Uuid::new_v4())
        .await
        .unwrap();
    custody
        .credit(agent.id, Decimal::from(100), "seed".into(), "tester".into())
        .await
        .unwrap();

    let chosen = custody
        .ensure_account(OwnerKind::Merchant, Uuid::new_v4())
        .await
        .unwrap();
    let other = custody
        .ensure_account(OwnerKind::Merchant, Uuid::new_v4())
        .await
        .unwrap();

    let batch = custody
        .create_vouchers(CreateVouchersParams {
            issuer_account_id: agent.id,
            count: 1,
            amount_each: Decimal::from(60),
            purpose: "earmarked".to_string(),
            eligibility: Eligibility::Merchant(chosen.owner.id),
            expires_at: None,
            idempotency_key: "earmarked-batch".to_string(),
            created_by: "agent-app".to_string(),
        })
        .await
        .unwrap();
    let voucher = &batch.vouchers[0];

    let err = custody
        .redeem(RedeemParams {
            code: voucher.code.clone(),
            checksum: voucher.checksum.clone(),
            redeemer_account_id: other.id,
            location: None,
            idempotency_key: "wrong-merchant".to_string(),
            redeemed_by: "merchant-app".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotEligible(_)));

    custody
        .redeem(RedeemParams {
            code: voucher.code.clone(),
            checksum: voucher.checksum.clone(),
            redeemer_account_id: chosen.id,
            location: None,
            idempotency_key: "right-merchant".to_string(),
            redeemed_by: "merchant-app".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(custody.get_balance(chosen.id).unwrap(), Decimal::from(60));

    custody.shutdown().await.unwrap();
}

fn ops_strategy() -> impl Strategy<Value = Vec<(bool, u64)>> {
    prop::collection::vec((any::<bool>(), 1u64..100_000u64), 1..20)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: any credit/debit sequence leaves the materialized balance,
    /// the folded log, and the model in agreement, and never overdraws
    #[test]
    fn prop_mixed_sequences_conserve_and_never_overdraw(ops in ops_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (custody, _temp) = create_test_custody().await;
            let account = custody
                .ensure_account(OwnerKind::Agent, Uuid::new_v4())
                .await
                .unwrap();

            let mut expected = Decimal::ZERO;
            for (is_credit, cents) in ops {
                let amount = Decimal::new(cents as i64, 2);
                if is_credit {
                    custody
                        .credit(account.id, amount, "in".to_string(), "prop".to_string())
                        .await
                        .unwrap();
                    expected += amount;
                } else {
                    match custody
                        .debit(account.id, amount, "out".to_string(), "prop".to_string())
                        .await
                    {
                        Ok(_) => expected -= amount,
                        Err(Error::InsufficientFunds { .. }) => {
                            prop_assert!(amount > expected);
                        }
                        Err(other) => prop_assert!(false, "unexpected error: {}", other),
                    }
                }
            }

            prop_assert!(expected >= Decimal::ZERO);
            prop_assert_eq!(custody.get_balance(account.id).unwrap(), expected);
            for entry in custody.get_entries(account.id).unwrap() {
                prop_assert!(entry.balance_after >= Decimal::ZERO);
            }
            prop_assert!(custody.verify_account(account.id).unwrap().consistent);

            custody.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: reserving and then releasing holds restores available funds
    #[test]
    fn prop_hold_round_trip_restores_available(amounts in prop::collection::vec(1u64..50_000u64, 1..10)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (custody, _temp) = create_test_custody().await;
            let account = custody
                .ensure_account(OwnerKind::Agent, Uuid::new_v4())
                .await
                .unwrap();
            let balance = Decimal::from(500);
            custody
                .credit(account.id, balance, "seed".to_string(), "prop".to_string())
                .await
                .unwrap();

            let mut available = balance;
            let mut reserved = Vec::new();
            for cents in amounts {
                let amount = Decimal::new(cents as i64, 2);
                let result = custody
                    .reserve_hold(ReserveParams {
                        account_id: account.id,
                        amount,
                        purpose: "prop hold".to_string(),
                        reference: manual_reference(),
                        expires_at: None,
                        created_by: "prop".to_string(),
                    })
                    .await;
                match result {
                    Ok(hold) => {
                        available -= amount;
                        reserved.push(hold.id);
                    }
                    Err(Error::InsufficientFunds { .. }) => {
                        prop_assert!(amount > available);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {}", other),
                }
                prop_assert_eq!(custody.get_available(account.id).unwrap(), available);
            }

            for hold_id in reserved {
                custody.release_hold(hold_id).await.unwrap();
            }
            prop_assert_eq!(custody.get_available(account.id).unwrap(), balance);
            prop_assert_eq!(custody.get_balance(account.id).unwrap(), balance);

            custody.shutdown().await.unwrap();
            Ok(())
        })?;
    }
}
