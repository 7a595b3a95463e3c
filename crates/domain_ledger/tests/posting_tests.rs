//! Integration tests for posting single transactions and batches

use core_kernel::{Money, WithdrawalLimitPeriod};
use domain_ledger::{BatchOptions, LedgerError, PostingRequest, TransactionType};
use test_utils::{
    assert_audit_row, assert_reconciled, assert_running_balances, MoneyFixtures,
    ShareTypeBuilder, TestLedger,
};

fn dollars(n: i64) -> Money {
    MoneyFixtures::dollars(n)
}

#[tokio::test]
async fn test_deposit_and_withdrawal_update_balance() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let share = ledger.open_share(&student, &savings, dollars(50)).await;

    let poster = ledger.poster();
    let deposit = poster
        .post_one(PostingRequest::new(share.id, dollars(20)).with_comment("Allowance"))
        .await
        .unwrap();
    let withdrawal = poster
        .post_one(PostingRequest::new(share.id, MoneyFixtures::cents(-1_250)))
        .await
        .unwrap();

    assert_eq!(deposit.transaction_type, TransactionType::Deposit);
    assert_eq!(deposit.new_balance, dollars(70));
    assert_eq!(withdrawal.transaction_type, TransactionType::Withdrawal);
    assert_eq!(withdrawal.new_balance, MoneyFixtures::cents(5_750));

    let stored = ledger.share(share.id).await;
    assert_eq!(stored.balance, MoneyFixtures::cents(5_750));
    assert_eq!(stored.date_last_active, Some(ledger.now()));
    assert_running_balances(&ledger.transactions(share.id).await);
}

#[tokio::test]
async fn test_overdraft_records_single_nsf_row_and_keeps_balance() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let share = ledger.open_share(&student, &savings, dollars(10)).await;

    let err = ledger
        .poster()
        .post_one(PostingRequest::new(share.id, dollars(-25)))
        .await
        .unwrap_err();

    match &err {
        LedgerError::NonsufficientFunds { balance, attempted, .. } => {
            assert_eq!(*balance, dollars(10));
            assert_eq!(*attempted, dollars(-25));
        }
        other => panic!("expected NonsufficientFunds, got {other:?}"),
    }
    assert!(err.is_rejection());

    let transactions = ledger.transactions(share.id).await;
    assert_eq!(transactions.len(), 2);
    assert_eq!(
        transactions
            .iter()
            .filter(|t| t.transaction_type == TransactionType::NonsufficientFunds)
            .count(),
        1
    );
    assert_audit_row(&transactions, TransactionType::NonsufficientFunds, dollars(10));
    assert_eq!(ledger.balance(share.id).await, dollars(10));
}

#[tokio::test]
async fn test_most_negative_withdrawal_is_refused_for_funds() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let share = ledger.open_share(&student, &savings, dollars(10)).await;

    let err = ledger
        .poster()
        .post_one(PostingRequest::new(share.id, Money::from_mills(i64::MIN)))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::NonsufficientFunds { .. }), "got {err:?}");
    let transactions = ledger.transactions(share.id).await;
    assert_audit_row(&transactions, TransactionType::NonsufficientFunds, dollars(10));
    assert!(transactions.last().unwrap().comment.contains("$9223372036854775.807"));
}

#[tokio::test]
async fn test_take_negative_allows_overdraft() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let share = ledger.open_share(&student, &savings, dollars(5)).await;

    let posted = ledger
        .poster()
        .post_one(PostingRequest::new(share.id, dollars(-8)).allow_negative())
        .await
        .unwrap();

    assert_eq!(posted.new_balance, dollars(-3));
    assert_eq!(ledger.balance(share.id).await, dollars(-3));
}

#[tokio::test]
async fn test_withdrawal_limit_refuses_third_withdrawal() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let limited = ledger
        .add_share_type(ShareTypeBuilder::new().with_withdrawal_limit(2, WithdrawalLimitPeriod::Monthly))
        .await;
    let share = ledger.open_share(&student, &limited, dollars(50)).await;
    let poster = ledger.poster();

    poster.post_one(PostingRequest::new(share.id, dollars(-10))).await.unwrap();
    poster.post_one(PostingRequest::new(share.id, dollars(-10))).await.unwrap();

    let after_two = ledger.share(share.id).await;
    assert_eq!(after_two.limited_withdrawal_count, 2);
    assert_eq!(after_two.balance, dollars(30));

    let err = poster
        .post_one(PostingRequest::new(share.id, dollars(-5)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::WithdrawalLimitExceeded { limit: 2, .. }));

    let after_refusal = ledger.share(share.id).await;
    assert_eq!(after_refusal.balance, dollars(30));
    assert_eq!(after_refusal.limited_withdrawal_count, 2);
    assert_audit_row(
        &ledger.transactions(share.id).await,
        TransactionType::WithdrawalLimitExceeded,
        dollars(30),
    );
}

#[tokio::test]
async fn test_deposits_are_never_limited() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let limited = ledger
        .add_share_type(ShareTypeBuilder::new().with_withdrawal_limit(1, WithdrawalLimitPeriod::Daily))
        .await;
    let share = ledger.open_share(&student, &limited, dollars(50)).await;
    let poster = ledger.poster();

    poster.post_one(PostingRequest::new(share.id, dollars(-1))).await.unwrap();
    for _ in 0..3 {
        poster.post_one(PostingRequest::new(share.id, dollars(2))).await.unwrap();
    }

    let stored = ledger.share(share.id).await;
    assert_eq!(stored.limited_withdrawal_count, 1);
    assert_eq!(stored.balance, dollars(55));
}

#[tokio::test]
async fn test_fee_is_charged_past_limit() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let limited = ledger
        .add_share_type(
            ShareTypeBuilder::new()
                .with_withdrawal_limit(1, WithdrawalLimitPeriod::Weekly)
                .with_fee(MoneyFixtures::limit_fee()),
        )
        .await;
    let share = ledger.open_share(&student, &limited, dollars(20)).await;
    let poster = ledger.poster();

    poster.post_one(PostingRequest::new(share.id, dollars(-5))).await.unwrap();
    let second = poster.post_one(PostingRequest::new(share.id, dollars(-5))).await.unwrap();

    assert_eq!(second.new_balance, dollars(9));
    let transactions = ledger.transactions(share.id).await;
    let fee_rows: Vec<_> = transactions
        .iter()
        .filter(|t| t.transaction_type == TransactionType::WithdrawalLimitExceeded)
        .collect();
    assert_eq!(fee_rows.len(), 1);
    assert_eq!(fee_rows[0].amount, dollars(-1));
    assert_eq!(ledger.share(share.id).await.limited_withdrawal_count, 2);
    assert_running_balances(&transactions);
}

#[tokio::test]
async fn test_overdraft_at_limit_is_refused_for_funds() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let limited = ledger
        .add_share_type(ShareTypeBuilder::new().with_withdrawal_limit(1, WithdrawalLimitPeriod::Monthly))
        .await;
    let share = ledger.open_share(&student, &limited, dollars(10)).await;
    let poster = ledger.poster();

    poster.post_one(PostingRequest::new(share.id, dollars(-5))).await.unwrap();
    let err = poster
        .post_one(PostingRequest::new(share.id, dollars(-50)))
        .await
        .unwrap_err();

    assert!(
        matches!(err, LedgerError::NonsufficientFunds { attempted, .. } if attempted == dollars(-50)),
        "expected NonsufficientFunds, got {err:?}"
    );
    let transactions = ledger.transactions(share.id).await;
    let count = |kind: TransactionType| transactions.iter().filter(|t| t.transaction_type == kind).count();
    assert_eq!(count(TransactionType::NonsufficientFunds), 1);
    assert_eq!(count(TransactionType::WithdrawalLimitExceeded), 0);
    assert_audit_row(&transactions, TransactionType::NonsufficientFunds, dollars(5));

    let stored = ledger.share(share.id).await;
    assert_eq!(stored.balance, dollars(5));
    assert_eq!(stored.limited_withdrawal_count, 1);
}

#[tokio::test]
async fn test_zero_fee_past_limit_posts_without_fee_row() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let limited = ledger
        .add_share_type(
            ShareTypeBuilder::new()
                .with_withdrawal_limit(1, WithdrawalLimitPeriod::Monthly)
                .with_fee(Money::ZERO),
        )
        .await;
    let share = ledger.open_share(&student, &limited, dollars(10)).await;
    let poster = ledger.poster();

    poster.post_one(PostingRequest::new(share.id, dollars(-1))).await.unwrap();
    let second = poster.post_one(PostingRequest::new(share.id, dollars(-1))).await.unwrap();

    assert_eq!(second.new_balance, dollars(8));
    let transactions = ledger.transactions(share.id).await;
    assert!(transactions
        .iter()
        .all(|t| t.transaction_type != TransactionType::WithdrawalLimitExceeded));
    assert_eq!(ledger.share(share.id).await.limited_withdrawal_count, 2);
    assert_running_balances(&transactions);
}

#[tokio::test]
async fn test_fee_that_would_overdraw_is_refused_for_funds() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let limited = ledger
        .add_share_type(
            ShareTypeBuilder::new()
                .with_withdrawal_limit(1, WithdrawalLimitPeriod::Weekly)
                .with_fee(MoneyFixtures::limit_fee()),
        )
        .await;
    let share = ledger.open_share(&student, &limited, dollars(10)).await;
    let poster = ledger.poster();

    poster.post_one(PostingRequest::new(share.id, dollars(-5))).await.unwrap();
    let err = poster
        .post_one(PostingRequest::new(share.id, dollars(-5)))
        .await
        .unwrap_err();

    assert!(
        matches!(err, LedgerError::NonsufficientFunds { attempted, .. } if attempted == dollars(-6)),
        "expected NonsufficientFunds, got {err:?}"
    );
    let stored = ledger.share(share.id).await;
    assert_eq!(stored.balance, dollars(5));
    assert_eq!(stored.limited_withdrawal_count, 1);
    assert_audit_row(
        &ledger.transactions(share.id).await,
        TransactionType::NonsufficientFunds,
        dollars(5),
    );
}

#[tokio::test]
async fn test_unknown_and_deleted_shares_are_not_found() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let share = ledger.open_share(&student, &savings, dollars(5)).await;

    let mut deleted = ledger.share(share.id).await;
    deleted.soft_delete();
    ledger.store.insert_share(deleted).await;

    let err = ledger
        .poster()
        .post_one(PostingRequest::new(share.id, dollars(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "Share", .. }));

    let err = ledger
        .poster()
        .post_one(PostingRequest::new(core_kernel::ShareId::new(), dollars(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

#[tokio::test]
async fn test_batch_stops_and_rolls_back_on_refusal() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let a = ledger.open_share(&student, &savings, dollars(10)).await;
    let b = ledger.open_share(&student, &savings, dollars(10)).await;

    let err = ledger
        .poster()
        .post_many(
            vec![
                PostingRequest::new(a.id, dollars(5)),
                PostingRequest::new(b.id, dollars(-50)),
                PostingRequest::new(a.id, dollars(1)),
            ],
            BatchOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::NonsufficientFunds { .. }));
    assert_eq!(ledger.balance(a.id).await, dollars(10));
    assert_eq!(ledger.balance(b.id).await, dollars(10));
    // Only the opening deposits remain
    assert_eq!(ledger.transactions(a.id).await.len(), 1);
    assert_eq!(ledger.transactions(b.id).await.len(), 1);
}

#[tokio::test]
async fn test_batch_continues_past_refusals_when_asked() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let a = ledger.open_share(&student, &savings, dollars(10)).await;
    let b = ledger.open_share(&student, &savings, dollars(10)).await;

    let outcome = ledger
        .poster()
        .post_many(
            vec![
                PostingRequest::new(a.id, dollars(5)),
                PostingRequest::new(b.id, dollars(-50)),
                PostingRequest::new(a.id, dollars(1)),
            ],
            BatchOptions {
                stop_on_exception: false,
                ..BatchOptions::default()
            },
        )
        .await
        .unwrap();

    assert!(!outcome.is_complete());
    assert_eq!(outcome.posted.len(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].index, 1);
    assert_eq!(ledger.balance(a.id).await, dollars(16));
    assert_eq!(ledger.balance(b.id).await, dollars(10));
    assert_audit_row(
        &ledger.transactions(b.id).await,
        TransactionType::NonsufficientFunds,
        dollars(10),
    );
}

#[tokio::test]
async fn test_batch_assessment_flag_overrides_requests() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let limited = ledger
        .add_share_type(ShareTypeBuilder::new().with_withdrawal_limit(1, WithdrawalLimitPeriod::Monthly))
        .await;
    let share = ledger.open_share(&student, &limited, dollars(50)).await;

    let outcome = ledger
        .poster()
        .post_many(
            vec![
                PostingRequest::new(share.id, dollars(-1)),
                PostingRequest::new(share.id, dollars(-1)),
                PostingRequest::new(share.id, dollars(-1)),
            ],
            BatchOptions {
                assess_withdrawal_limit: false,
                ..BatchOptions::default()
            },
        )
        .await
        .unwrap();

    assert!(outcome.is_complete());
    let stored = ledger.share(share.id).await;
    assert_eq!(stored.balance, dollars(47));
    assert_eq!(stored.limited_withdrawal_count, 0);
}

#[tokio::test]
async fn test_batch_aborts_on_unknown_share_regardless_of_options() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let a = ledger.open_share(&student, &savings, dollars(10)).await;

    let err = ledger
        .poster()
        .post_many(
            vec![
                PostingRequest::new(a.id, dollars(5)),
                PostingRequest::new(core_kernel::ShareId::new(), dollars(5)),
            ],
            BatchOptions {
                stop_on_exception: false,
                ..BatchOptions::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::NotFound { .. }));
    assert_eq!(ledger.balance(a.id).await, dollars(10));
}

#[tokio::test]
async fn test_ledger_reconciles_after_mixed_activity() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let share = ledger.open_share(&student, &savings, dollars(10)).await;
    let poster = ledger.poster();

    for amount in [3, -4, -20, 7, -16, 1] {
        let _ = poster.post_one(PostingRequest::new(share.id, dollars(amount))).await;
    }

    assert_reconciled(&ledger.store.snapshot().await.ledger);
    assert_running_balances(&ledger.transactions(share.id).await);
}
