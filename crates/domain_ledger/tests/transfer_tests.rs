//! Integration tests for transfers between shares

use core_kernel::{ShareId, WithdrawalLimitPeriod};
use domain_ledger::{LedgerError, TransactionType, TransferRequest};
use test_utils::{assert_audit_row, assert_reconciled, MoneyFixtures, ShareTypeBuilder, TestLedger};

#[tokio::test]
async fn test_transfer_moves_money_between_shares() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let checking = ledger.add_share_type(ShareTypeBuilder::new().named("Checking")).await;
    let from = ledger.open_share(&student, &savings, MoneyFixtures::dollars(40)).await;
    let to = ledger.open_share(&student, &checking, MoneyFixtures::dollars(5)).await;

    let (debit, credit) = ledger
        .transfers()
        .transfer(TransferRequest::new(from.id, to.id, MoneyFixtures::dollars(15)))
        .await
        .unwrap();

    assert_eq!(debit.amount, MoneyFixtures::dollars(-15));
    assert_eq!(credit.amount, MoneyFixtures::dollars(15));
    assert_eq!(debit.transaction_type, TransactionType::Transfer);
    assert_eq!(credit.transaction_type, TransactionType::Transfer);
    assert_eq!(debit.comment, format!("Transfer to {}", to.id));
    assert_eq!(credit.comment, format!("Transfer from {}", from.id));
    assert_eq!(ledger.balance(from.id).await, MoneyFixtures::dollars(25));
    assert_eq!(ledger.balance(to.id).await, MoneyFixtures::dollars(20));
    assert_reconciled(&ledger.store.snapshot().await.ledger);
}

#[tokio::test]
async fn test_transfer_rejects_non_positive_amount() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let a = ledger.open_share(&student, &savings, MoneyFixtures::dollars(10)).await;
    let b = ledger.open_share(&student, &savings, MoneyFixtures::dollars(10)).await;

    for amount in [MoneyFixtures::dollars(0), MoneyFixtures::dollars(-3)] {
        let err = ledger
            .transfers()
            .transfer(TransferRequest::new(a.id, b.id, amount))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidOperation(_)));
    }

    let err = ledger
        .transfers()
        .transfer(TransferRequest::new(a.id, a.id, MoneyFixtures::dollars(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidOperation(_)));
}

#[tokio::test]
async fn test_transfer_with_insufficient_funds_moves_nothing() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let from = ledger.open_share(&student, &savings, MoneyFixtures::dollars(3)).await;
    let to = ledger.open_share(&student, &savings, MoneyFixtures::dollars(0)).await;

    let err = ledger
        .transfers()
        .transfer(TransferRequest::new(from.id, to.id, MoneyFixtures::dollars(10)))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::NonsufficientFunds { .. }));
    assert_eq!(ledger.balance(from.id).await, MoneyFixtures::dollars(3));
    assert_eq!(ledger.balance(to.id).await, MoneyFixtures::dollars(0));
    assert_audit_row(
        &ledger.transactions(from.id).await,
        TransactionType::NonsufficientFunds,
        MoneyFixtures::dollars(3),
    );
    assert!(ledger.transactions(to.id).await.is_empty());
}

#[tokio::test]
async fn test_transfer_to_missing_share_rolls_back_debit() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let from = ledger.open_share(&student, &savings, MoneyFixtures::dollars(30)).await;

    let err = ledger
        .transfers()
        .transfer(TransferRequest::new(from.id, ShareId::new(), MoneyFixtures::dollars(10)))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::NotFound { .. }));
    assert_eq!(ledger.balance(from.id).await, MoneyFixtures::dollars(30));
    assert_eq!(ledger.transactions(from.id).await.len(), 1);
}

#[tokio::test]
async fn test_transfer_counts_against_source_withdrawal_limit() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let limited = ledger
        .add_share_type(ShareTypeBuilder::new().with_withdrawal_limit(1, WithdrawalLimitPeriod::Monthly))
        .await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let from = ledger.open_share(&student, &limited, MoneyFixtures::dollars(30)).await;
    let to = ledger.open_share(&student, &savings, MoneyFixtures::dollars(0)).await;
    let transfers = ledger.transfers();

    transfers
        .transfer(TransferRequest::new(from.id, to.id, MoneyFixtures::dollars(5)))
        .await
        .unwrap();
    let err = transfers
        .transfer(TransferRequest::new(from.id, to.id, MoneyFixtures::dollars(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::WithdrawalLimitExceeded { .. }));

    transfers
        .transfer(
            TransferRequest::new(from.id, to.id, MoneyFixtures::dollars(5)).without_limit_assessment(),
        )
        .await
        .unwrap();
    assert_eq!(ledger.balance(from.id).await, MoneyFixtures::dollars(20));
    assert_eq!(ledger.balance(to.id).await, MoneyFixtures::dollars(10));
}
