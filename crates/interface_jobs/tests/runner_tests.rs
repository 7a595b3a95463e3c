//! Job runner tests against the in-memory store

use std::sync::Arc;

use core_kernel::{ShareTypeId, WithdrawalLimitPeriod};
use domain_ledger::{LedgerError, PostingRequest};
use domain_trading::InMemoryTradingStore;
use interface_jobs::{Command, JobError, JobOutcome, JobRunner};
use test_utils::{MoneyFixtures, RateFixtures, ShareTypeBuilder, TemporalFixtures, TestLedger};

fn runner(ledger: &TestLedger) -> JobRunner<InMemoryTradingStore> {
    JobRunner::new(Arc::new(ledger.store.clone()), ledger.clock.clone(), ledger.config.clone())
}

#[tokio::test]
async fn test_daily_resets_defaults_to_clock() {
    let ledger = TestLedger::at(TemporalFixtures::at(2024, 4, 1, 6));
    let student = ledger.add_student().await;
    let monthly = ledger
        .add_share_type(
            ShareTypeBuilder::new()
                .with_withdrawal_limit(2, WithdrawalLimitPeriod::Monthly)
                .last_reset_at(TemporalFixtures::at(2024, 3, 1, 0)),
        )
        .await;
    let share = ledger.open_share(&student, &monthly, MoneyFixtures::dollars(20)).await;
    ledger
        .poster()
        .post_one(PostingRequest::new(share.id, MoneyFixtures::dollars(-1)))
        .await
        .unwrap();

    let outcome = runner(&ledger).run(&Command::DailyResets { at: None }).await.unwrap();

    assert!(outcome.is_clean());
    match &outcome {
        JobOutcome::DailyResets { at, report } => {
            assert_eq!(*at, ledger.now());
            assert_eq!(report.reset.len(), 1);
            assert_eq!(report.reset[0].0.shares_reset, 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(ledger.share(share.id).await.limited_withdrawal_count, 0);

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["job"], "daily-resets");
    assert_eq!(json["report"]["evaluated"], 1);
}

#[tokio::test]
async fn test_post_dividends_reports_completion() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger
        .add_share_type(ShareTypeBuilder::new().with_rate(RateFixtures::one_percent()))
        .await;
    let share = ledger.open_share(&student, &savings, MoneyFixtures::dollars(200)).await;

    let outcome = runner(&ledger)
        .run(&Command::PostDividends {
            share_type: savings.id,
            instances: vec![ledger.instance_id],
        })
        .await
        .unwrap();

    assert!(outcome.is_clean());
    assert_eq!(ledger.balance(share.id).await, MoneyFixtures::dollars(202));
}

#[tokio::test]
async fn test_reconcile_flags_tampered_share() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let share = ledger.open_share(&student, &savings, MoneyFixtures::dollars(10)).await;
    let jobs = runner(&ledger);

    assert!(jobs.reconcile(share.id).await.unwrap().is_clean());

    let mut tampered = ledger.share(share.id).await;
    tampered.balance = MoneyFixtures::dollars(11);
    ledger.store.insert_share(tampered).await;

    let outcome = jobs.reconcile(share.id).await.unwrap();
    assert!(!outcome.is_clean());
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["job"], "reconcile");
    assert_eq!(json["balanced"], false);
    assert_eq!(json["transaction_count"], 1);
}

#[tokio::test]
async fn test_update_stock_value_job() {
    let ledger = TestLedger::new();
    let stock = ledger.list_stock("XYZ", MoneyFixtures::dollars(4), 10).await;

    let outcome = runner(&ledger)
        .run(&Command::UpdateStockValue {
            stock: stock.id,
            value: MoneyFixtures::cents(450),
        })
        .await
        .unwrap();

    match outcome {
        JobOutcome::UpdateStockValue(updated) => assert_eq!(updated.current_value, MoneyFixtures::cents(450)),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_share_type_is_an_error() {
    let ledger = TestLedger::new();

    let err = runner(&ledger)
        .run(&Command::ResetLimit {
            share_type: ShareTypeId::new(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, JobError::Ledger(LedgerError::NotFound { .. })));
}
