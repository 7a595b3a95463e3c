//! Integration tests for concurrent postings and conflict retries

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use core_kernel::{
    DomainPort, FixedClock, InstanceId, Money, PortError, Rate, ShareId, ShareTypeId, StudentId,
};
use domain_ledger::{
    InMemoryLedgerStore, LedgerConfig, LedgerError, LedgerStore, LedgerUnitOfWork,
    PostingRequest, Share, SharePageQuery, ShareType, Student, Transaction, TransactionPoster,
};
use test_utils::{MoneyFixtures, ShareTypeBuilder, TemporalFixtures, TestLedger};

/// Store whose first `failures` share writes lose to a concurrent writer
#[derive(Clone)]
struct ContendedStore {
    inner: InMemoryLedgerStore,
    failures: Arc<AtomicU32>,
}

struct ContendedUnitOfWork {
    inner: Box<dyn LedgerUnitOfWork>,
    failures: Arc<AtomicU32>,
}

impl DomainPort for ContendedStore {}

#[async_trait]
impl LedgerStore for ContendedStore {
    async fn begin(&self) -> Result<Box<dyn LedgerUnitOfWork>, PortError> {
        Ok(Box::new(ContendedUnitOfWork {
            inner: self.inner.begin().await?,
            failures: Arc::clone(&self.failures),
        }))
    }
}

#[async_trait]
impl LedgerUnitOfWork for ContendedUnitOfWork {
    async fn share(&mut self, id: ShareId) -> Result<Option<Share>, PortError> {
        self.inner.share(id).await
    }

    async fn share_type(&mut self, id: ShareTypeId) -> Result<Option<ShareType>, PortError> {
        self.inner.share_type(id).await
    }

    async fn student(&mut self, id: StudentId) -> Result<Option<Student>, PortError> {
        self.inner.student(id).await
    }

    async fn share_types(&mut self) -> Result<Vec<ShareType>, PortError> {
        self.inner.share_types().await
    }

    async fn save_share(&mut self, share: &Share, expected_balance: Money) -> Result<(), PortError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(PortError::conflict("balance moved"));
        }
        self.inner.save_share(share, expected_balance).await
    }

    async fn save_share_type(&mut self, share_type: &ShareType) -> Result<(), PortError> {
        self.inner.save_share_type(share_type).await
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), PortError> {
        self.inner.insert_transaction(transaction).await
    }

    async fn transactions_for_share(&mut self, id: ShareId) -> Result<Vec<Transaction>, PortError> {
        self.inner.transactions_for_share(id).await
    }

    async fn shares_page(&mut self, query: &SharePageQuery) -> Result<Vec<Share>, PortError> {
        self.inner.shares_page(query).await
    }

    async fn reset_withdrawal_counts(&mut self, ids: &[ShareId]) -> Result<u64, PortError> {
        self.inner.reset_withdrawal_counts(ids).await
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        self.inner.rollback().await
    }
}

async fn contended(failures: u32) -> (ContendedStore, ShareId) {
    let inner = InMemoryLedgerStore::new();
    let instance = InstanceId::new();
    let student = Student::new(instance, "Grace");
    let share_type = ShareType::new("Savings", Rate::ZERO).linked_to(instance);
    let share = Share::open(student.id, share_type.id, TemporalFixtures::school_day());
    inner.insert_student(student).await;
    inner.insert_share_type(share_type).await;
    inner.insert_share(share.clone()).await;
    let store = ContendedStore {
        inner,
        failures: Arc::new(AtomicU32::new(failures)),
    };
    (store, share.id)
}

fn poster_for(store: &ContendedStore, retries: u32) -> TransactionPoster {
    TransactionPoster::new(
        Arc::new(store.clone()),
        Arc::new(FixedClock::new(TemporalFixtures::school_day())),
        LedgerConfig::default().with_max_conflict_retries(retries),
    )
}

#[tokio::test]
async fn test_post_retries_after_lost_write() {
    let (store, share_id) = contended(2).await;

    let posted = poster_for(&store, 3)
        .post_one(PostingRequest::new(share_id, MoneyFixtures::dollars(5)))
        .await
        .unwrap();

    assert_eq!(posted.new_balance, MoneyFixtures::dollars(5));
    // Rows from the failed attempts were rolled back with their units of work
    assert_eq!(store.inner.get_transactions(share_id).await.len(), 1);
    assert_eq!(store.inner.get_share(share_id).await.unwrap().balance, MoneyFixtures::dollars(5));
}

#[tokio::test]
async fn test_post_gives_up_after_configured_retries() {
    let (store, share_id) = contended(10).await;

    let err = poster_for(&store, 2)
        .post_one(PostingRequest::new(share_id, MoneyFixtures::dollars(5)))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert!(store.inner.get_transactions(share_id).await.is_empty());
    assert_eq!(store.inner.get_share(share_id).await.unwrap().balance, Money::ZERO);
}

#[tokio::test]
async fn test_concurrent_postings_all_land() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let share = ledger.open_share(&student, &savings, MoneyFixtures::dollars(100)).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let poster = ledger.poster();
        let amount = if i % 2 == 0 { MoneyFixtures::dollars(3) } else { MoneyFixtures::dollars(-2) };
        handles.push(tokio::spawn(async move {
            poster.post_one(PostingRequest::new(share.id, amount)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // 10 deposits of $3 and 10 withdrawals of $2
    assert_eq!(ledger.balance(share.id).await, MoneyFixtures::dollars(110));
    let reconciliation = ledger.inquiry().reconcile_share(share.id).await.unwrap();
    assert!(reconciliation.is_balanced());
    assert_eq!(reconciliation.transaction_count, 21);
}

#[tokio::test]
async fn test_inquiry_reports_discrepancy_and_missing_share() {
    let ledger = TestLedger::new();
    let student = ledger.add_student().await;
    let savings = ledger.add_share_type(ShareTypeBuilder::new()).await;
    let share = ledger.open_share(&student, &savings, MoneyFixtures::dollars(10)).await;

    let mut tampered = ledger.share(share.id).await;
    tampered.balance = MoneyFixtures::dollars(12);
    ledger.store.insert_share(tampered).await;

    let reconciliation = ledger.inquiry().reconcile_share(share.id).await.unwrap();
    assert!(!reconciliation.is_balanced());
    assert_eq!(reconciliation.discrepancy(), MoneyFixtures::dollars(2));

    let statement = ledger.inquiry().share_transactions(share.id).await.unwrap();
    assert_eq!(statement.len(), 1);

    let err = ledger.inquiry().reconcile_share(ShareId::new()).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}
