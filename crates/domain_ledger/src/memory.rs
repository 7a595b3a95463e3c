//! In-memory ledger store
//!
//! Holds every table behind one async mutex. A unit of work owns the lock
//! for its lifetime and edits a private copy of the tables; commit swaps
//! the copy in, dropping the unit discards it.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use core_kernel::{DomainPort, Money, PortError, ShareId, ShareTypeId, StudentId};

use crate::ports::{LedgerStore, LedgerUnitOfWork, SharePageQuery};
use crate::share::Share;
use crate::share_type::ShareType;
use crate::student::Student;
use crate::transaction::Transaction;

/// The ledger tables
#[derive(Debug, Clone, Default)]
pub struct LedgerTables {
    pub students: HashMap<StudentId, Student>,
    pub share_types: HashMap<ShareTypeId, ShareType>,
    pub shares: BTreeMap<ShareId, Share>,
    pub transactions: Vec<Transaction>,
}

impl LedgerTables {
    pub fn share(&self, id: ShareId) -> Option<Share> {
        self.shares.get(&id).cloned()
    }

    pub fn share_type(&self, id: ShareTypeId) -> Option<ShareType> {
        self.share_types.get(&id).cloned()
    }

    pub fn student(&self, id: StudentId) -> Option<Student> {
        self.students.get(&id).cloned()
    }

    pub fn active_share_types(&self) -> Vec<ShareType> {
        let mut types: Vec<_> = self
            .share_types
            .values()
            .filter(|st| !st.is_deleted)
            .cloned()
            .collect();
        types.sort_by_key(|st| st.id);
        types
    }

    pub fn save_share(&mut self, share: &Share, expected_balance: Money) -> Result<(), PortError> {
        match self.shares.get_mut(&share.id) {
            Some(stored) if stored.balance == expected_balance => {
                *stored = share.clone();
                Ok(())
            }
            Some(stored) => Err(PortError::conflict(format!(
                "share {} balance is {}, expected {}",
                share.id, stored.balance, expected_balance
            ))),
            None => Err(PortError::not_found("Share", share.id)),
        }
    }

    pub fn save_share_type(&mut self, share_type: &ShareType) {
        self.share_types.insert(share_type.id, share_type.clone());
    }

    pub fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), PortError> {
        if !self.shares.contains_key(&transaction.share_id) {
            return Err(PortError::constraint(format!(
                "transaction {} references unknown share {}",
                transaction.id, transaction.share_id
            )));
        }
        self.transactions.push(transaction.clone());
        Ok(())
    }

    pub fn transactions_for_share(&self, id: ShareId) -> Vec<Transaction> {
        self.transactions
            .iter()
            .filter(|t| t.share_id == id)
            .cloned()
            .collect()
    }

    pub fn shares_page(&self, query: &SharePageQuery) -> Vec<Share> {
        let lower = match query.after {
            Some(after) => std::ops::Bound::Excluded(after),
            None => std::ops::Bound::Unbounded,
        };
        self.shares
            .range((lower, std::ops::Bound::Unbounded))
            .map(|(_, share)| share)
            .filter(|share| share.share_type_id == query.share_type_id)
            .filter(|share| !query.active_only || !share.is_deleted)
            .filter(|share| {
                if !query.active_only && query.instance_id.is_none() {
                    return true;
                }
                match self.students.get(&share.student_id) {
                    Some(student) => {
                        (!query.active_only || student.is_active())
                            && query.instance_id.map_or(true, |i| student.instance_id == i)
                    }
                    None => false,
                }
            })
            .take(query.limit as usize)
            .cloned()
            .collect()
    }

    pub fn reset_withdrawal_counts(&mut self, ids: &[ShareId]) -> u64 {
        let mut updated = 0;
        for id in ids {
            if let Some(share) = self.shares.get_mut(id) {
                share.limited_withdrawal_count = 0;
                updated += 1;
            }
        }
        updated
    }
}

/// Ledger store kept in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    tables: Arc<Mutex<LedgerTables>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_student(&self, student: Student) {
        self.tables.lock().await.students.insert(student.id, student);
    }

    pub async fn insert_share_type(&self, share_type: ShareType) {
        self.tables.lock().await.save_share_type(&share_type);
    }

    /// Inserts a share as stored, bypassing the poster
    pub async fn insert_share(&self, share: Share) {
        self.tables.lock().await.shares.insert(share.id, share);
    }

    /// Copy of the committed tables
    pub async fn snapshot(&self) -> LedgerTables {
        self.tables.lock().await.clone()
    }

    pub async fn get_share(&self, id: ShareId) -> Option<Share> {
        self.tables.lock().await.share(id)
    }

    pub async fn get_share_type(&self, id: ShareTypeId) -> Option<ShareType> {
        self.tables.lock().await.share_type(id)
    }

    pub async fn get_transactions(&self, id: ShareId) -> Vec<Transaction> {
        self.tables.lock().await.transactions_for_share(id)
    }
}

impl DomainPort for InMemoryLedgerStore {}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerUnitOfWork>, PortError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryLedgerUnitOfWork { guard, working }))
    }
}

/// Unit of work over [`InMemoryLedgerStore`]
pub struct InMemoryLedgerUnitOfWork {
    guard: OwnedMutexGuard<LedgerTables>,
    working: LedgerTables,
}

#[async_trait]
impl LedgerUnitOfWork for InMemoryLedgerUnitOfWork {
    async fn share(&mut self, id: ShareId) -> Result<Option<Share>, PortError> {
        Ok(self.working.share(id))
    }

    async fn share_type(&mut self, id: ShareTypeId) -> Result<Option<ShareType>, PortError> {
        Ok(self.working.share_type(id))
    }

    async fn student(&mut self, id: StudentId) -> Result<Option<Student>, PortError> {
        Ok(self.working.student(id))
    }

    async fn share_types(&mut self) -> Result<Vec<ShareType>, PortError> {
        Ok(self.working.active_share_types())
    }

    async fn save_share(&mut self, share: &Share, expected_balance: Money) -> Result<(), PortError> {
        self.working.save_share(share, expected_balance)
    }

    async fn save_share_type(&mut self, share_type: &ShareType) -> Result<(), PortError> {
        self.working.save_share_type(share_type);
        Ok(())
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), PortError> {
        self.working.insert_transaction(transaction)
    }

    async fn transactions_for_share(&mut self, id: ShareId) -> Result<Vec<Transaction>, PortError> {
        Ok(self.working.transactions_for_share(id))
    }

    async fn shares_page(&mut self, query: &SharePageQuery) -> Result<Vec<Share>, PortError> {
        Ok(self.working.shares_page(query))
    }

    async fn reset_withdrawal_counts(&mut self, ids: &[ShareId]) -> Result<u64, PortError> {
        Ok(self.working.reset_withdrawal_counts(ids))
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        let InMemoryLedgerUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_kernel::{InstanceId, Rate};

    async fn seeded() -> (InMemoryLedgerStore, Share) {
        let store = InMemoryLedgerStore::new();
        let instance = InstanceId::new();
        let student = Student::new(instance, "Ada");
        let share_type = ShareType::new("Savings", Rate::ZERO).linked_to(instance);
        let share = Share::open(student.id, share_type.id, Utc::now());
        store.insert_student(student).await;
        store.insert_share_type(share_type).await;
        store.insert_share(share.clone()).await;
        (store, share)
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_discards_writes() {
        let (store, share) = seeded().await;
        {
            let mut uow = store.begin().await.unwrap();
            let mut updated = share.clone();
            updated.balance = Money::from_mills(1_000);
            uow.save_share(&updated, Money::ZERO).await.unwrap();
        }
        assert_eq!(store.get_share(share.id).await.unwrap().balance, Money::ZERO);
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let (store, share) = seeded().await;
        let mut uow = store.begin().await.unwrap();
        let mut updated = share.clone();
        updated.balance = Money::from_mills(1_000);
        uow.save_share(&updated, Money::ZERO).await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(
            store.get_share(share.id).await.unwrap().balance,
            Money::from_mills(1_000)
        );
    }

    #[tokio::test]
    async fn test_stale_balance_is_a_conflict() {
        let (store, share) = seeded().await;
        let mut uow = store.begin().await.unwrap();
        let err = uow
            .save_share(&share, Money::from_mills(5))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_transaction_needs_existing_share() {
        let (store, _) = seeded().await;
        let mut uow = store.begin().await.unwrap();
        let now = Utc::now();
        let orphan = Transaction::posted(
            ShareId::new(),
            Money::from_mills(1),
            Money::from_mills(1),
            crate::TransactionType::Deposit,
            "",
            now,
            now,
        );
        assert!(uow.insert_transaction(&orphan).await.is_err());
    }
}
