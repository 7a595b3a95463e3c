//! In-memory trading store
//!
//! Shares one lock and one set of tables between the ledger and trading
//! ports, so trades and plain postings see each other's commits.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use core_kernel::{DomainPort, Money, PortError, ShareId, ShareTypeId, StockId, StudentId, StudentStockId};
use domain_ledger::{
    LedgerStore, LedgerTables, LedgerUnitOfWork, Share, SharePageQuery, ShareType, Student, Transaction,
};

use crate::history::{StockHistory, StudentStockHistory};
use crate::ports::{TradingStore, TradingUnitOfWork};
use crate::stock::Stock;
use crate::student_stock::StudentStock;

/// Ledger tables plus the trading tables
#[derive(Debug, Clone, Default)]
pub struct TradingTables {
    pub ledger: LedgerTables,
    pub stocks: HashMap<StockId, Stock>,
    pub positions: HashMap<StudentStockId, StudentStock>,
    pub stock_history: Vec<StockHistory>,
    pub position_history: Vec<StudentStockHistory>,
}

impl TradingTables {
    fn position(&self, student_id: StudentId, stock_id: StockId) -> Option<StudentStock> {
        self.positions
            .values()
            .find(|p| p.student_id == student_id && p.stock_id == stock_id)
            .cloned()
    }

    fn save_stock(&mut self, stock: &Stock, expected_available: i64) -> Result<(), PortError> {
        match self.stocks.get_mut(&stock.id) {
            Some(stored) if stored.available_shares == expected_available => {
                *stored = stock.clone();
                Ok(())
            }
            Some(stored) => Err(PortError::conflict(format!(
                "stock {} has {} shares available, expected {}",
                stock.id, stored.available_shares, expected_available
            ))),
            None => Err(PortError::not_found("Stock", stock.id)),
        }
    }

    fn save_position(&mut self, position: &StudentStock, expected_owned: Option<i64>) -> Result<(), PortError> {
        if position.shares_owned < 0 {
            return Err(PortError::constraint(format!(
                "position {} would own {} shares",
                position.id, position.shares_owned
            )));
        }
        match expected_owned {
            None => {
                if self.positions.contains_key(&position.id)
                    || self.position(position.student_id, position.stock_id).is_some()
                {
                    return Err(PortError::conflict(format!(
                        "student {} already holds stock {}",
                        position.student_id, position.stock_id
                    )));
                }
                self.positions.insert(position.id, position.clone());
                Ok(())
            }
            Some(expected) => match self.positions.get_mut(&position.id) {
                Some(stored) if stored.shares_owned == expected => {
                    *stored = position.clone();
                    Ok(())
                }
                Some(stored) => Err(PortError::conflict(format!(
                    "position {} owns {} shares, expected {}",
                    position.id, stored.shares_owned, expected
                ))),
                None => Err(PortError::not_found("StudentStock", position.id)),
            },
        }
    }
}

/// Ledger and trading store kept in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryTradingStore {
    tables: Arc<Mutex<TradingTables>>,
}

impl InMemoryTradingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_student(&self, student: Student) {
        self.tables.lock().await.ledger.students.insert(student.id, student);
    }

    pub async fn insert_share_type(&self, share_type: ShareType) {
        self.tables.lock().await.ledger.save_share_type(&share_type);
    }

    pub async fn insert_share(&self, share: Share) {
        self.tables.lock().await.ledger.shares.insert(share.id, share);
    }

    pub async fn insert_stock(&self, stock: Stock) {
        self.tables.lock().await.stocks.insert(stock.id, stock);
    }

    pub async fn snapshot(&self) -> TradingTables {
        self.tables.lock().await.clone()
    }

    pub async fn get_stock(&self, id: StockId) -> Option<Stock> {
        self.tables.lock().await.stocks.get(&id).cloned()
    }

    pub async fn get_share(&self, id: ShareId) -> Option<Share> {
        self.tables.lock().await.ledger.share(id)
    }

    pub async fn get_position(&self, student_id: StudentId, stock_id: StockId) -> Option<StudentStock> {
        self.tables.lock().await.position(student_id, stock_id)
    }

    async fn open(&self) -> InMemoryTradingUnitOfWork {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        InMemoryTradingUnitOfWork { guard, working }
    }
}

impl DomainPort for InMemoryTradingStore {}

#[async_trait]
impl LedgerStore for InMemoryTradingStore {
    async fn begin(&self) -> Result<Box<dyn LedgerUnitOfWork>, PortError> {
        Ok(Box::new(self.open().await))
    }
}

#[async_trait]
impl TradingStore for InMemoryTradingStore {
    async fn begin_trading(&self) -> Result<Box<dyn TradingUnitOfWork>, PortError> {
        Ok(Box::new(self.open().await))
    }
}

/// Unit of work over [`InMemoryTradingStore`]
pub struct InMemoryTradingUnitOfWork {
    guard: OwnedMutexGuard<TradingTables>,
    working: TradingTables,
}

#[async_trait]
impl LedgerUnitOfWork for InMemoryTradingUnitOfWork {
    async fn share(&mut self, id: ShareId) -> Result<Option<Share>, PortError> {
        Ok(self.working.ledger.share(id))
    }

    async fn share_type(&mut self, id: ShareTypeId) -> Result<Option<ShareType>, PortError> {
        Ok(self.working.ledger.share_type(id))
    }

    async fn student(&mut self, id: StudentId) -> Result<Option<Student>, PortError> {
        Ok(self.working.ledger.student(id))
    }

    async fn share_types(&mut self) -> Result<Vec<ShareType>, PortError> {
        Ok(self.working.ledger.active_share_types())
    }

    async fn save_share(&mut self, share: &Share, expected_balance: Money) -> Result<(), PortError> {
        self.working.ledger.save_share(share, expected_balance)
    }

    async fn save_share_type(&mut self, share_type: &ShareType) -> Result<(), PortError> {
        self.working.ledger.save_share_type(share_type);
        Ok(())
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), PortError> {
        self.working.ledger.insert_transaction(transaction)
    }

    async fn transactions_for_share(&mut self, id: ShareId) -> Result<Vec<Transaction>, PortError> {
        Ok(self.working.ledger.transactions_for_share(id))
    }

    async fn shares_page(&mut self, query: &SharePageQuery) -> Result<Vec<Share>, PortError> {
        Ok(self.working.ledger.shares_page(query))
    }

    async fn reset_withdrawal_counts(&mut self, ids: &[ShareId]) -> Result<u64, PortError> {
        Ok(self.working.ledger.reset_withdrawal_counts(ids))
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        let InMemoryTradingUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        Ok(())
    }
}

#[async_trait]
impl TradingUnitOfWork for InMemoryTradingUnitOfWork {
    async fn stock(&mut self, id: StockId) -> Result<Option<Stock>, PortError> {
        Ok(self.working.stocks.get(&id).cloned())
    }

    async fn save_stock(&mut self, stock: &Stock, expected_available: i64) -> Result<(), PortError> {
        self.working.save_stock(stock, expected_available)
    }

    async fn position(
        &mut self,
        student_id: StudentId,
        stock_id: StockId,
    ) -> Result<Option<StudentStock>, PortError> {
        Ok(self.working.position(student_id, stock_id))
    }

    async fn save_position(
        &mut self,
        position: &StudentStock,
        expected_owned: Option<i64>,
    ) -> Result<(), PortError> {
        self.working.save_position(position, expected_owned)
    }

    async fn insert_stock_history(&mut self, entry: &StockHistory) -> Result<(), PortError> {
        self.working.stock_history.push(entry.clone());
        Ok(())
    }

    async fn insert_position_history(&mut self, entry: &StudentStockHistory) -> Result<(), PortError> {
        self.working.position_history.push(entry.clone());
        Ok(())
    }

    async fn stock_history(&mut self, stock_id: StockId) -> Result<Vec<StockHistory>, PortError> {
        Ok(self
            .working
            .stock_history
            .iter()
            .filter(|h| h.stock_id == stock_id)
            .cloned()
            .collect())
    }

    async fn position_history(
        &mut self,
        student_stock_id: StudentStockId,
    ) -> Result<Vec<StudentStockHistory>, PortError> {
        Ok(self
            .working
            .position_history
            .iter()
            .filter(|h| h.student_stock_id == student_stock_id)
            .cloned()
            .collect())
    }
}
