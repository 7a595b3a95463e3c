//! PostgreSQL Ledger Adapter
//!
//! Implements the ledger and trading store ports on top of a PostgreSQL
//! pool. Each unit of work owns one database transaction: loads lock the
//! rows they read (`SELECT ... FOR UPDATE`) and guarded updates check the
//! value the caller last saw, so a lost race surfaces as
//! `PortError::Conflict` and the service retries.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, PgStore};
//! use domain_ledger::{LedgerStore, TransactionPoster};
//! use std::sync::Arc;
//!
//! let pool = create_pool(DatabaseConfig::new(url)).await?;
//! let store: Arc<dyn LedgerStore> = Arc::new(PgStore::new(pool));
//! ```

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use tracing::{debug, instrument};

use core_kernel::{
    DomainPort, Money, PortError, ShareId, ShareTypeId, StockId, StudentId, StudentStockId,
};
use domain_ledger::{
    LedgerStore, LedgerUnitOfWork, Share, SharePageQuery, ShareType, Student, Transaction,
};
use domain_trading::{
    Stock, StockHistory, StudentStock, StudentStockHistory, TradingStore, TradingUnitOfWork,
};

use crate::error::DatabaseError;
use crate::repositories::{LedgerRepository, TradingRepository};

/// PostgreSQL-backed implementation of the ledger and trading stores
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Opens a unit of work usable through either port
    pub async fn begin_unit(&self) -> Result<PgUnitOfWork, PortError> {
        let tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        Ok(PgUnitOfWork { tx })
    }

    /// Verifies the database answers queries
    pub async fn health_check(&self) -> Result<(), PortError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(())
    }

    pub async fn insert_student(&self, student: &Student) -> Result<(), PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        LedgerRepository::insert_student(&mut conn, student).await?;
        Ok(())
    }

    pub async fn insert_share_type(&self, share_type: &ShareType) -> Result<(), PortError> {
        let mut uow = self.begin_unit().await?;
        LedgerRepository::upsert_share_type(&mut uow.tx, share_type).await?;
        Box::new(uow).commit().await
    }

    pub async fn insert_share(&self, share: &Share) -> Result<(), PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        LedgerRepository::insert_share(&mut conn, share).await?;
        Ok(())
    }

    pub async fn insert_stock(&self, stock: &Stock) -> Result<(), PortError> {
        let mut uow = self.begin_unit().await?;
        TradingRepository::insert_stock(&mut uow.tx, stock).await?;
        Box::new(uow).commit().await
    }
}

impl DomainPort for PgStore {}

#[async_trait]
impl LedgerStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn LedgerUnitOfWork>, PortError> {
        Ok(Box::new(self.begin_unit().await?))
    }
}

#[async_trait]
impl TradingStore for PgStore {
    async fn begin_trading(&self) -> Result<Box<dyn TradingUnitOfWork>, PortError> {
        Ok(Box::new(self.begin_unit().await?))
    }
}

/// One open database transaction
///
/// Dropping it without calling `commit` rolls the transaction back.
pub struct PgUnitOfWork {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerUnitOfWork for PgUnitOfWork {
    async fn share(&mut self, id: ShareId) -> Result<Option<Share>, PortError> {
        Ok(LedgerRepository::get_share(&mut self.tx, id).await?)
    }

    async fn share_type(&mut self, id: ShareTypeId) -> Result<Option<ShareType>, PortError> {
        Ok(LedgerRepository::get_share_type(&mut self.tx, id).await?)
    }

    async fn lock_share_type(&mut self, id: ShareTypeId) -> Result<Option<ShareType>, PortError> {
        Ok(LedgerRepository::lock_share_type(&mut self.tx, id).await?)
    }

    async fn student(&mut self, id: StudentId) -> Result<Option<Student>, PortError> {
        Ok(LedgerRepository::get_student(&mut self.tx, id).await?)
    }

    async fn share_types(&mut self) -> Result<Vec<ShareType>, PortError> {
        Ok(LedgerRepository::list_share_types(&mut self.tx).await?)
    }

    #[instrument(skip(self, share), fields(share_id = %share.id))]
    async fn save_share(&mut self, share: &Share, expected_balance: Money) -> Result<(), PortError> {
        let written =
            LedgerRepository::update_share_if_balance(&mut self.tx, share, expected_balance).await?;
        if written > 0 {
            return Ok(());
        }
        if LedgerRepository::share_exists(&mut self.tx, share.id).await? {
            debug!(expected = %expected_balance, "Share balance moved under us");
            Err(PortError::conflict(format!(
                "Share {} balance is no longer {}",
                share.id, expected_balance
            )))
        } else {
            Err(PortError::not_found("Share", share.id))
        }
    }

    async fn save_share_type(&mut self, share_type: &ShareType) -> Result<(), PortError> {
        Ok(LedgerRepository::upsert_share_type(&mut self.tx, share_type).await?)
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), PortError> {
        Ok(LedgerRepository::insert_transaction(&mut self.tx, transaction).await?)
    }

    async fn transactions_for_share(&mut self, id: ShareId) -> Result<Vec<Transaction>, PortError> {
        Ok(LedgerRepository::transactions_for_share(&mut self.tx, id).await?)
    }

    async fn shares_page(&mut self, query: &SharePageQuery) -> Result<Vec<Share>, PortError> {
        Ok(LedgerRepository::shares_page(&mut self.tx, query).await?)
    }

    async fn reset_withdrawal_counts(&mut self, ids: &[ShareId]) -> Result<u64, PortError> {
        if ids.is_empty() {
            return Ok(0);
        }
        Ok(LedgerRepository::reset_withdrawal_counts(&mut self.tx, ids).await?)
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        let uow = *self;
        uow.tx.commit().await.map_err(DatabaseError::from)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        let uow = *self;
        uow.tx.rollback().await.map_err(DatabaseError::from)?;
        Ok(())
    }
}

#[async_trait]
impl TradingUnitOfWork for PgUnitOfWork {
    async fn stock(&mut self, id: StockId) -> Result<Option<Stock>, PortError> {
        Ok(TradingRepository::get_stock(&mut self.tx, id).await?)
    }

    #[instrument(skip(self, stock), fields(stock_id = %stock.id))]
    async fn save_stock(&mut self, stock: &Stock, expected_available: i64) -> Result<(), PortError> {
        let written =
            TradingRepository::update_stock_if_available(&mut self.tx, stock, expected_available)
                .await?;
        if written > 0 {
            return Ok(());
        }
        if TradingRepository::stock_exists(&mut self.tx, stock.id).await? {
            Err(PortError::conflict(format!(
                "Stock {} available shares are no longer {}",
                stock.id, expected_available
            )))
        } else {
            Err(PortError::not_found("Stock", stock.id))
        }
    }

    async fn position(
        &mut self,
        student_id: StudentId,
        stock_id: StockId,
    ) -> Result<Option<StudentStock>, PortError> {
        Ok(TradingRepository::get_position(&mut self.tx, student_id, stock_id).await?)
    }

    async fn save_position(
        &mut self,
        position: &StudentStock,
        expected_owned: Option<i64>,
    ) -> Result<(), PortError> {
        let written = match expected_owned {
            None => TradingRepository::insert_position(&mut self.tx, position).await?,
            Some(owned) => {
                TradingRepository::update_position_if_owned(&mut self.tx, position, owned).await?
            }
        };
        if written == 0 {
            return Err(PortError::conflict(format!(
                "Position of student {} in stock {} changed concurrently",
                position.student_id, position.stock_id
            )));
        }
        Ok(())
    }

    async fn insert_stock_history(&mut self, entry: &StockHistory) -> Result<(), PortError> {
        Ok(TradingRepository::insert_stock_history(&mut self.tx, entry).await?)
    }

    async fn insert_position_history(&mut self, entry: &StudentStockHistory) -> Result<(), PortError> {
        Ok(TradingRepository::insert_position_history(&mut self.tx, entry).await?)
    }

    async fn stock_history(&mut self, stock_id: StockId) -> Result<Vec<StockHistory>, PortError> {
        Ok(TradingRepository::stock_history(&mut self.tx, stock_id).await?)
    }

    async fn position_history(
        &mut self,
        student_stock_id: StudentStockId,
    ) -> Result<Vec<StudentStockHistory>, PortError> {
        Ok(TradingRepository::position_history(&mut self.tx, student_stock_id).await?)
    }
}
