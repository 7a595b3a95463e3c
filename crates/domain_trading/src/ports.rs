//! Trading Domain Ports
//!
//! A trading unit of work is a ledger unit of work with stock tables on
//! top, so one commit covers the stock pool, the position and the money.

use async_trait::async_trait;

use core_kernel::{DomainPort, PortError, StockId, StudentId, StudentStockId};
use domain_ledger::LedgerUnitOfWork;

use crate::history::{StockHistory, StudentStockHistory};
use crate::stock::Stock;
use crate::student_stock::StudentStock;

#[async_trait]
pub trait TradingUnitOfWork: LedgerUnitOfWork {
    /// Loads a stock, including deleted ones
    async fn stock(&mut self, id: StockId) -> Result<Option<Stock>, PortError>;

    /// Writes a stock whose stored available count must still be `expected_available`
    async fn save_stock(&mut self, stock: &Stock, expected_available: i64) -> Result<(), PortError>;

    async fn position(
        &mut self,
        student_id: StudentId,
        stock_id: StockId,
    ) -> Result<Option<StudentStock>, PortError>;

    /// Inserts the position when `expected_owned` is `None`, otherwise
    /// updates it if the stored count is still `expected_owned`
    async fn save_position(
        &mut self,
        position: &StudentStock,
        expected_owned: Option<i64>,
    ) -> Result<(), PortError>;

    async fn insert_stock_history(&mut self, entry: &StockHistory) -> Result<(), PortError>;

    async fn insert_position_history(&mut self, entry: &StudentStockHistory) -> Result<(), PortError>;

    /// Price history of a stock, oldest first
    async fn stock_history(&mut self, stock_id: StockId) -> Result<Vec<StockHistory>, PortError>;

    /// Trades on a position, oldest first
    async fn position_history(
        &mut self,
        student_stock_id: StudentStockId,
    ) -> Result<Vec<StudentStockHistory>, PortError>;
}

/// Entry point for trading storage
#[async_trait]
pub trait TradingStore: DomainPort {
    async fn begin_trading(&self) -> Result<Box<dyn TradingUnitOfWork>, PortError>;
}
