//! Trade settlement and stock price updates

use std::sync::Arc;
use tracing::{info, warn};

use core_kernel::{Clock, Money, ShareId, StockId, StudentId};
use domain_ledger::poster::{apply_posting, discard, finish_failed, retry_on_conflict};
use domain_ledger::{LedgerConfig, PostingRequest, TransactionType};

use crate::error::TradingError;
use crate::history::{StockHistory, StudentStockHistory};
use crate::ports::TradingStore;
use crate::stock::Stock;
use crate::student_stock::StudentStock;

/// Buys and sells stock against a student's share
pub struct TradingEngine {
    store: Arc<dyn TradingStore>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl TradingEngine {
    pub fn new(store: Arc<dyn TradingStore>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        Self { store, clock, config }
    }

    /// Buys `quantity` shares when positive, sells `|quantity|` when negative
    ///
    /// The share is debited or credited `|quantity| × current_value`. The
    /// stock pool, the position, the money and the trade history commit
    /// together; a purchase the share cannot afford commits only its `NSF`
    /// audit row.
    pub async fn trade(
        &self,
        share_id: ShareId,
        stock_id: StockId,
        quantity: i64,
    ) -> Result<StudentStock, TradingError> {
        if quantity == 0 {
            return Err(TradingError::invalid_operation("Trade quantity must not be zero"));
        }
        let magnitude = quantity
            .checked_abs()
            .ok_or_else(|| TradingError::invalid_operation("Trade quantity out of range"))?;

        retry_on_conflict(self.config.max_conflict_retries, "trade", || {
            self.try_trade(share_id, stock_id, quantity, magnitude)
        })
        .await
    }

    async fn try_trade(
        &self,
        share_id: ShareId,
        stock_id: StockId,
        quantity: i64,
        magnitude: i64,
    ) -> Result<StudentStock, TradingError> {
        let mut uow = self.store.begin_trading().await?;
        let now = self.clock.now();

        let mut stock = uow
            .stock(stock_id)
            .await?
            .filter(Stock::is_tradeable)
            .ok_or_else(|| TradingError::not_found("Stock", stock_id))?;
        let share = uow
            .share(share_id)
            .await?
            .filter(|s| s.accepts_transactions())
            .ok_or_else(|| TradingError::not_found("Share", share_id))?;
        let existing = uow.position(share.student_id, stock_id).await?;
        let expected_owned = existing.as_ref().map(|p| p.shares_owned);
        let mut position = existing.unwrap_or_else(|| StudentStock::empty(share.student_id, stock_id, now));

        let buying = quantity > 0;
        if buying && magnitude > stock.available_shares {
            warn!(stock_id = %stock_id, requested = magnitude, available = stock.available_shares, "Not enough stock available");
            discard(uow).await;
            return Err(TradingError::InvalidShareQuantity {
                stock_id,
                requested: magnitude,
                available: stock.available_shares,
            });
        }
        if !buying && magnitude > position.shares_owned {
            warn!(stock_id = %stock_id, requested = magnitude, owned = position.shares_owned, "Not enough shares owned");
            discard(uow).await;
            return Err(TradingError::NotEnoughShares {
                stock_id,
                requested: magnitude,
                owned: position.shares_owned,
            });
        }
        if !stock.current_value.is_positive() {
            discard(uow).await;
            return Err(TradingError::invalid_operation(format!(
                "Stock {} has no value to trade at",
                stock.symbol
            )));
        }

        let trade_value = stock.current_value.checked_mul(magnitude)?;
        let (amount, verb) = if buying {
            (-trade_value, "Bought")
        } else {
            (trade_value, "Sold")
        };
        let request = PostingRequest::new(share.id, amount)
            .with_type(TransactionType::StockTrade)
            .with_comment(format!(
                "{} {} {} at {}",
                verb, magnitude, stock.symbol, stock.current_value
            ))
            .without_limit_assessment();
        let transaction = match apply_posting(uow.as_mut(), &request, now).await {
            Ok(transaction) => transaction,
            Err(err) => return Err(TradingError::Ledger(finish_failed(uow, err).await)),
        };

        let expected_available = stock.available_shares;
        stock.available_shares -= quantity;
        if stock.available_shares < 0 || stock.available_shares > stock.total_shares {
            return Err(TradingError::invalid_operation(format!(
                "Stock {} pool would hold {} of {} shares",
                stock.symbol, stock.available_shares, stock.total_shares
            )));
        }
        position.shares_owned += quantity;
        position.updated_at = now;

        uow.save_stock(&stock, expected_available).await?;
        uow.save_position(&position, expected_owned).await?;
        uow.insert_position_history(&StudentStockHistory::record(
            position.id,
            quantity,
            position.shares_owned,
            transaction.id,
            trade_value,
            now,
        ))
        .await?;
        uow.commit().await?;

        info!(
            share_id = %share_id,
            stock_id = %stock_id,
            quantity,
            value = %trade_value,
            owned = position.shares_owned,
            available = stock.available_shares,
            "Trade settled"
        );
        Ok(position)
    }

    /// Sets a stock's current value and records it in the price history
    pub async fn update_stock_value(&self, stock_id: StockId, new_value: Money) -> Result<Stock, TradingError> {
        if new_value.is_negative() {
            return Err(TradingError::invalid_operation("Stock value must not be negative"));
        }
        retry_on_conflict(self.config.max_conflict_retries, "update_stock_value", || {
            self.try_update_stock_value(stock_id, new_value)
        })
        .await
    }

    async fn try_update_stock_value(&self, stock_id: StockId, new_value: Money) -> Result<Stock, TradingError> {
        let mut uow = self.store.begin_trading().await?;
        let now = self.clock.now();

        let mut stock = uow
            .stock(stock_id)
            .await?
            .filter(Stock::is_tradeable)
            .ok_or_else(|| TradingError::not_found("Stock", stock_id))?;
        let previous = stock.current_value;
        stock.current_value = new_value;

        uow.save_stock(&stock, stock.available_shares).await?;
        uow.insert_stock_history(&StockHistory::record(stock_id, new_value, now)).await?;
        uow.commit().await?;

        info!(stock_id = %stock_id, previous = %previous, current = %new_value, "Stock value updated");
        Ok(stock)
    }

    /// A student's position in a stock, if they ever bought it
    pub async fn position(&self, student_id: StudentId, stock_id: StockId) -> Result<Option<StudentStock>, TradingError> {
        let mut uow = self.store.begin_trading().await?;
        let position = uow.position(student_id, stock_id).await;
        discard(uow).await;
        Ok(position?)
    }

    /// Prices a stock has had, oldest first
    pub async fn price_history(&self, stock_id: StockId) -> Result<Vec<StockHistory>, TradingError> {
        let mut uow = self.store.begin_trading().await?;
        let history = uow.stock_history(stock_id).await;
        discard(uow).await;
        Ok(history?)
    }

    /// Trades on a position, oldest first
    pub async fn trade_history(&self, position: &StudentStock) -> Result<Vec<StudentStockHistory>, TradingError> {
        let mut uow = self.store.begin_trading().await?;
        let history = uow.position_history(position.id).await;
        discard(uow).await;
        Ok(history?)
    }
}
