//! Append-only price and trade history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Money, StockHistoryId, StockId, StudentStockHistoryId, StudentStockId, TransactionId};

/// A price a stock was set to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockHistory {
    pub id: StockHistoryId,
    pub stock_id: StockId,
    pub value: Money,
    pub changed_at: DateTime<Utc>,
}

impl StockHistory {
    pub fn record(stock_id: StockId, value: Money, changed_at: DateTime<Utc>) -> Self {
        Self {
            id: StockHistoryId::new_v7(),
            stock_id,
            value,
            changed_at,
        }
    }
}

/// One settled trade on a student's position
///
/// `transaction_id` points at the ledger row that settled the trade. It is
/// a plain reference; removing the transaction does not remove the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentStockHistory {
    pub id: StudentStockHistoryId,
    pub student_stock_id: StudentStockId,
    /// Positive for purchases, negative for sales
    pub quantity_traded: i64,
    pub shares_owned_after: i64,
    pub transaction_id: TransactionId,
    /// Unsigned value of the trade
    pub trade_value: Money,
    pub traded_at: DateTime<Utc>,
}

impl StudentStockHistory {
    pub fn record(
        student_stock_id: StudentStockId,
        quantity_traded: i64,
        shares_owned_after: i64,
        transaction_id: TransactionId,
        trade_value: Money,
        traded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: StudentStockHistoryId::new_v7(),
            student_stock_id,
            quantity_traded,
            shares_owned_after,
            transaction_id,
            trade_value,
            traded_at,
        }
    }

    pub fn is_purchase(&self) -> bool {
        self.quantity_traded > 0
    }
}
