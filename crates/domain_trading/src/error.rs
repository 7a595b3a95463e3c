//! Trading domain errors

use thiserror::Error;

use core_kernel::{MoneyError, PortError, StockId};
use domain_ledger::LedgerError;
use domain_ledger::poster::ConflictAware;

/// Errors that can occur while trading
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("Cannot buy {requested} shares of {stock_id}: only {available} available")]
    InvalidShareQuantity {
        stock_id: StockId,
        requested: i64,
        available: i64,
    },

    #[error("Cannot sell {requested} shares of {stock_id}: only {owned} owned")]
    NotEnoughShares {
        stock_id: StockId,
        requested: i64,
        owned: i64,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Storage error: {0}")]
    Port(#[from] PortError),
}

impl TradingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        TradingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        TradingError::InvalidOperation(message.into())
    }
}

impl From<MoneyError> for TradingError {
    fn from(err: MoneyError) -> Self {
        TradingError::Ledger(LedgerError::Money(err))
    }
}

impl ConflictAware for TradingError {
    fn is_conflict(&self) -> bool {
        match self {
            TradingError::Port(err) => err.is_conflict(),
            TradingError::Ledger(err) => err.is_conflict(),
            _ => false,
        }
    }
}
