//! Ledger domain errors

use thiserror::Error;

use core_kernel::{Money, MoneyError, PortError, ShareId, ShareTypeId, TemporalError, WithdrawalLimitPeriod};

use crate::transaction::Transaction;

/// Errors that can occur in the ledger domain
///
/// The two rejection variants carry the audit row that was written for the
/// refused withdrawal.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    #[error("Nonsufficient funds in share {share_id}: balance {balance}, attempted {attempted}")]
    NonsufficientFunds {
        share_id: ShareId,
        balance: Money,
        attempted: Money,
        audit: Box<Transaction>,
    },

    #[error("Withdrawal limit of {limit} per {period} reached for share {share_id}")]
    WithdrawalLimitExceeded {
        share_id: ShareId,
        share_type_id: ShareTypeId,
        limit: u32,
        period: WithdrawalLimitPeriod,
        audit: Box<Transaction>,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Temporal error: {0}")]
    Temporal(#[from] TemporalError),

    #[error("Storage error: {0}")]
    Port(#[from] PortError),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        LedgerError::InvalidOperation(message.into())
    }

    /// The audit row persisted for a refused withdrawal
    pub fn audit_record(&self) -> Option<&Transaction> {
        match self {
            LedgerError::NonsufficientFunds { audit, .. }
            | LedgerError::WithdrawalLimitExceeded { audit, .. } => Some(audit),
            _ => None,
        }
    }

    /// Returns true for refusals that leave an audit row behind
    pub fn is_rejection(&self) -> bool {
        self.audit_record().is_some()
    }

    /// Returns true if the unit of work lost a conditional write
    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::Port(e) if e.is_conflict())
    }
}
