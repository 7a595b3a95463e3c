//! Ledger transactions
//!
//! Transactions are append-only. Every balance change writes exactly one
//! row; rejected withdrawals write a zero-amount audit row instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use core_kernel::{Money, ShareId, TransactionId};

use crate::error::LedgerError;

/// Short tag stored with every transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    /// `D`
    Deposit,
    /// `W`
    Withdrawal,
    /// `NSF` rejection audit row
    NonsufficientFunds,
    /// `EX` limit rejection audit row, or the fee charged for exceeding the limit
    WithdrawalLimitExceeded,
    /// `DIV`
    Dividend,
    /// `TRF` leg of a transfer
    Transfer,
    /// `PUR`
    Purchase,
    /// `STK` settlement of a stock trade
    StockTrade,
}

impl TransactionType {
    pub const ALL: [TransactionType; 8] = [
        TransactionType::Deposit,
        TransactionType::Withdrawal,
        TransactionType::NonsufficientFunds,
        TransactionType::WithdrawalLimitExceeded,
        TransactionType::Dividend,
        TransactionType::Transfer,
        TransactionType::Purchase,
        TransactionType::StockTrade,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "D",
            TransactionType::Withdrawal => "W",
            TransactionType::NonsufficientFunds => "NSF",
            TransactionType::WithdrawalLimitExceeded => "EX",
            TransactionType::Dividend => "DIV",
            TransactionType::Transfer => "TRF",
            TransactionType::Purchase => "PUR",
            TransactionType::StockTrade => "STK",
        }
    }

    /// Default tag for an amount when the caller does not pick one
    pub fn default_for(amount: Money) -> Self {
        if amount.is_negative() {
            TransactionType::Withdrawal
        } else {
            TransactionType::Deposit
        }
    }

    /// Returns true for the zero-amount rows written when a withdrawal is refused
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TransactionType::NonsufficientFunds | TransactionType::WithdrawalLimitExceeded
        )
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        TransactionType::ALL
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| LedgerError::invalid_operation(format!("Unknown transaction type: {}", s)))
    }
}

impl Serialize for TransactionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for TransactionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A single row in a share's transaction log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub share_id: ShareId,
    /// Signed amount; negative for debits
    pub amount: Money,
    /// Share balance after this row was applied
    pub new_balance: Money,
    pub transaction_type: TransactionType,
    pub comment: String,
    pub effective_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Creates a row that moves money
    pub fn posted(
        share_id: ShareId,
        amount: Money,
        new_balance: Money,
        transaction_type: TransactionType,
        comment: impl Into<String>,
        effective_date: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new_v7(),
            share_id,
            amount,
            new_balance,
            transaction_type,
            comment: comment.into(),
            effective_date,
            created_at,
        }
    }

    /// Creates a zero-amount audit row recording a refused withdrawal
    pub fn audit(
        share_id: ShareId,
        balance: Money,
        transaction_type: TransactionType,
        comment: impl Into<String>,
        effective_date: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::posted(
            share_id,
            Money::ZERO,
            balance,
            transaction_type,
            comment,
            effective_date,
            created_at,
        )
    }

    pub fn is_debit(&self) -> bool {
        self.amount.is_negative()
    }
}
