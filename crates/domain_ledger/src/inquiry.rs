//! Read-only ledger queries

use serde::Serialize;
use std::sync::Arc;

use core_kernel::{Money, ShareId};

use crate::error::LedgerError;
use crate::poster::discard;
use crate::ports::LedgerStore;
use crate::transaction::Transaction;

/// Balance of a share against the sum of its transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareReconciliation {
    pub share_id: ShareId,
    pub balance: Money,
    pub transaction_total: Money,
    pub transaction_count: usize,
}

impl ShareReconciliation {
    pub fn is_balanced(&self) -> bool {
        self.balance == self.transaction_total
    }

    pub fn discrepancy(&self) -> Money {
        self.balance - self.transaction_total
    }
}

/// Statement and reconciliation reads
pub struct LedgerInquiry {
    store: Arc<dyn LedgerStore>,
}

impl LedgerInquiry {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Transactions of a share in posting order
    pub async fn share_transactions(&self, share_id: ShareId) -> Result<Vec<Transaction>, LedgerError> {
        let mut uow = self.store.begin().await?;
        let result = async {
            uow.share(share_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Share", share_id))?;
            Ok::<_, LedgerError>(uow.transactions_for_share(share_id).await?)
        }
        .await;
        discard(uow).await;
        result
    }

    /// Compares the stored balance with the transaction log
    pub async fn reconcile_share(&self, share_id: ShareId) -> Result<ShareReconciliation, LedgerError> {
        let mut uow = self.store.begin().await?;
        let loaded = async {
            let share = uow
                .share(share_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Share", share_id))?;
            let transactions = uow.transactions_for_share(share_id).await?;
            Ok::<_, LedgerError>((share, transactions))
        }
        .await;
        discard(uow).await;
        let (share, transactions) = loaded?;

        let mut total = Money::ZERO;
        for tx in &transactions {
            total = total.checked_add(tx.amount)?;
        }
        Ok(ShareReconciliation {
            share_id,
            balance: share.balance,
            transaction_total: total,
            transaction_count: transactions.len(),
        })
    }
}
