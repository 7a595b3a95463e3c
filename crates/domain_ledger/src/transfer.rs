//! Share-to-share transfers

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use core_kernel::{Clock, Money, ShareId};

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::poster::{apply_posting, discard, finish_failed, retry_on_conflict, PostingRequest};
use crate::ports::LedgerStore;
use crate::transaction::{Transaction, TransactionType};

/// Moves money from one share to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source: ShareId,
    pub destination: ShareId,
    /// Must be positive
    pub amount: Money,
    pub comment: Option<String>,
    pub effective_date: Option<DateTime<Utc>>,
    pub take_negative: bool,
    pub assess_withdrawal_limit: bool,
}

impl TransferRequest {
    pub fn new(source: ShareId, destination: ShareId, amount: Money) -> Self {
        Self {
            source,
            destination,
            amount,
            comment: None,
            effective_date: None,
            take_negative: false,
            assess_withdrawal_limit: true,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn effective_on(mut self, effective_date: DateTime<Utc>) -> Self {
        self.effective_date = Some(effective_date);
        self
    }

    pub fn allow_negative(mut self) -> Self {
        self.take_negative = true;
        self
    }

    pub fn without_limit_assessment(mut self) -> Self {
        self.assess_withdrawal_limit = false;
        self
    }

    fn withdrawal_leg(&self) -> PostingRequest {
        let mut leg = PostingRequest::new(self.source, -self.amount)
            .with_type(TransactionType::Transfer)
            .with_comment(
                self.comment
                    .clone()
                    .unwrap_or_else(|| format!("Transfer to {}", self.destination)),
            );
        leg.effective_date = self.effective_date;
        leg.take_negative = self.take_negative;
        leg.assess_withdrawal_limit = self.assess_withdrawal_limit;
        leg
    }

    fn deposit_leg(&self) -> PostingRequest {
        let mut leg = PostingRequest::new(self.destination, self.amount)
            .with_type(TransactionType::Transfer)
            .with_comment(
                self.comment
                    .clone()
                    .unwrap_or_else(|| format!("Transfer from {}", self.source)),
            );
        leg.effective_date = self.effective_date;
        leg
    }
}

/// Runs transfers as one unit of work per transfer
pub struct TransferService {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl TransferService {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        Self { store, clock, config }
    }

    /// Posts the withdrawal leg then the deposit leg atomically
    ///
    /// Returns `(withdrawal, deposit)`. If the withdrawal is refused only
    /// its audit row is committed; the destination is never touched.
    pub async fn transfer(
        &self,
        request: TransferRequest,
    ) -> Result<(Transaction, Transaction), LedgerError> {
        if !request.amount.is_positive() {
            return Err(LedgerError::invalid_operation(
                "Transfer amount must be positive",
            ));
        }
        if request.source == request.destination {
            return Err(LedgerError::invalid_operation(
                "Cannot transfer a share to itself",
            ));
        }

        retry_on_conflict(self.config.max_conflict_retries, "transfer", || {
            self.try_transfer(&request)
        })
        .await
    }

    async fn try_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<(Transaction, Transaction), LedgerError> {
        let mut uow = self.store.begin().await?;
        let now = self.clock.now();

        let withdrawal = match apply_posting(uow.as_mut(), &request.withdrawal_leg(), now).await {
            Ok(tx) => tx,
            Err(err) => return Err(finish_failed(uow, err).await),
        };
        let deposit = match apply_posting(uow.as_mut(), &request.deposit_leg(), now).await {
            Ok(tx) => tx,
            // Nothing from the withdrawal leg may survive a failed deposit
            Err(err) => {
                discard(uow).await;
                return Err(err);
            }
        };

        uow.commit().await?;
        info!(
            source = %request.source,
            destination = %request.destination,
            amount = %request.amount,
            "Transfer posted"
        );
        Ok((withdrawal, deposit))
    }
}
