//! Transaction posting
//!
//! Every balance change in the ledger goes through [`apply_posting`]. It
//! runs inside a caller-supplied unit of work so transfers, trades and
//! batches can combine several postings atomically.
//!
//! # Withdrawal rules
//!
//! 1. Zero amounts are refused outright
//! 2. A counted withdrawal on a share at its limit either pays the share
//!    type's fee (an extra `EX` debit) or is refused with an `EX` audit row
//! 3. A withdrawal that would take the balance below zero, fee included,
//!    is refused with an `NSF` audit row unless negative balances are allowed
//!
//! Refusals write their audit row into the unit of work before returning the
//! error; the caller decides whether that row survives.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use core_kernel::{Clock, Money, ShareId};

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::ports::{LedgerStore, LedgerUnitOfWork};
use crate::share::Share;
use crate::transaction::{Transaction, TransactionType};

/// A single posting against one share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingRequest {
    pub share_id: ShareId,
    /// Signed amount; negative for withdrawals
    pub amount: Money,
    pub comment: Option<String>,
    /// Defaults to `D` or `W` by sign
    pub transaction_type: Option<TransactionType>,
    /// Defaults to the posting time
    pub effective_date: Option<DateTime<Utc>>,
    /// Allow the balance to go below zero
    pub take_negative: bool,
    /// Count the withdrawal against the share type's limit
    pub assess_withdrawal_limit: bool,
}

impl PostingRequest {
    pub fn new(share_id: ShareId, amount: Money) -> Self {
        Self {
            share_id,
            amount,
            comment: None,
            transaction_type: None,
            effective_date: None,
            take_negative: false,
            assess_withdrawal_limit: true,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
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
}

/// Options for [`TransactionPoster::post_many`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Roll back the whole batch on the first refused withdrawal
    pub stop_on_exception: bool,
    /// Applied on top of each request's own flag
    pub assess_withdrawal_limit: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            stop_on_exception: true,
            assess_withdrawal_limit: true,
        }
    }
}

/// A refused request inside a batch that kept going
#[derive(Debug)]
pub struct BatchFailure {
    /// Position of the request in the submitted batch
    pub index: usize,
    pub error: LedgerError,
}

/// Result of a committed batch
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub posted: Vec<Transaction>,
    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Errors that can report a lost conditional write
pub trait ConflictAware {
    fn is_conflict(&self) -> bool;
}

impl ConflictAware for LedgerError {
    fn is_conflict(&self) -> bool {
        LedgerError::is_conflict(self)
    }
}

/// Runs `attempt` again while it fails with a conflict, at most `max_retries` extra times
pub async fn retry_on_conflict<T, E, F, Fut>(
    max_retries: u32,
    operation: &'static str,
    mut attempt: F,
) -> Result<T, E>
where
    E: ConflictAware,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(err) if err.is_conflict() && retries < max_retries => {
                retries += 1;
                warn!(operation, retries, "Unit of work lost a conditional write, retrying");
            }
            result => return result,
        }
    }
}

/// Applies one posting inside `uow`
///
/// On success the transaction row, balance, last-active date and (for
/// counted withdrawals) the withdrawal counter are written. On a refusal
/// only the audit row is written.
pub async fn apply_posting<U>(
    uow: &mut U,
    request: &PostingRequest,
    now: DateTime<Utc>,
) -> Result<Transaction, LedgerError>
where
    U: LedgerUnitOfWork + ?Sized,
{
    if request.amount.is_zero() {
        return Err(LedgerError::invalid_operation(
            "Transaction amount must not be zero",
        ));
    }

    let share = uow
        .share(request.share_id)
        .await?
        .filter(Share::accepts_transactions)
        .ok_or_else(|| LedgerError::not_found("Share", request.share_id))?;
    let share_type = uow
        .share_type(share.share_type_id)
        .await?
        .filter(|st| !st.is_deleted)
        .ok_or_else(|| LedgerError::not_found("ShareType", share.share_type_id))?;

    let effective_date = request.effective_date.unwrap_or(now);
    let is_withdrawal = request.amount.is_negative();
    let counted = is_withdrawal && request.assess_withdrawal_limit && share_type.has_withdrawal_limit();

    let overdraws = |total: Money| -> Result<bool, LedgerError> {
        Ok(is_withdrawal && !request.take_negative && share.balance.checked_add(total)?.is_negative())
    };

    if overdraws(request.amount)? {
        let comment = format!(
            "Withdrawal of {} refused: balance is {}",
            request.amount.abs(),
            share.balance
        );
        return refuse_nonsufficient(uow, &share, request.amount, comment, effective_date, now).await;
    }

    let mut fee = None;
    if counted && share_type.limit_reached(share.limited_withdrawal_count) {
        match share_type.exceeded_fee() {
            Some(amount) if amount.is_zero() => {}
            Some(amount) => fee = Some(amount),
            None => {
                let audit = Transaction::audit(
                    share.id,
                    share.balance,
                    TransactionType::WithdrawalLimitExceeded,
                    format!(
                        "Withdrawal of {} refused: limit of {} per {} period reached",
                        request.amount.abs(),
                        share_type.withdrawal_limit_count,
                        share_type.withdrawal_limit_period
                    ),
                    effective_date,
                    now,
                );
                uow.insert_transaction(&audit).await?;
                warn!(
                    share_id = %share.id,
                    share_type_id = %share_type.id,
                    count = share.limited_withdrawal_count,
                    "Withdrawal limit reached"
                );
                return Err(LedgerError::WithdrawalLimitExceeded {
                    share_id: share.id,
                    share_type_id: share_type.id,
                    limit: share_type.withdrawal_limit_count,
                    period: share_type.withdrawal_limit_period,
                    audit: Box::new(audit),
                });
            }
        }
    }

    if let Some(fee) = fee {
        let total = request.amount.checked_sub(fee)?;
        if overdraws(total)? {
            let comment = format!(
                "Withdrawal of {} plus {} limit fee refused: balance is {}",
                request.amount.abs(),
                fee,
                share.balance
            );
            return refuse_nonsufficient(uow, &share, total, comment, effective_date, now).await;
        }
    }

    let mut running = share.balance;
    if let Some(fee) = fee {
        running = running.checked_sub(fee)?;
        let fee_row = Transaction::posted(
            share.id,
            -fee,
            running,
            TransactionType::WithdrawalLimitExceeded,
            format!(
                "Fee for exceeding {} withdrawals per {} period",
                share_type.withdrawal_limit_count, share_type.withdrawal_limit_period
            ),
            effective_date,
            now,
        );
        uow.insert_transaction(&fee_row).await?;
    }

    running = running.checked_add(request.amount)?;
    let transaction = Transaction::posted(
        share.id,
        request.amount,
        running,
        request
            .transaction_type
            .unwrap_or_else(|| TransactionType::default_for(request.amount)),
        request.comment.clone().unwrap_or_default(),
        effective_date,
        now,
    );
    uow.insert_transaction(&transaction).await?;

    let mut updated = share.clone();
    updated.balance = running;
    updated.date_last_active = Some(now);
    if counted {
        updated.limited_withdrawal_count = updated.limited_withdrawal_count.saturating_add(1);
    }
    uow.save_share(&updated, share.balance).await?;

    debug!(
        share_id = %share.id,
        amount = %request.amount,
        new_balance = %running,
        transaction_type = %transaction.transaction_type,
        "Posted transaction"
    );
    Ok(transaction)
}

/// Writes the NSF audit row and returns the refusal
async fn refuse_nonsufficient<U>(
    uow: &mut U,
    share: &Share,
    attempted: Money,
    comment: String,
    effective_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Transaction, LedgerError>
where
    U: LedgerUnitOfWork + ?Sized,
{
    let audit = Transaction::audit(
        share.id,
        share.balance,
        TransactionType::NonsufficientFunds,
        comment,
        effective_date,
        now,
    );
    uow.insert_transaction(&audit).await?;
    warn!(share_id = %share.id, balance = %share.balance, attempted = %attempted, "Nonsufficient funds");
    Err(LedgerError::NonsufficientFunds {
        share_id: share.id,
        balance: share.balance,
        attempted,
        audit: Box::new(audit),
    })
}

/// Ends a unit of work after `err`: refusals keep their audit row, anything else rolls back
pub async fn finish_failed<U>(uow: Box<U>, err: LedgerError) -> LedgerError
where
    U: LedgerUnitOfWork + ?Sized,
{
    if err.is_rejection() {
        if let Err(commit_err) = uow.commit().await {
            return commit_err.into();
        }
    } else {
        discard(uow).await;
    }
    err
}

/// Rolls back a unit of work, logging rather than returning a failed rollback
pub async fn discard<U>(uow: Box<U>)
where
    U: LedgerUnitOfWork + ?Sized,
{
    if let Err(err) = uow.rollback().await {
        warn!(error = %err, "Rollback failed");
    }
}

/// Posts single transactions and batches
pub struct TransactionPoster {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl TransactionPoster {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        Self { store, clock, config }
    }

    /// Posts one transaction in its own unit of work
    ///
    /// A refused withdrawal commits its audit row and returns the refusal.
    pub async fn post_one(&self, request: PostingRequest) -> Result<Transaction, LedgerError> {
        retry_on_conflict(self.config.max_conflict_retries, "post_one", || {
            self.try_post_one(&request)
        })
        .await
    }

    async fn try_post_one(&self, request: &PostingRequest) -> Result<Transaction, LedgerError> {
        let mut uow = self.store.begin().await?;
        let now = self.clock.now();
        match apply_posting(uow.as_mut(), request, now).await {
            Ok(transaction) => {
                uow.commit().await?;
                info!(
                    share_id = %request.share_id,
                    transaction_id = %transaction.id,
                    amount = %transaction.amount,
                    "Transaction posted"
                );
                Ok(transaction)
            }
            Err(err) => Err(finish_failed(uow, err).await),
        }
    }

    /// Posts a batch in one unit of work
    ///
    /// With `stop_on_exception` the first refusal rolls back everything,
    /// audit rows included. Without it, refused requests keep their audit
    /// row, are reported in [`BatchOutcome::failures`], and the rest still
    /// post. Errors other than refusals always roll back the batch.
    pub async fn post_many(
        &self,
        requests: Vec<PostingRequest>,
        options: BatchOptions,
    ) -> Result<BatchOutcome, LedgerError> {
        if requests.is_empty() {
            return Ok(BatchOutcome::default());
        }
        retry_on_conflict(self.config.max_conflict_retries, "post_many", || {
            self.try_post_many(&requests, options)
        })
        .await
    }

    async fn try_post_many(
        &self,
        requests: &[PostingRequest],
        options: BatchOptions,
    ) -> Result<BatchOutcome, LedgerError> {
        let mut uow = self.store.begin().await?;
        let now = self.clock.now();
        let mut outcome = BatchOutcome::default();

        for (index, request) in requests.iter().enumerate() {
            let mut request = request.clone();
            request.assess_withdrawal_limit &= options.assess_withdrawal_limit;

            match apply_posting(uow.as_mut(), &request, now).await {
                Ok(transaction) => outcome.posted.push(transaction),
                Err(err) if err.is_rejection() && !options.stop_on_exception => {
                    warn!(index, share_id = %request.share_id, error = %err, "Batch request refused");
                    outcome.failures.push(BatchFailure { index, error: err });
                }
                Err(err) => {
                    warn!(index, share_id = %request.share_id, error = %err, "Batch aborted");
                    discard(uow).await;
                    return Err(err);
                }
            }
        }

        uow.commit().await?;
        info!(
            posted = outcome.posted.len(),
            failed = outcome.failures.len(),
            "Batch posted"
        );
        Ok(outcome)
    }
}
