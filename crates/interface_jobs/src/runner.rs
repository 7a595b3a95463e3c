//! Job dispatch over the ledger and trading services

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use core_kernel::{Clock, InstanceId, Money, ShareId, ShareTypeId, StockId};
use domain_ledger::{
    DailyResetReport, DividendDistributor, LedgerConfig, LedgerError, LedgerInquiry, LedgerStore,
    ResetSummary, ShareReconciliation, WithdrawalLimitResetter,
};
use domain_trading::{Stock, TradingEngine, TradingError, TradingStore};

use crate::cli::Command;

/// Errors a job can stop with
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Trading(#[from] TradingError),
}

/// What a finished job reports
#[derive(Debug, Serialize)]
#[serde(tag = "job", rename_all = "kebab-case")]
pub enum JobOutcome {
    Migrate,
    DailyResets {
        at: DateTime<Utc>,
        report: DailyResetReport,
    },
    ResetLimit(ResetSummary),
    PostDividends {
        share_type_id: ShareTypeId,
        instances: Vec<InstanceId>,
        completed: bool,
    },
    Reconcile {
        #[serde(flatten)]
        reconciliation: ShareReconciliation,
        balanced: bool,
    },
    UpdateStockValue(Stock),
}

impl JobOutcome {
    /// Returns false when the job finished but left work undone or found a problem
    pub fn is_clean(&self) -> bool {
        match self {
            JobOutcome::DailyResets { report, .. } => report.is_clean(),
            JobOutcome::PostDividends { completed, .. } => *completed,
            JobOutcome::Reconcile { balanced, .. } => *balanced,
            JobOutcome::Migrate | JobOutcome::ResetLimit(_) | JobOutcome::UpdateStockValue(_) => true,
        }
    }
}

/// Runs jobs against one store
pub struct JobRunner<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl<S> JobRunner<S>
where
    S: LedgerStore + TradingStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        Self { store, clock, config }
    }

    fn ledger_store(&self) -> Arc<dyn LedgerStore> {
        self.store.clone()
    }

    fn resetter(&self) -> WithdrawalLimitResetter {
        WithdrawalLimitResetter::new(self.ledger_store(), self.clock.clone(), self.config.clone())
    }

    /// Runs one command
    pub async fn run(&self, command: &Command) -> Result<JobOutcome, JobError> {
        info!(job = command.name(), "Job started");
        let outcome = match command {
            Command::Migrate => JobOutcome::Migrate,
            Command::DailyResets { at } => self.daily_resets(*at).await?,
            Command::ResetLimit { share_type } => self.reset_limit(*share_type).await?,
            Command::PostDividends {
                share_type,
                instances,
            } => self.post_dividends(*share_type, instances).await?,
            Command::Reconcile { share } => self.reconcile(*share).await?,
            Command::UpdateStockValue { stock, value } => self.update_stock_value(*stock, *value).await?,
        };

        if outcome.is_clean() {
            info!(job = command.name(), "Job finished");
        } else {
            warn!(job = command.name(), "Job finished with problems");
        }
        Ok(outcome)
    }

    pub async fn daily_resets(&self, at: Option<DateTime<Utc>>) -> Result<JobOutcome, JobError> {
        let at = at.unwrap_or_else(|| self.clock.now());
        let report = self.resetter().run_daily_resets(at).await?;
        Ok(JobOutcome::DailyResets { at, report })
    }

    pub async fn reset_limit(&self, share_type_id: ShareTypeId) -> Result<JobOutcome, JobError> {
        let summary = self.resetter().reset_withdrawal_limit(share_type_id).await?;
        Ok(JobOutcome::ResetLimit(summary))
    }

    pub async fn post_dividends(
        &self,
        share_type_id: ShareTypeId,
        instances: &[InstanceId],
    ) -> Result<JobOutcome, JobError> {
        let completed = DividendDistributor::new(self.ledger_store(), self.clock.clone(), self.config.clone())
            .post_dividends(share_type_id, instances)
            .await?;
        Ok(JobOutcome::PostDividends {
            share_type_id,
            instances: instances.to_vec(),
            completed,
        })
    }

    pub async fn reconcile(&self, share_id: ShareId) -> Result<JobOutcome, JobError> {
        let reconciliation = LedgerInquiry::new(self.ledger_store())
            .reconcile_share(share_id)
            .await?;
        let balanced = reconciliation.is_balanced();
        if !balanced {
            warn!(
                share_id = %share_id,
                discrepancy = %reconciliation.discrepancy(),
                "Share balance does not match its transactions"
            );
        }
        Ok(JobOutcome::Reconcile {
            reconciliation,
            balanced,
        })
    }

    pub async fn update_stock_value(&self, stock_id: StockId, value: Money) -> Result<JobOutcome, JobError> {
        let stock = TradingEngine::new(self.store.clone(), self.clock.clone(), self.config.clone())
            .update_stock_value(stock_id, value)
            .await?;
        Ok(JobOutcome::UpdateStockValue(stock))
    }
}
