//! Withdrawal-limit resets
//!
//! Counters are reset per share type. The daily run decides which share
//! types crossed a period boundary since their last reset.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use core_kernel::{Clock, ShareTypeId};

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::poster::{discard, retry_on_conflict};
use crate::ports::{LedgerStore, SharePageQuery};
use crate::share_type::ShareType;

/// What a reset changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetSummary {
    pub share_type_id: ShareTypeId,
    pub shares_reset: u64,
    pub reset_at: DateTime<Utc>,
}

/// Why the daily run reset a share type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetReason {
    /// The period boundary is today
    Due,
    /// A boundary was missed on an earlier day
    Overdue,
}

/// Outcome of one daily run
#[derive(Debug, Default, Serialize)]
pub struct DailyResetReport {
    /// Share types with a withdrawal limit that were checked
    pub evaluated: usize,
    pub reset: Vec<(ResetSummary, ResetReason)>,
    /// Share types whose reset failed, with the error message
    pub failed: Vec<(ShareTypeId, String)>,
}

impl DailyResetReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resets limited withdrawal counters
pub struct WithdrawalLimitResetter {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl WithdrawalLimitResetter {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        Self { store, clock, config }
    }

    /// Zeroes the counter of every share of the type and stamps the reset time
    pub async fn reset_withdrawal_limit(
        &self,
        share_type_id: ShareTypeId,
    ) -> Result<ResetSummary, LedgerError> {
        let now = self.clock.now();
        retry_on_conflict(self.config.max_conflict_retries, "reset_withdrawal_limit", || {
            self.reset_at(share_type_id, now)
        })
        .await
    }

    async fn reset_at(
        &self,
        share_type_id: ShareTypeId,
        now: DateTime<Utc>,
    ) -> Result<ResetSummary, LedgerError> {
        let mut uow = self.store.begin().await?;

        let mut share_type = match uow.lock_share_type(share_type_id).await? {
            Some(st) if !st.is_deleted => st,
            _ => {
                discard(uow).await;
                return Err(LedgerError::not_found("ShareType", share_type_id));
            }
        };

        let mut query = SharePageQuery::all(share_type_id, self.config.page_size);
        let mut shares_reset = 0;
        loop {
            let page = uow.shares_page(&query).await?;
            let ids: Vec<_> = page
                .iter()
                .filter(|s| s.limited_withdrawal_count > 0)
                .map(|s| s.id)
                .collect();
            if !ids.is_empty() {
                shares_reset += uow.reset_withdrawal_counts(&ids).await?;
            }
            debug!(share_type_id = %share_type_id, fetched = page.len(), "Reset page");

            match page.last() {
                Some(last) if page.len() >= self.config.page_size as usize => {
                    query = query.after(last.id);
                }
                _ => break,
            }
        }

        share_type.withdrawal_limit_last_reset = Some(now);
        uow.save_share_type(&share_type).await?;
        uow.commit().await?;

        info!(share_type_id = %share_type_id, shares_reset, "Withdrawal limits reset");
        Ok(ResetSummary {
            share_type_id,
            shares_reset,
            reset_at: now,
        })
    }

    /// Returns why `share_type` needs a reset at `now`, or `None` if it is current
    pub fn reset_reason(
        &self,
        share_type: &ShareType,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetReason>, LedgerError> {
        if !share_type.has_withdrawal_limit() || share_type.is_deleted {
            return Ok(None);
        }
        let tz = self.config.timezone;
        let boundary = share_type
            .withdrawal_limit_period
            .previous_boundary(now, tz)?;
        let stale = share_type
            .withdrawal_limit_last_reset
            .map_or(true, |last| last < boundary);
        if !stale {
            return Ok(None);
        }
        Ok(Some(if tz.local_date(boundary) == tz.local_date(now) {
            ResetReason::Due
        } else {
            ResetReason::Overdue
        }))
    }

    /// Resets every share type whose period rolled over since its last reset
    ///
    /// A failure on one share type is recorded and the run moves on.
    pub async fn run_daily_resets(&self, now: DateTime<Utc>) -> Result<DailyResetReport, LedgerError> {
        let share_types = {
            let mut uow = self.store.begin().await?;
            let types = uow.share_types().await;
            discard(uow).await;
            types?
        };

        let mut report = DailyResetReport::default();
        for share_type in share_types.iter().filter(|st| st.has_withdrawal_limit()) {
            report.evaluated += 1;

            let reason = match self.reset_reason(share_type, now) {
                Ok(Some(reason)) => reason,
                Ok(None) => continue,
                Err(err) => {
                    error!(share_type_id = %share_type.id, error = %err, "Cannot evaluate reset");
                    report.failed.push((share_type.id, err.to_string()));
                    continue;
                }
            };

            let result = retry_on_conflict(self.config.max_conflict_retries, "run_daily_resets", || {
                self.reset_at(share_type.id, now)
            })
            .await;
            match result {
                Ok(summary) => report.reset.push((summary, reason)),
                Err(err) => {
                    error!(share_type_id = %share_type.id, error = %err, "Withdrawal limit reset failed");
                    report.failed.push((share_type.id, err.to_string()));
                }
            }
        }

        info!(
            evaluated = report.evaluated,
            reset = report.reset.len(),
            failed = report.failed.len(),
            "Daily withdrawal limit run finished"
        );
        Ok(report)
    }
}
