//! Dividend distribution
//!
//! Dividends are posted per instance, one page of shares per unit of work.
//! A failure part way through leaves the committed pages in place; running
//! the distribution again pays those shares a second time.

use std::sync::Arc;
use tracing::{debug, info, warn};

use core_kernel::{Clock, InstanceId, Money, ShareId, ShareTypeId};

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::poster::{apply_posting, discard, retry_on_conflict, PostingRequest};
use crate::ports::{LedgerStore, SharePageQuery};
use crate::share_type::ShareType;
use crate::transaction::TransactionType;

#[derive(Debug, Default)]
struct PageResult {
    fetched: usize,
    last: Option<ShareId>,
    posted: usize,
    total: Money,
}

/// Pays a share type's dividend rate on share balances
pub struct DividendDistributor {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl DividendDistributor {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        Self { store, clock, config }
    }

    /// Posts dividends for every instance in `instance_ids` linked to the share type
    ///
    /// Instances the share type is not linked to are skipped. Each dividend
    /// is `balance × dividend_rate`, rounded half-up to the mill. Shares
    /// whose dividend is zero get no row; a negative dividend is posted even
    /// when it overdraws the share.
    pub async fn post_dividends(
        &self,
        share_type_id: ShareTypeId,
        instance_ids: &[InstanceId],
    ) -> Result<bool, LedgerError> {
        let share_type = self.load_share_type(share_type_id).await?;

        if share_type.dividend_rate.units() == 0 {
            info!(share_type_id = %share_type_id, rate = %share_type.dividend_rate, "No dividend to pay");
            return Ok(true);
        }

        for &instance_id in instance_ids {
            if !share_type.is_linked_to(instance_id) {
                warn!(
                    share_type_id = %share_type_id,
                    instance_id = %instance_id,
                    "Share type is not linked to instance, skipping"
                );
                continue;
            }

            let mut cursor = None;
            let mut posted = 0;
            let mut total = Money::ZERO;
            loop {
                let page = retry_on_conflict(
                    self.config.max_conflict_retries,
                    "post_dividends",
                    || self.post_page(&share_type, instance_id, cursor),
                )
                .await?;
                posted += page.posted;
                total = total.checked_add(page.total)?;

                match page.last {
                    Some(last) if page.fetched >= self.config.page_size as usize => cursor = Some(last),
                    _ => break,
                }
            }

            info!(
                share_type_id = %share_type_id,
                instance_id = %instance_id,
                posted,
                total = %total,
                "Dividends posted"
            );
        }

        Ok(true)
    }

    async fn load_share_type(&self, id: ShareTypeId) -> Result<ShareType, LedgerError> {
        let mut uow = self.store.begin().await?;
        let share_type = uow.share_type(id).await;
        discard(uow).await;
        share_type?
            .filter(|st| !st.is_deleted)
            .ok_or_else(|| LedgerError::not_found("ShareType", id))
    }

    async fn post_page(
        &self,
        share_type: &ShareType,
        instance_id: InstanceId,
        cursor: Option<ShareId>,
    ) -> Result<PageResult, LedgerError> {
        let mut uow = self.store.begin().await?;
        let now = self.clock.now();

        let mut query = SharePageQuery::active_in_instance(share_type.id, instance_id, self.config.page_size);
        query.after = cursor;
        let shares = match uow.shares_page(&query).await {
            Ok(shares) => shares,
            Err(err) => {
                discard(uow).await;
                return Err(err.into());
            }
        };

        let mut result = PageResult {
            fetched: shares.len(),
            last: shares.last().map(|s| s.id),
            ..PageResult::default()
        };

        for share in &shares {
            let dividend = match share_type.dividend_rate.apply(share.balance) {
                Ok(dividend) => dividend,
                Err(err) => {
                    discard(uow).await;
                    return Err(err.into());
                }
            };
            if dividend.is_zero() {
                continue;
            }

            // Overdrawn shares pay a negative dividend, which must not be refused for funds
            let request = PostingRequest::new(share.id, dividend)
                .with_type(TransactionType::Dividend)
                .with_comment(format!("Dividend at {}", share_type.dividend_rate))
                .without_limit_assessment()
                .allow_negative();
            if let Err(err) = apply_posting(uow.as_mut(), &request, now).await {
                discard(uow).await;
                return Err(err);
            }
            result.posted += 1;
            result.total = result.total.checked_add(dividend)?;
        }

        uow.commit().await?;
        debug!(
            share_type_id = %share_type.id,
            instance_id = %instance_id,
            fetched = result.fetched,
            posted = result.posted,
            "Dividend page committed"
        );
        Ok(result)
    }
}
