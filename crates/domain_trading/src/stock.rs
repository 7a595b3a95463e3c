//! Listed stocks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use core_kernel::{InstanceId, Money, StockId};

/// A simulated company students can invest in
///
/// `available_shares` is the part of `total_shares` no student owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub id: StockId,
    pub symbol: String,
    pub name: String,
    pub current_value: Money,
    pub total_shares: i64,
    pub available_shares: i64,
    pub is_deleted: bool,
    pub instance_ids: BTreeSet<InstanceId>,
    pub created_at: DateTime<Utc>,
}

impl Stock {
    /// Lists a stock with its whole pool available
    pub fn list(
        symbol: impl Into<String>,
        name: impl Into<String>,
        current_value: Money,
        total_shares: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let total_shares = total_shares.max(0);
        Self {
            id: StockId::new_v7(),
            symbol: symbol.into(),
            name: name.into(),
            current_value,
            total_shares,
            available_shares: total_shares,
            is_deleted: false,
            instance_ids: BTreeSet::new(),
            created_at: now,
        }
    }

    pub fn linked_to(mut self, instance_id: InstanceId) -> Self {
        self.instance_ids.insert(instance_id);
        self
    }

    /// Shares held by students
    pub fn shares_held(&self) -> i64 {
        self.total_shares - self.available_shares
    }

    pub fn is_tradeable(&self) -> bool {
        !self.is_deleted
    }
}
