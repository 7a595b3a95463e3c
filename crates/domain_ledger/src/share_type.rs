//! Share types
//!
//! A share type is the product a share belongs to ("Savings", "Checking").
//! It carries the dividend rate and the withdrawal-limit policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use core_kernel::{InstanceId, Money, Rate, ShareTypeId, WithdrawalLimitPeriod};

/// Account product with its dividend and withdrawal-limit configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareType {
    pub id: ShareTypeId,
    pub name: String,
    pub dividend_rate: Rate,
    pub withdrawal_limit_period: WithdrawalLimitPeriod,
    /// Maximum counted withdrawals per period; 0 disables enforcement
    pub withdrawal_limit_count: u32,
    pub withdrawal_limit_should_fee: bool,
    pub withdrawal_limit_fee: Money,
    pub withdrawal_limit_last_reset: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    /// Instances whose students may hold this share type
    pub instance_ids: BTreeSet<InstanceId>,
}

impl ShareType {
    /// Creates a share type without a withdrawal limit
    pub fn new(name: impl Into<String>, dividend_rate: Rate) -> Self {
        Self {
            id: ShareTypeId::new_v7(),
            name: name.into(),
            dividend_rate,
            withdrawal_limit_period: WithdrawalLimitPeriod::Monthly,
            withdrawal_limit_count: 0,
            withdrawal_limit_should_fee: false,
            withdrawal_limit_fee: Money::ZERO,
            withdrawal_limit_last_reset: None,
            is_deleted: false,
            instance_ids: BTreeSet::new(),
        }
    }

    /// Limits counted withdrawals to `count` per `period`
    pub fn with_withdrawal_limit(mut self, count: u32, period: WithdrawalLimitPeriod) -> Self {
        self.withdrawal_limit_count = count;
        self.withdrawal_limit_period = period;
        self
    }

    /// Charges `fee` instead of refusing withdrawals past the limit
    pub fn with_withdrawal_fee(mut self, fee: Money) -> Self {
        self.withdrawal_limit_should_fee = true;
        self.withdrawal_limit_fee = fee;
        self
    }

    /// Links the share type to an instance
    pub fn linked_to(mut self, instance_id: InstanceId) -> Self {
        self.instance_ids.insert(instance_id);
        self
    }

    pub fn is_linked_to(&self, instance_id: InstanceId) -> bool {
        self.instance_ids.contains(&instance_id)
    }

    pub fn has_withdrawal_limit(&self) -> bool {
        self.withdrawal_limit_count > 0
    }

    /// Returns true if a share with `count` counted withdrawals is at its limit
    pub fn limit_reached(&self, count: u32) -> bool {
        self.has_withdrawal_limit() && count >= self.withdrawal_limit_count
    }

    /// Returns the fee charged once the limit is reached
    ///
    /// `None` means withdrawals past the limit are refused. A zero fee lets
    /// them through without a fee row.
    pub fn exceeded_fee(&self) -> Option<Money> {
        self.withdrawal_limit_should_fee
            .then_some(self.withdrawal_limit_fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_count_disables_limit() {
        let st = ShareType::new("Savings", Rate::ZERO);
        assert!(!st.has_withdrawal_limit());
        assert!(!st.limit_reached(1_000));
    }

    #[test]
    fn test_limit_reached_at_count() {
        let st = ShareType::new("Savings", Rate::ZERO)
            .with_withdrawal_limit(2, WithdrawalLimitPeriod::Monthly);
        assert!(!st.limit_reached(1));
        assert!(st.limit_reached(2));
        assert!(st.limit_reached(3));
    }

    #[test]
    fn test_fee_follows_the_flag() {
        let st = ShareType::new("Savings", Rate::ZERO);
        assert_eq!(st.exceeded_fee(), None);

        let st = st.with_withdrawal_fee(Money::ZERO);
        assert_eq!(st.exceeded_fee(), Some(Money::ZERO));

        let st = st.with_withdrawal_fee(Money::from_mills(1_000));
        assert_eq!(st.exceeded_fee(), Some(Money::from_mills(1_000)));
    }

    #[test]
    fn test_instance_links() {
        let instance = InstanceId::new();
        let st = ShareType::new("Checking", Rate::ZERO).linked_to(instance);
        assert!(st.is_linked_to(instance));
        assert!(!st.is_linked_to(InstanceId::new()));
    }
}
