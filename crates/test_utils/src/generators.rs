//! Property-Based Test Generators
//!
//! Proptest strategies for ledger values. Amounts are kept small enough
//! that sums over a few hundred postings never overflow.

use core_kernel::{Money, Rate, WithdrawalLimitPeriod};
use proptest::prelude::*;

/// Strategy for positive amounts up to $10,000
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (1i64..=10_000_000i64).prop_map(Money::from_mills)
}

/// Strategy for non-zero amounts between -$10,000 and $10,000
pub fn posting_amount_strategy() -> impl Strategy<Value = Money> {
    prop_oneof![
        (1i64..=10_000_000i64).prop_map(Money::from_mills),
        (-10_000_000i64..=-1i64).prop_map(Money::from_mills),
    ]
}

/// Strategy for whole-cent amounts, the usual shape of classroom postings
pub fn cents_amount_strategy() -> impl Strategy<Value = Money> {
    prop_oneof![(1i64..=100_000i64), (-100_000i64..=-1i64)]
        .prop_map(|cents| Money::from_mills(cents * 10))
}

/// Strategy for rates between 0% and 25%
pub fn rate_strategy() -> impl Strategy<Value = Rate> {
    (0i64..=250_000i64).prop_map(Rate::from_units)
}

pub fn period_strategy() -> impl Strategy<Value = WithdrawalLimitPeriod> {
    prop::sample::select(WithdrawalLimitPeriod::ALL.to_vec())
}

/// Strategy for a sequence of postings
pub fn posting_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<Money>> {
    prop::collection::vec(posting_amount_strategy(), 1..=max_len)
}
