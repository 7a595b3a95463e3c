//! Pre-built Test Fixtures
//!
//! Ready-to-use values for ledger tests. These are consistent and
//! predictable so expected balances can be written down by hand.

use chrono::{DateTime, TimeZone, Utc};
use core_kernel::{InstanceId, Money, Rate, Timezone};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Instance shared by fixtures that do not care which school they belong to
pub static DEFAULT_INSTANCE: Lazy<InstanceId> = Lazy::new(InstanceId::new);

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Whole dollars
    pub fn dollars(units: i64) -> Money {
        Money::from_mills(units * 1_000)
    }

    pub fn cents(cents: i64) -> Money {
        Money::from_mills(cents * 10)
    }

    /// Exact amount from a decimal literal, e.g. `dec!(12.345)`
    pub fn amount(value: Decimal) -> Money {
        Money::from_decimal(value).unwrap()
    }

    /// Standard opening deposit
    pub fn opening_balance() -> Money {
        Self::dollars(50)
    }

    /// Standard fee for exceeding a withdrawal limit
    pub fn limit_fee() -> Money {
        Self::dollars(1)
    }
}

/// Fixture for dividend rates
pub struct RateFixtures;

impl RateFixtures {
    /// A whole-number percentage
    pub fn percent(percent: i64) -> Rate {
        Rate::from_units(percent * 10_000)
    }

    pub fn five_percent() -> Rate {
        Rate::from_decimal(dec!(0.05)).unwrap()
    }

    pub fn one_percent() -> Rate {
        Self::percent(1)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// A Thursday afternoon mid-month
    pub fn school_day() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 15, 0, 0).unwrap()
    }

    /// First instant of April 2024 in UTC
    pub fn month_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
    }

    /// Builds a UTC instant on the hour
    pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
    }

    pub fn new_york() -> Timezone {
        Timezone::new(chrono_tz::America::New_York)
    }
}

/// Fixture for string data
pub struct StringFixtures;

impl StringFixtures {
    pub fn share_type_name() -> &'static str {
        "Savings"
    }

    pub fn stock_symbol() -> &'static str {
        "XYZ"
    }

    pub fn stock_name() -> &'static str {
        "Xyz Industries"
    }
}
