//! Money and rate types with exact fixed-point arithmetic
//!
//! Amounts are held as a whole number of mills (1/1000 of a currency unit)
//! so that ledger arithmetic never drifts. `rust_decimal` is only used at the
//! edges: parsing literals, display, and serialization.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;

/// Number of decimal places kept for money (mills)
pub const MONEY_SCALE: u32 = 3;

/// Number of decimal places kept for rates
pub const RATE_SCALE: u32 = 6;

const MILLS_PER_UNIT: i64 = 1_000;
const RATE_UNITS_PER_ONE: i128 = 1_000_000;

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount {0} is more precise than the smallest recorded unit")]
    PrecisionLoss(Decimal),

    #[error("Overflow during calculation")]
    Overflow,
}

/// An exact monetary amount
///
/// Stored as a signed count of mills. Constructing from a decimal literal
/// fails rather than silently dropping sub-mill digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money {
    mills: i64,
}

impl Money {
    /// The canonical zero amount
    pub const ZERO: Money = Money { mills: 0 };

    /// Creates Money from a raw count of mills
    pub const fn from_mills(mills: i64) -> Self {
        Self { mills }
    }

    /// Creates Money from a decimal currency amount (e.g. `12.50`)
    ///
    /// # Errors
    ///
    /// Returns `PrecisionLoss` if the amount has digits below one mill and
    /// `Overflow` if it does not fit the internal representation.
    pub fn from_decimal(amount: Decimal) -> Result<Self, MoneyError> {
        let scaled = amount
            .checked_mul(Decimal::from(MILLS_PER_UNIT))
            .ok_or(MoneyError::Overflow)?;
        if !scaled.fract().is_zero() {
            return Err(MoneyError::PrecisionLoss(amount));
        }
        let mills = scaled.to_i64().ok_or(MoneyError::Overflow)?;
        Ok(Self { mills })
    }

    /// Creates Money from whole currency units
    pub fn from_units(units: i64) -> Result<Self, MoneyError> {
        units
            .checked_mul(MILLS_PER_UNIT)
            .map(Self::from_mills)
            .ok_or(MoneyError::Overflow)
    }

    /// Returns the zero amount
    pub const fn zero() -> Self {
        Self::ZERO
    }

    /// Returns the raw count of mills
    pub const fn mills(&self) -> i64 {
        self.mills
    }

    /// Returns the amount as a decimal with three fractional digits
    pub fn amount(&self) -> Decimal {
        Decimal::new(self.mills, MONEY_SCALE)
    }

    pub fn is_zero(&self) -> bool {
        self.mills == 0
    }

    pub fn is_positive(&self) -> bool {
        self.mills > 0
    }

    pub fn is_negative(&self) -> bool {
        self.mills < 0
    }

    /// Returns the absolute value, saturating at the largest amount
    pub fn abs(&self) -> Self {
        Self { mills: self.mills.saturating_abs() }
    }

    /// Checked absolute value
    pub fn checked_abs(&self) -> Result<Money, MoneyError> {
        self.mills
            .checked_abs()
            .map(Self::from_mills)
            .ok_or(MoneyError::Overflow)
    }

    /// Checked addition
    pub fn checked_add(&self, other: Money) -> Result<Money, MoneyError> {
        self.mills
            .checked_add(other.mills)
            .map(Self::from_mills)
            .ok_or(MoneyError::Overflow)
    }

    /// Checked subtraction
    pub fn checked_sub(&self, other: Money) -> Result<Money, MoneyError> {
        self.mills
            .checked_sub(other.mills)
            .map(Self::from_mills)
            .ok_or(MoneyError::Overflow)
    }

    /// Multiplies by an integer scalar, e.g. a share count
    pub fn checked_mul(&self, factor: i64) -> Result<Money, MoneyError> {
        self.mills
            .checked_mul(factor)
            .map(Self::from_mills)
            .ok_or(MoneyError::Overflow)
    }

    /// Multiplies by a rate, rounding half-up to the nearest mill
    ///
    /// A product that lands exactly between two mills is rounded toward
    /// positive infinity, so `0.0005` becomes `0.001` and `-0.0005` becomes
    /// `0.000`.
    pub fn apply_rate(&self, rate: Rate) -> Result<Money, MoneyError> {
        let product = i128::from(self.mills) * i128::from(rate.units);
        let rounded = (product + RATE_UNITS_PER_ONE / 2).div_euclid(RATE_UNITS_PER_ONE);
        i64::try_from(rounded)
            .map(Self::from_mills)
            .map_err(|_| MoneyError::Overflow)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let magnitude = Decimal::from_i128_with_scale(i128::from(self.mills.unsigned_abs()), MONEY_SCALE);
        if self.mills % 10 == 0 {
            write!(f, "{}${:.2}", sign, magnitude)
        } else {
            write!(f, "{}${:.3}", sign, magnitude)
        }
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    /// Parses literals such as `12.5`, `$12.50`, `-$3.125` or `$1,250.00`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let digits: String = rest
            .strip_prefix('$')
            .unwrap_or(rest)
            .chars()
            .filter(|c| *c != ',')
            .collect();

        let value = Decimal::from_str(&digits)
            .map_err(|_| MoneyError::InvalidAmount(s.to_string()))?;
        let money = Money::from_decimal(value)?;
        Ok(if negative { -money } else { money })
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Serialize::serialize(&self.amount(), serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::from_decimal(value).map_err(serde::de::Error::custom)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::from_mills(self.mills + other.mills)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        self.mills += other.mills;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::from_mills(self.mills - other.mills)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Self) {
        self.mills -= other.mills;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self::from_mills(self.mills.saturating_neg())
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, factor: i64) -> Self {
        Self::from_mills(self.mills * factor)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// A fixed-point fractional rate (e.g. a dividend rate)
///
/// Held in millionths: `0.0125` (1.25%) is stored as `12_500`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Rate {
    units: i64,
}

impl Rate {
    pub const ZERO: Rate = Rate { units: 0 };

    /// Creates a rate from raw millionths
    pub const fn from_units(units: i64) -> Self {
        Self { units }
    }

    /// Creates a rate from a decimal fraction (e.g. `0.0125` for 1.25%)
    pub fn from_decimal(value: Decimal) -> Result<Self, MoneyError> {
        let scaled = value
            .checked_mul(Decimal::from(RATE_UNITS_PER_ONE as i64))
            .ok_or(MoneyError::Overflow)?;
        if !scaled.fract().is_zero() {
            return Err(MoneyError::PrecisionLoss(value));
        }
        let units = scaled.to_i64().ok_or(MoneyError::Overflow)?;
        Ok(Self { units })
    }

    /// Creates a rate from a percentage (e.g. `1.25` for 1.25%)
    pub fn from_percentage(percentage: Decimal) -> Result<Self, MoneyError> {
        let fraction = percentage
            .checked_div(Decimal::ONE_HUNDRED)
            .ok_or(MoneyError::Overflow)?;
        Self::from_decimal(fraction)
    }

    /// Returns the raw millionths
    pub const fn units(&self) -> i64 {
        self.units
    }

    /// Returns the rate as a decimal fraction
    pub fn as_decimal(&self) -> Decimal {
        Decimal::new(self.units, RATE_SCALE)
    }

    /// Returns the rate as a percentage
    pub fn as_percentage(&self) -> Decimal {
        (self.as_decimal() * Decimal::ONE_HUNDRED).normalize()
    }

    pub fn is_zero(&self) -> bool {
        self.units == 0
    }

    /// Applies this rate to a money amount
    pub fn apply(&self, money: Money) -> Result<Money, MoneyError> {
        money.apply_rate(*self)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage())
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Serialize::serialize(&self.as_decimal(), serializer)
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Rate::from_decimal(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_from_decimal() {
        let m = Money::from_decimal(dec!(100.50)).unwrap();
        assert_eq!(m.mills(), 100_500);
        assert_eq!(m.amount(), dec!(100.500));
    }

    #[test]
    fn test_money_rejects_sub_mill_digits() {
        let result = Money::from_decimal(dec!(1.0005));
        assert_eq!(result, Err(MoneyError::PrecisionLoss(dec!(1.0005))));
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_units(100).unwrap();
        let b = Money::from_units(50).unwrap();

        assert_eq!((a + b).mills(), 150_000);
        assert_eq!((a - b).mills(), 50_000);
        assert_eq!((-a).mills(), -100_000);
        assert_eq!((b * 3).mills(), 150_000);
    }

    #[test]
    fn test_checked_add_overflow() {
        let max = Money::from_mills(i64::MAX);
        assert_eq!(max.checked_add(Money::from_mills(1)), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_most_negative_amount_displays_and_negates() {
        let min = Money::from_mills(i64::MIN);
        assert_eq!(min.to_string(), "-$9223372036854775.808");
        assert_eq!(min.abs().mills(), i64::MAX);
        assert_eq!(min.checked_abs(), Err(MoneyError::Overflow));
        assert_eq!((-min).mills(), i64::MAX);
    }

    #[test]
    fn test_serde_goes_through_decimal_strings() {
        let money = Money::from_mills(-1_250);
        assert_eq!(serde_json::to_string(&money).unwrap(), "\"-1.250\"");
        let back: Money = serde_json::from_str("\"-1.25\"").unwrap();
        assert_eq!(back, money);

        let rate = Rate::from_units(12_500);
        let json = serde_json::to_string(&rate).unwrap();
        assert_eq!(serde_json::from_str::<Rate>(&json).unwrap(), rate);
    }

    #[test]
    fn test_apply_rate_rounds_half_up() {
        let rate = Rate::from_decimal(dec!(0.5)).unwrap();
        // 0.001 * 0.5 = 0.0005 -> 0.001
        assert_eq!(Money::from_mills(1).apply_rate(rate).unwrap(), Money::from_mills(1));
        // -0.001 * 0.5 = -0.0005 -> 0.000
        assert_eq!(Money::from_mills(-1).apply_rate(rate).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_rate_from_percentage() {
        let rate = Rate::from_percentage(dec!(1.25)).unwrap();
        assert_eq!(rate.units(), 12_500);
        assert_eq!(rate.as_decimal(), dec!(0.012500));
        assert_eq!(rate.to_string(), "1.25%");
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_mills(12_500).to_string(), "$12.50");
        assert_eq!(Money::from_mills(-3_125).to_string(), "-$3.125");
        assert_eq!(Money::ZERO.to_string(), "$0.00");
    }
}
