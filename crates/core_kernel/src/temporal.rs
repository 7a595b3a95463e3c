//! Time handling for the ledger
//!
//! This module provides:
//! - The `Clock` port used by every service to read "now"
//! - Withdrawal-limit periods and their calendar boundaries
//! - A timezone wrapper so boundaries can follow a school's local midnight

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;
use thiserror::Error;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: RwLock::new(now) }
    }

    /// Moves the clock to the given instant
    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard = now;
    }

    /// Moves the clock forward
    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Timezone wrapper used for period boundaries
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(Timezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Returns the local calendar date of a UTC instant
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        utc.with_timezone(&self.0).date_naive()
    }

    /// Gets the first instant of a local day as UTC
    ///
    /// When local midnight falls inside a DST gap the first valid instant
    /// after it is used.
    pub fn start_of_day(&self, date: NaiveDate) -> Result<DateTime<Utc>, TemporalError> {
        for hour in 0..3 {
            let local = date.and_time(NaiveTime::MIN) + chrono::Duration::hours(hour);
            if let Some(dt) = self.0.from_local_datetime(&local).earliest() {
                return Ok(dt.with_timezone(&Utc));
            }
        }
        Err(TemporalError::UnresolvableLocalTime(date.to_string()))
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.name())
    }
}

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Local midnight of {0} cannot be resolved in the configured timezone")]
    UnresolvableLocalTime(String),

    #[error("Date out of range")]
    OutOfRange,

    #[error("Unknown withdrawal limit period: {0}")]
    UnknownPeriod(String),
}

/// Cadence at which a share type's withdrawal counters reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalLimitPeriod {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annually,
}

impl WithdrawalLimitPeriod {
    pub const ALL: [WithdrawalLimitPeriod; 5] = [
        WithdrawalLimitPeriod::Daily,
        WithdrawalLimitPeriod::Weekly,
        WithdrawalLimitPeriod::Monthly,
        WithdrawalLimitPeriod::Quarterly,
        WithdrawalLimitPeriod::Annually,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalLimitPeriod::Daily => "daily",
            WithdrawalLimitPeriod::Weekly => "weekly",
            WithdrawalLimitPeriod::Monthly => "monthly",
            WithdrawalLimitPeriod::Quarterly => "quarterly",
            WithdrawalLimitPeriod::Annually => "annually",
        }
    }

    /// First local date of the period containing `date`
    ///
    /// Weeks start on Monday; quarters start in January, April, July and
    /// October.
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            WithdrawalLimitPeriod::Daily => date,
            WithdrawalLimitPeriod::Weekly => {
                date - Days::new(u64::from(date.weekday().num_days_from_monday()))
            }
            WithdrawalLimitPeriod::Monthly => first_of_month(date.year(), date.month()),
            WithdrawalLimitPeriod::Quarterly => {
                let quarter_month = (date.month0() / 3) * 3 + 1;
                first_of_month(date.year(), quarter_month)
            }
            WithdrawalLimitPeriod::Annually => first_of_month(date.year(), 1),
        }
    }

    /// First local date of the period after the one containing `date`
    pub fn next_period_start(&self, date: NaiveDate) -> Result<NaiveDate, TemporalError> {
        let start = self.period_start(date);
        let next = match self {
            WithdrawalLimitPeriod::Daily => start.checked_add_days(Days::new(1)),
            WithdrawalLimitPeriod::Weekly => start.checked_add_days(Days::new(7)),
            WithdrawalLimitPeriod::Monthly => start.checked_add_months(Months::new(1)),
            WithdrawalLimitPeriod::Quarterly => start.checked_add_months(Months::new(3)),
            WithdrawalLimitPeriod::Annually => start.checked_add_months(Months::new(12)),
        };
        next.ok_or(TemporalError::OutOfRange)
    }

    /// Most recent boundary at or before `at`
    pub fn previous_boundary(
        &self,
        at: DateTime<Utc>,
        tz: Timezone,
    ) -> Result<DateTime<Utc>, TemporalError> {
        let local = tz.local_date(at);
        let boundary = tz.start_of_day(self.period_start(local))?;
        if boundary <= at {
            return Ok(boundary);
        }
        // Only reachable when local midnight was shifted by a DST gap
        let earlier = self
            .period_start(local.pred_opt().ok_or(TemporalError::OutOfRange)?);
        tz.start_of_day(earlier)
    }

    /// First boundary strictly after `at`
    pub fn next_boundary(
        &self,
        at: DateTime<Utc>,
        tz: Timezone,
    ) -> Result<DateTime<Utc>, TemporalError> {
        let local = tz.local_date(at);
        let mut candidate = tz.start_of_day(self.next_period_start(local)?)?;
        if candidate <= at {
            candidate = tz.start_of_day(self.next_period_start(tz.local_date(candidate))?)?;
        }
        Ok(candidate)
    }

    /// Returns true if a period starts on the given local date
    pub fn is_boundary_date(&self, date: NaiveDate) -> bool {
        self.period_start(date) == date
    }
}

impl fmt::Display for WithdrawalLimitPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawalLimitPeriod {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(WithdrawalLimitPeriod::Daily),
            "weekly" => Ok(WithdrawalLimitPeriod::Weekly),
            "monthly" => Ok(WithdrawalLimitPeriod::Monthly),
            "quarterly" => Ok(WithdrawalLimitPeriod::Quarterly),
            "annually" | "annual" | "yearly" => Ok(WithdrawalLimitPeriod::Annually),
            other => Err(TemporalError::UnknownPeriod(other.to_string())),
        }
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    // Day 1 exists for every month chrono can represent
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_weekly_boundary_is_monday() {
        // 2024-03-14 is a Thursday
        let prev = WithdrawalLimitPeriod::Weekly
            .previous_boundary(utc(2024, 3, 14, 15), Timezone::default())
            .unwrap();
        assert_eq!(prev, utc(2024, 3, 11, 0));
    }

    #[test]
    fn test_previous_boundary_is_inclusive() {
        let at = utc(2024, 4, 1, 0);
        let prev = WithdrawalLimitPeriod::Quarterly
            .previous_boundary(at, Timezone::default())
            .unwrap();
        assert_eq!(prev, at);
    }

    #[test]
    fn test_next_boundary_is_strict() {
        let at = utc(2024, 4, 1, 0);
        let next = WithdrawalLimitPeriod::Quarterly
            .next_boundary(at, Timezone::default())
            .unwrap();
        assert_eq!(next, utc(2024, 7, 1, 0));
    }

    #[test]
    fn test_fixed_clock_advance() {
        let clock = FixedClock::new(utc(2024, 1, 1, 0));
        clock.advance(chrono::Duration::days(2));
        assert_eq!(clock.now(), utc(2024, 1, 3, 0));
    }
}
