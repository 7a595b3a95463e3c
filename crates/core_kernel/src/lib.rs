//! Core Kernel - Foundational types for the student banking ledger
//!
//! This crate provides the building blocks shared by the ledger and trading domains:
//! - Money and Rate types with exact fixed-point arithmetic
//! - Withdrawal-limit period boundaries and the clock abstraction
//! - Strongly-typed identifiers
//! - Built-in privilege and role sets
//! - The port error type used by every storage adapter

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod access;
pub mod ports;
pub mod error;

pub use money::{Money, Rate, MoneyError};
pub use temporal::{Clock, SystemClock, FixedClock, WithdrawalLimitPeriod, Timezone, TemporalError};
pub use identifiers::{
    ShareId, ShareTypeId, StudentId, InstanceId, TransactionId,
    StockId, StudentStockId, StockHistoryId, StudentStockHistoryId,
};
pub use access::{Privilege, BuiltInRole};
pub use ports::{PortError, DomainPort};
pub use error::CoreError;
