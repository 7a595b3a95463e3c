//! Built-in privileges and roles
//!
//! The set of privileges and built-in roles is fixed at compile time. Callers
//! decide which privilege an operation needs; this module only answers
//! "which privileges does a built-in role carry".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A single grantable capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Privilege {
    ViewOwnShares,
    ViewOwnTransactions,
    TransferOwnFunds,
    TradeStocks,
    ViewShares,
    ManageShares,
    ManageShareTypes,
    PostTransactions,
    PostDividends,
    ResetWithdrawalLimits,
    ManageStocks,
    ManageStudents,
    ManageInstances,
}

impl Privilege {
    pub const ALL: [Privilege; 13] = [
        Privilege::ViewOwnShares,
        Privilege::ViewOwnTransactions,
        Privilege::TransferOwnFunds,
        Privilege::TradeStocks,
        Privilege::ViewShares,
        Privilege::ManageShares,
        Privilege::ManageShareTypes,
        Privilege::PostTransactions,
        Privilege::PostDividends,
        Privilege::ResetWithdrawalLimits,
        Privilege::ManageStocks,
        Privilege::ManageStudents,
        Privilege::ManageInstances,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Privilege::ViewOwnShares => "VIEW_OWN_SHARES",
            Privilege::ViewOwnTransactions => "VIEW_OWN_TRANSACTIONS",
            Privilege::TransferOwnFunds => "TRANSFER_OWN_FUNDS",
            Privilege::TradeStocks => "TRADE_STOCKS",
            Privilege::ViewShares => "VIEW_SHARES",
            Privilege::ManageShares => "MANAGE_SHARES",
            Privilege::ManageShareTypes => "MANAGE_SHARE_TYPES",
            Privilege::PostTransactions => "POST_TRANSACTIONS",
            Privilege::PostDividends => "POST_DIVIDENDS",
            Privilege::ResetWithdrawalLimits => "RESET_WITHDRAWAL_LIMITS",
            Privilege::ManageStocks => "MANAGE_STOCKS",
            Privilege::ManageStudents => "MANAGE_STUDENTS",
            Privilege::ManageInstances => "MANAGE_INSTANCES",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Privilege {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Privilege::ALL
            .iter()
            .copied()
            .find(|p| p.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::not_found(format!("privilege {}", s)))
    }
}

const STUDENT_PRIVILEGES: &[Privilege] = &[
    Privilege::ViewOwnShares,
    Privilege::ViewOwnTransactions,
    Privilege::TransferOwnFunds,
    Privilege::TradeStocks,
];

const TEACHER_PRIVILEGES: &[Privilege] = &[
    Privilege::ViewOwnShares,
    Privilege::ViewOwnTransactions,
    Privilege::ViewShares,
    Privilege::PostTransactions,
    Privilege::ManageStudents,
];

const ADMIN_PRIVILEGES: &[Privilege] = &[
    Privilege::ViewShares,
    Privilege::ManageShares,
    Privilege::ManageShareTypes,
    Privilege::PostTransactions,
    Privilege::PostDividends,
    Privilege::ResetWithdrawalLimits,
    Privilege::ManageStocks,
    Privilege::ManageStudents,
];

/// Roles that exist in every instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltInRole {
    Student,
    Teacher,
    Admin,
    SuperUser,
}

impl BuiltInRole {
    pub const ALL: [BuiltInRole; 4] = [
        BuiltInRole::Student,
        BuiltInRole::Teacher,
        BuiltInRole::Admin,
        BuiltInRole::SuperUser,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BuiltInRole::Student => "Student",
            BuiltInRole::Teacher => "Teacher",
            BuiltInRole::Admin => "Admin",
            BuiltInRole::SuperUser => "Super User",
        }
    }

    /// Privileges granted by this role
    pub fn privileges(&self) -> &'static [Privilege] {
        match self {
            BuiltInRole::Student => STUDENT_PRIVILEGES,
            BuiltInRole::Teacher => TEACHER_PRIVILEGES,
            BuiltInRole::Admin => ADMIN_PRIVILEGES,
            BuiltInRole::SuperUser => &Privilege::ALL,
        }
    }

    pub fn grants(&self, privilege: Privilege) -> bool {
        self.privileges().contains(&privilege)
    }
}

impl fmt::Display for BuiltInRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
