//! Ledger Domain - Student Share Accounts
//!
//! This crate owns the money side of the student bank: shares (accounts),
//! share types, the append-only transaction log, and the services that
//! mutate balances.
//!
//! # Invariants
//!
//! - A share's balance always equals the sum of its transaction amounts
//! - A balance only changes together with the transaction that explains it,
//!   inside one unit of work
//! - Rejected withdrawals leave an audit row (`NSF` or `EX`) and never move money
//!
//! # Services
//!
//! - [`TransactionPoster`]: single and batch postings with withdrawal-limit
//!   enforcement
//! - [`TransferService`]: atomic share-to-share transfers
//! - [`DividendDistributor`]: paged dividend posting per instance
//! - [`WithdrawalLimitResetter`]: counter resets and the daily reset run
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_ledger::{TransactionPoster, PostingRequest};
//!
//! let poster = TransactionPoster::new(store, clock, LedgerConfig::default());
//! let tx = poster.post_one(PostingRequest::new(share_id, Money::from_units(10)?)).await?;
//! ```

pub mod share;
pub mod share_type;
pub mod transaction;
pub mod student;
pub mod error;
pub mod config;
pub mod ports;
pub mod memory;
pub mod poster;
pub mod transfer;
pub mod dividends;
pub mod withdrawal_limit;
pub mod inquiry;

pub use share::Share;
pub use share_type::ShareType;
pub use transaction::{Transaction, TransactionType};
pub use student::Student;
pub use error::LedgerError;
pub use config::LedgerConfig;
pub use ports::{LedgerStore, LedgerUnitOfWork, SharePageQuery};
pub use memory::{InMemoryLedgerStore, LedgerTables};
pub use poster::{BatchFailure, BatchOptions, BatchOutcome, PostingRequest, TransactionPoster};
pub use transfer::{TransferRequest, TransferService};
pub use dividends::DividendDistributor;
pub use withdrawal_limit::{DailyResetReport, ResetReason, ResetSummary, WithdrawalLimitResetter};
pub use inquiry::{LedgerInquiry, ShareReconciliation};
