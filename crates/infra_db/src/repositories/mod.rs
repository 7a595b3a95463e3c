//! Repository implementations for ledger and trading tables
//!
//! Repositories hold the SQL and the row types. They are stateless and run
//! on whatever connection they are handed, so several of them can share
//! one transaction.
//!
//! Queries are checked at runtime rather than with the `query!` macros, so
//! the crate builds without a live database.

pub mod ledger;
pub mod trading;

pub use ledger::LedgerRepository;
pub use trading::TradingRepository;
