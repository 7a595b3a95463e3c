//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! student bank test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for common values
//! - `builders`: Builders for share types and a ready-to-use in-memory ledger
//! - `database`: PostgreSQL container management for adapter tests
//! - `assertions`: Ledger invariant checks with readable failure messages
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
