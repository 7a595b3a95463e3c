//! Database Infrastructure Layer
//!
//! PostgreSQL persistence for the student ledger:
//!
//! - Connection pooling and embedded migrations
//! - Repositories with the SQL for ledger and trading tables
//! - `PgStore`, which implements the `LedgerStore` and `TradingStore` ports

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::{PgStore, PgUnitOfWork};
pub use error::DatabaseError;
pub use pool::{
    create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool, MIGRATOR,
};
