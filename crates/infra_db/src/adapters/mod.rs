//! Port adapters
//!
//! Implementations of the domain store ports over PostgreSQL. Adapters
//! own transaction handling and error translation; the SQL lives in the
//! repository layer.

pub mod postgres;

pub use postgres::{PgStore, PgUnitOfWork};
