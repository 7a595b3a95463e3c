//! Trading Domain
//!
//! Students buy and sell simulated stock with money from their shares.
//!
//! # Key Concepts
//!
//! - **Stock**: a listed company with a current value and a fixed pool of shares
//! - **StudentStock**: how many shares of a stock a student owns
//! - **StockHistory**: every price the stock has had
//! - **StudentStockHistory**: every trade a student made, linked to the
//!   ledger transaction that settled it
//!
//! # Settlement
//!
//! A trade moves the stock pool, the student's position and the share
//! balance in one unit of work. The money side goes through the ledger
//! poster, so a purchase the share cannot afford is refused with the same
//! `NSF` audit row as any other withdrawal.

pub mod stock;
pub mod student_stock;
pub mod history;
pub mod error;
pub mod ports;
pub mod memory;
pub mod engine;

pub use stock::Stock;
pub use student_stock::StudentStock;
pub use history::{StockHistory, StudentStockHistory};
pub use error::TradingError;
pub use ports::{TradingStore, TradingUnitOfWork};
pub use memory::{InMemoryTradingStore, TradingTables};
pub use engine::TradingEngine;
