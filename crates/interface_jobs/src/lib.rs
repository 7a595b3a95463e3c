//! Command-line jobs for the student bank
//!
//! The `ledger-jobs` binary runs the periodic work the ledger needs outside
//! of interactive requests:
//!
//! - **daily-resets**: zero withdrawal counters whose period boundary has passed
//! - **reset-limit**: reset one share type on demand
//! - **post-dividends**: credit a share type's dividend to linked instances
//! - **reconcile**: compare a share's balance with its transaction log
//! - **update-stock-value**: reprice a simulated stock
//!
//! # Example
//!
//! ```rust,ignore
//! let runner = JobRunner::new(Arc::new(store), Arc::new(SystemClock), config.ledger);
//! let report = runner.daily_resets(None).await?;
//! ```

pub mod cli;
pub mod config;
pub mod runner;
pub mod telemetry;

pub use cli::{Cli, Command};
pub use config::{JobsConfig, LogConfig, LogFormat};
pub use runner::{JobError, JobOutcome, JobRunner};
