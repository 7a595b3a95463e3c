//! Command-line arguments for `ledger-jobs`

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use core_kernel::{InstanceId, Money, ShareId, ShareTypeId, StockId};

use crate::config::LogFormat;

/// Student bank ledger jobs
#[derive(Debug, Parser)]
#[command(name = "ledger-jobs", author, version, about, long_about = None)]
pub struct Cli {
    /// Config file layered under the LEDGER_ environment variables
    #[arg(long, env = "LEDGER_CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log level or filter directive
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Apply pending schema migrations and exit
    Migrate,

    /// Reset withdrawal counters for every share type whose period rolled over
    DailyResets {
        /// Evaluate as of this RFC 3339 instant instead of now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Reset one share type's withdrawal counters now
    ResetLimit {
        #[arg(long)]
        share_type: ShareTypeId,
    },

    /// Credit a share type's dividend to shares in the given instances
    PostDividends {
        #[arg(long)]
        share_type: ShareTypeId,

        /// Instance to pay; repeat for several
        #[arg(long = "instance", required = true)]
        instances: Vec<InstanceId>,
    },

    /// Compare a share's balance with the sum of its transactions
    Reconcile {
        #[arg(long)]
        share: ShareId,
    },

    /// Set a stock's current value
    UpdateStockValue {
        #[arg(long)]
        stock: StockId,

        /// New value in dollars, e.g. 12.50
        #[arg(long)]
        value: Money,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Migrate => "migrate",
            Command::DailyResets { .. } => "daily-resets",
            Command::ResetLimit { .. } => "reset-limit",
            Command::PostDividends { .. } => "post-dividends",
            Command::Reconcile { .. } => "reconcile",
            Command::UpdateStockValue { .. } => "update-stock-value",
        }
    }
}
