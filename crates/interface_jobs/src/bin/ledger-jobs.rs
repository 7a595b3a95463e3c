//! Student Bank - Ledger Jobs Binary
//!
//! Runs one ledger job against PostgreSQL and prints its outcome as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Reset withdrawal counters whose period rolled over (run once a day)
//! ledger-jobs daily-resets
//!
//! # Pay a share type's dividend to two instances
//! ledger-jobs post-dividends --share-type SHT-... --instance INS-... --instance INS-...
//!
//! # Use a config file and JSON logs
//! ledger-jobs --config jobs.toml --log-format json reconcile --share SHR-...
//! ```
//!
//! # Environment Variables
//!
//! * `DATABASE_URL` or `LEDGER_DATABASE__URL` - PostgreSQL connection string
//! * `LEDGER_DATABASE__MAX_CONNECTIONS` - Pool size (default: 10)
//! * `LEDGER_LOG__LEVEL` - Log level when `RUST_LOG` is unset (default: info)
//! * `LEDGER_LOG__FORMAT` - `pretty` or `json` (default: pretty)
//! * `LEDGER_LEDGER__PAGE_SIZE` - Shares per page in dividend and reset runs (default: 100)
//! * `LEDGER_LEDGER__TIMEZONE` - IANA timezone of period boundaries (default: UTC)
//! * `LEDGER_CONFIG_FILE` - Optional config file

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use core_kernel::SystemClock;
use infra_db::{create_pool, run_migrations, PgStore};
use interface_jobs::{telemetry, Cli, JobRunner, JobsConfig};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    telemetry::init_tracing(&config.log)?;

    tracing::info!(job = cli.command.name(), "Starting ledger job");

    let pool = create_pool(config.database.clone())
        .await
        .context("connecting to the database")?;
    run_migrations(&pool).await.context("applying migrations")?;

    let store = PgStore::new(pool);
    store.health_check().await.context("database health check")?;

    let runner = JobRunner::new(Arc::new(store), Arc::new(SystemClock), config.ledger.clone());
    let outcome = runner
        .run(&cli.command)
        .await
        .with_context(|| format!("running {}", cli.command.name()))?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(if outcome.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Layers command-line overrides over the loaded configuration
fn load_config(cli: &Cli) -> anyhow::Result<JobsConfig> {
    let mut config = JobsConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(level) = &cli.log_level {
        config = config.with_log_level(level.clone());
    }
    if let Some(format) = cli.log_format {
        config = config.with_log_format(format);
    }
    Ok(config)
}
