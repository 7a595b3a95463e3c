//! Tracing subscriber setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogConfig, LogFormat};

/// Builds the filter from `RUST_LOG`, falling back to the configured level
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already set
pub fn init_tracing(config: &LogConfig) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(&config.level));
    match config.format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()?,
    }
    Ok(())
}
