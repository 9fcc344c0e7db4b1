//! Logging setup

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` overrides `level`.
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let level: tracing::Level = level.parse().context("Invalid log level")?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json())
            .try_init()
            .context("Failed to install log subscriber")?;
    } else {
        registry
            .with(fmt::layer())
            .try_init()
            .context("Failed to install log subscriber")?;
    }
    Ok(())
}

pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    init_logging(&config.level, config.json)
}
