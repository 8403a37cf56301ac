//! Tracing subscriber setup.
//!
//! Library code only emits events; binaries and test harnesses call
//! [`init_logging`] once to see them.

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{ConfigError, ConfigResult};
use tracing::info;
use tracing_subscriber::EnvFilter;

const GRAPHMODEL_TARGETS: [&str; 4] = [
    "graphmodel",
    "graphmodel_core",
    "graphmodel_query",
    "graphmodel_neo4j",
];

/// Filter directives for the configured level.
///
/// Dependencies default to `warn`; graphmodel crates use `config.level`;
/// `config.filter` is appended last so it can override either.
pub fn build_filter_string(config: &LoggingConfig) -> String {
    let mut filter = String::from("warn");
    for target in GRAPHMODEL_TARGETS {
        filter.push_str(&format!(",{target}={}", config.level));
    }
    if let Some(extra) = &config.filter {
        filter.push(',');
        filter.push_str(extra);
    }
    filter
}

/// Install the global subscriber.
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> ConfigResult<()> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(build_filter_string(config)),
    }
    .map_err(|e| ConfigError::Logging(e.to_string()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.include_target)
        .with_ansi(config.use_ansi);

    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| ConfigError::Logging(e.to_string()))?;

    info!(level = %config.level, format = ?config.format, "Logging initialized");
    Ok(())
}
