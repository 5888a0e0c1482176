//! Logging setup for tools and test harnesses built on this crate.
//!
//! Driver and SDK crates are noisy at DEBUG (sqlx logs every statement
//! verbatim, which would include COPY credentials), so they stay at WARN
//! unless TRACE is requested.

use crate::{Result, error::RedloadError};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Crates capped at WARN below TRACE.
const QUIET_DEPENDENCIES: &[&str] = &[
    "sqlx",
    "aws_config",
    "aws_sdk_s3",
    "aws_smithy_runtime",
    "hyper",
];

/// Output encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

fn level_for(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// Filter directives for a verbosity setting.
fn directives(verbose: u8, quiet: bool) -> String {
    let level = level_for(verbose, quiet);
    let base = level.as_str().to_ascii_lowercase();
    if level == Level::TRACE || level == Level::ERROR {
        return base;
    }
    QUIET_DEPENDENCIES
        .iter()
        .fold(base, |acc, krate| format!("{acc},{krate}=warn"))
}

/// Initializes text logging based on verbosity level.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only show ERROR level logs
///
/// # Errors
/// Returns a configuration error when a global subscriber is already set.
///
/// # Example
/// ```rust,no_run
/// use redload_core::logging::init_logging;
///
/// init_logging(1, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    init_logging_with(LogFormat::Text, verbose, quiet)
}

/// Initializes logging in the given format. `RUST_LOG`, when set, replaces
/// the directives derived from the flags.
///
/// # Errors
/// Returns a configuration error when a global subscriber is already set.
pub fn init_logging_with(format: LogFormat, verbose: u8, quiet: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(verbose, quiet)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
    };
    installed.map_err(|e| {
        RedloadError::configuration(format!("Failed to initialize logging: {}", e))
    })
}
