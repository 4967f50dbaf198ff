//! Logging system configuration and initialization
//!
//! This module provides the logging setup for a crawl run:
//! - Console output on stdout with local timestamps
//! - Optional JSON file output through a non-blocking appender
//! - Verbosity flag mapped onto the crate's log level
//! - `RUST_LOG` overrides everything when set

use anyhow::{Result, anyhow};
use chrono::Local;
use lazy_static::lazy_static;
use std::sync::Mutex;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

/// Target name of this crate in filter directives
const CRATE_TARGET: &str = "flanco_price_tracker";

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> =
        Mutex::new(Vec::new());
}

/// Local wall-clock timestamps, same layout as the CSV rows
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y/%m/%d %H:%M:%S%.3f"))
    }
}

/// Level for a `-v` count: none is info, one is debug, more is trace
#[must_use]
pub fn level_for_verbosity(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Filter directives used when `RUST_LOG` is not set
///
/// Browser protocol and HTTP internals stay at `warn` unless trace is requested.
#[must_use]
pub fn default_directives(level: &str) -> String {
    if level.eq_ignore_ascii_case("trace") {
        return format!("{level},{CRATE_TARGET}={level}");
    }

    format!("warn,hyper=warn,reqwest=warn,thirtyfour=warn,{CRATE_TARGET}={level}")
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(&config.level)))
        .map_err(|e| anyhow!("Invalid log filter for level '{}': {}", config.level, e))?;

    let registry = Registry::default().with(env_filter);

    let console_layer = fmt::Layer::new()
        .with_writer(std::io::stdout)
        .with_timer(LocalTimeFormatter)
        .with_target(false);

    if config.file_output {
        std::fs::create_dir_all(&config.log_dir).map_err(|e| {
            anyhow!(
                "Failed to create log directory {}: {}",
                config.log_dir.display(),
                e
            )
        })?;

        let file_appender = rolling::never(&config.log_dir, &config.log_file_name);
        let (file_writer, file_guard) = non_blocking(file_appender);

        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(file_guard);

        let file_layer = fmt::Layer::new()
            .json()
            .with_writer(file_writer)
            .with_timer(LocalTimeFormatter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        registry
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;
    } else {
        registry
            .with(console_layer)
            .try_init()
            .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;
    }

    info!("Logging system initialized (level: {})", config.level);
    if config.file_output {
        info!(
            "Writing JSON logs to {}",
            config.log_dir.join(&config.log_file_name).display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(level_for_verbosity(0, "info"), "info");
        assert_eq!(level_for_verbosity(0, "warn"), "warn");
        assert_eq!(level_for_verbosity(1, "info"), "debug");
        assert_eq!(level_for_verbosity(4, "info"), "trace");
    }

    #[test]
    fn test_dependency_noise_suppressed_below_trace() {
        let directives = default_directives("debug");
        assert!(directives.contains("thirtyfour=warn"));
        assert!(directives.ends_with("flanco_price_tracker=debug"));

        let trace = default_directives("trace");
        assert!(!trace.contains("thirtyfour=warn"));
    }

    #[test]
    fn test_directives_parse() {
        for level in ["error", "warn", "info", "debug", "trace"] {
            assert!(EnvFilter::try_new(default_directives(level)).is_ok());
        }
    }
}
