//! Logging configuration and initialization for CloudVault.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::Result;

/// Parse log level string to tracing Level.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn create_log_file(path: &str) -> Result<Arc<File>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    Ok(Arc::new(File::create(path)?))
}

/// Initialize the logging system with the given configuration.
///
/// Always writes to the configured log file. When `console` is set, events are
/// mirrored to stdout as well; the upload command leaves it off so that log
/// lines do not tear through the progress bars.
pub fn init(config: &LoggingConfig, console: bool) -> Result<()> {
    let level = parse_level(&config.level);
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let log_file = create_log_file(&config.file)?;

    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if console {
        tracing_subscriber::registry()
            .with(layer.with_writer(std::io::stdout.and(log_file)))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(layer.with_writer(log_file))
            .with(filter)
            .init();
    }

    Ok(())
}

/// Initialize console-only logging (for development/testing).
pub fn init_console_only(level: &str) {
    let level = parse_level(level);
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(true),
        )
        .with(filter)
        .init();
}
