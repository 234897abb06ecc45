//! Logging setup.
//!
//! Two sinks:
//! - console: `RUST_LOG` filter or `info`, no timestamps
//! - file: `out.log` in the output directory, debug and above, timestamped

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const FILE_FILTER: &str = "info,taskwrap=debug";

/// Install the global subscriber.
///
/// The returned guard flushes the file sink when dropped; keep it alive
/// until the process exits.
pub fn init(log_file: &Path) -> Result<WorkerGuard> {
    let dir = log_file.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
    let file_name = log_file
        .file_name()
        .context("Log file path has no file name")?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let console = fmt::layer()
        .without_time()
        .with_target(true)
        .with_writer(std::io::stdout)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let file = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer)
        .with_filter(EnvFilter::new(FILE_FILTER));

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
