use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Where and how the process logs.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Directory for the daily rolling log files
    pub log_dir: Utf8PathBuf,
    /// File name prefix (e.g. "sellhelper")
    pub prefix: String,
    /// `debug` level instead of `info`
    pub debug: bool,
    /// Mirror log lines to the console with ANSI colours
    pub console: bool,
    /// Write the file log as JSON lines
    pub json: bool,
}

impl LogOptions {
    pub fn new<P: AsRef<Utf8Path>>(log_dir: P, prefix: &str) -> Self {
        Self {
            log_dir: log_dir.as_ref().to_path_buf(),
            prefix: prefix.to_string(),
            debug: false,
            console: false,
            json: false,
        }
    }

    fn filter(&self) -> EnvFilter {
        // RUST_LOG wins when set.
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(if self.debug { "debug" } else { "info" }))
    }
}

/// Create the log directory if it doesn't exist.
pub fn ensure_log_dir(log_dir: &Utf8Path) -> Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    }
    Ok(())
}

/// Install the global subscriber: a daily rolling, non-blocking file layer
/// plus an optional console layer.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
///
/// # Errors
/// Fails if the directory cannot be created or a global subscriber is
/// already installed.
pub fn setup_logging(options: &LogOptions) -> Result<WorkerGuard> {
    ensure_log_dir(&options.log_dir)?;

    let file_appender = rolling::daily(&options.log_dir, &options.prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let text_file_layer = (!options.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking.clone())
            .with_ansi(false) // No ANSI codes in log files
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
    });
    let json_file_layer = options.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_thread_names(true)
    });
    let console_layer = options.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(options.filter())
        .with(text_file_layer)
        .with(json_file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}, json={}",
        options.log_dir,
        options.prefix,
        options.debug,
        options.console,
        options.json
    );

    Ok(guard)
}
