//! # Logging
//!
//! Subscriber setup for waypoint, built on `tracing-subscriber`.
//!
//! Library crates only emit events through the `tracing` macros; binaries call
//! one of the `init_*` functions below exactly once at startup.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: filter directives (e.g. `debug`, `waypoint_core=trace`)
//! - `WAYPOINT_LOG_FORMAT`: `pretty` (default) or `json`
//! - `WAYPOINT_LOG_FILE`: optional path; events are also appended to a daily
//!   rolling file next to it
//!
//! ```rust,no_run
//! use waypoint_utils::{init_logging_with_level, LogFormat, LogLevel};
//!
//! init_logging_with_level(LogLevel::Debug, LogFormat::Pretty).expect("logging already initialised");
//! tracing::debug!(module = "libc.so.6", "loading symbols");
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "WAYPOINT_LOG_FORMAT";

/// Environment variable naming an optional log file.
pub const LOG_FILE_ENV: &str = "WAYPOINT_LOG_FILE";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable, ANSI-coloured lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "text" | "dev" => Ok(LogFormat::Pretty),
            "json" | "prod" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Initialize logging from the environment.
///
/// `RUST_LOG` wins when it parses as a filter, otherwise `warn` is used so the
/// CLI stays quiet unless asked. Format and file come from
/// [`LOG_FORMAT_ENV`] and [`LOG_FILE_ENV`].
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed or the format
/// variable holds an unknown value.
pub fn init_logging() -> Result<(), LoggingError>
{
    let format = log_format_from_env()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()));
    install(format, filter, log_file_from_env())
}

/// Initialize logging with an explicit level, ignoring `RUST_LOG`.
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<(), LoggingError>
{
    let filter = EnvFilter::new(Level::from(level).to_string());
    install(format, filter, log_file_from_env())
}

/// Output format named by [`LOG_FORMAT_ENV`], or the default when unset.
///
/// ## Errors
///
/// `InvalidFormat` if the variable holds an unknown value.
pub fn log_format_from_env() -> Result<LogFormat, LoggingError>
{
    match env::var(LOG_FORMAT_ENV) {
        Ok(value) => value.parse(),
        Err(_) => Ok(LogFormat::default()),
    }
}

fn log_file_from_env() -> Option<PathBuf>
{
    env::var(LOG_FILE_ENV).ok().filter(|value| !value.is_empty()).map(PathBuf::from)
}

/// Splits a log path into the directory and file prefix expected by
/// `tracing_appender::rolling`.
fn rolling_parts(path: &Path) -> (PathBuf, PathBuf)
{
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let prefix = path.file_name().map_or_else(|| PathBuf::from("waypoint.log"), PathBuf::from);
    (directory, prefix)
}

fn install(format: LogFormat, filter: EnvFilter, log_file: Option<PathBuf>) -> Result<(), LoggingError>
{
    let console = match format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(true)
            .with_writer(io::stderr)
            .with_filter(filter.clone())
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_writer(io::stderr)
            .with_filter(filter.clone())
            .boxed(),
    };

    let Some(path) = log_file else {
        return Registry::default()
            .with(console)
            .try_init()
            .map_err(|err| LoggingError::InitializationFailed(err.to_string()));
    };

    let (directory, prefix) = rolling_parts(&path);
    let appender = tracing_appender::rolling::daily(directory, prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file = match format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(false)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_filter(filter)
            .boxed(),
    };

    Registry::default()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    keep_worker_alive(guard);
    Ok(())
}

/// The non-blocking writer stops flushing once its guard drops; the
/// subscriber is process-global so the guard must be too.
fn keep_worker_alive(guard: WorkerGuard)
{
    std::mem::forget(guard);
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    #[error("Invalid log format: {0} (use 'pretty' or 'json')")]
    InvalidFormat(String),

    #[error("Invalid log level: {0} (use 'error', 'warn', 'info', 'debug' or 'trace')")]
    InvalidLevel(String),

    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),
}
