//! Process-wide tracing setup for the `weekmix` binary.
//!
//! Allocation decisions (accepted draws, fallbacks) are logged as structured
//! events. The log file keeps them as JSON lines; stderr gets a compact view
//! that stays out of the way of the calendar printed on stdout.

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;
use tracing::{Subscriber, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::time::{LocalTime, UtcTime};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::config_directory;

const LOG_FILE_NAME: &str = "weekmix.log";
const LOG_FILTER_ENV: &str = "WEEKMIX_LOG";
const RUST_LOG_ENV: &str = "RUST_LOG";

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Controls where structured logs are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingDestination {
    /// JSON lines to the persistent log file plus compact stderr output.
    FileAndStderr,
    /// Stderr only, for tests and throwaway runs.
    StderrOnly,
}

/// How chatty the default filter is when no environment filter is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Engine events at `info`, dependencies at `warn`.
    #[default]
    Normal,
    /// Engine events at `debug` (every accepted draw), dependencies at `info`.
    Verbose,
}

impl Verbosity {
    pub fn from_flag(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    fn default_directives(self) -> &'static str {
        match self {
            Verbosity::Normal => "warn,weekmix_core=info,weekmix_cli=info,weekmix=info",
            Verbosity::Verbose => "info,weekmix_core=debug,weekmix_cli=debug,weekmix=debug",
        }
    }
}

/// Where the active filter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSource {
    WeekmixLog,
    RustLog,
    Verbosity(Verbosity),
}

impl fmt::Display for FilterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSource::WeekmixLog => f.write_str(LOG_FILTER_ENV),
            FilterSource::RustLog => f.write_str(RUST_LOG_ENV),
            FilterSource::Verbosity(Verbosity::Normal) => f.write_str("default"),
            FilterSource::Verbosity(Verbosity::Verbose) => f.write_str("--verbose"),
        }
    }
}

#[derive(Debug)]
struct LoggingState {
    _guard: Option<WorkerGuard>,
    log_path: Option<PathBuf>,
}

static LOGGING_STATE: OnceLock<LoggingState> = OnceLock::new();

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to prepare log directory: {0}")]
    Io(#[from] io::Error),
    #[error("invalid logging filter: {0}")]
    Filter(#[from] ParseError),
    #[error("failed to install logging subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber. The first call wins; later calls return the
/// log file chosen by the first.
pub fn init_logging(
    destination: LoggingDestination,
    verbosity: Verbosity,
) -> Result<Option<&'static PathBuf>, LoggingError> {
    if LOGGING_STATE.get().is_none() {
        let state = install_logging(destination, verbosity)?;
        if let Err(state) = LOGGING_STATE.set(state) {
            drop(state);
        }
    }

    Ok(current_log_path())
}

pub fn current_log_path() -> Option<&'static PathBuf> {
    LOGGING_STATE.get().and_then(|state| state.log_path.as_ref())
}

/// Directory holding `weekmix.log`, next to the configuration file.
pub fn log_directory() -> PathBuf {
    config_directory().join("logs")
}

fn install_logging(
    destination: LoggingDestination,
    verbosity: Verbosity,
) -> Result<LoggingState, LoggingError> {
    let (filter, source) = resolve_filter(
        env::var(LOG_FILTER_ENV).ok(),
        env::var(RUST_LOG_ENV).ok(),
        verbosity,
    )?;

    let (file_layer, guard, log_path) = match destination {
        LoggingDestination::FileAndStderr => {
            let (layer, guard, path) = json_file_layer(&log_directory())?;
            (Some(layer), Some(guard), Some(path))
        }
        LoggingDestination::StderrOnly => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer(verbosity))
        .try_init()?;

    match log_path.as_ref() {
        Some(path) => info!(path = %path.display(), filter = %source, "Structured logging enabled"),
        None => info!(filter = %source, "Logging to stderr only"),
    }

    Ok(LoggingState {
        _guard: guard,
        log_path,
    })
}

/// Picks the filter: `WEEKMIX_LOG`, then a valid `RUST_LOG`, then the
/// verbosity defaults. A malformed `WEEKMIX_LOG` is an error.
fn resolve_filter(
    weekmix_log: Option<String>,
    rust_log: Option<String>,
    verbosity: Verbosity,
) -> Result<(EnvFilter, FilterSource), ParseError> {
    if let Some(spec) = weekmix_log.filter(|spec| !spec.trim().is_empty()) {
        return Ok((EnvFilter::try_new(spec)?, FilterSource::WeekmixLog));
    }
    if let Some(filter) = rust_log
        .filter(|spec| !spec.trim().is_empty())
        .and_then(|spec| EnvFilter::try_new(spec).ok())
    {
        return Ok((filter, FilterSource::RustLog));
    }
    let filter = EnvFilter::try_new(verbosity.default_directives())?;
    Ok((filter, FilterSource::Verbosity(verbosity)))
}

fn json_file_layer<S>(dir: &Path) -> Result<(BoxedLayer<S>, WorkerGuard, PathBuf), io::Error>
where
    S: Subscriber + for<'span> LookupSpan<'span> + 'static,
{
    fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = tracing_subscriber::fmt::layer()
        .event_format(
            tracing_subscriber::fmt::format()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with_writer(writer)
        .with_ansi(false)
        .boxed();
    Ok((layer, guard, dir.join(LOG_FILE_NAME)))
}

fn stderr_layer<S>(verbosity: Verbosity) -> BoxedLayer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span> + 'static,
{
    let format = tracing_subscriber::fmt::format()
        .compact()
        .with_target(verbosity == Verbosity::Verbose)
        .with_ansi(false);
    match verbosity {
        Verbosity::Verbose => tracing_subscriber::fmt::layer()
            .event_format(format.with_timer(LocalTime::rfc_3339()))
            .with_writer(io::stderr)
            .with_ansi(false)
            .boxed(),
        Verbosity::Normal => tracing_subscriber::fmt::layer()
            .event_format(format.without_time())
            .with_writer(io::stderr)
            .with_ansi(false)
            .boxed(),
    }
}
